//! Batch ingestion orchestrator.
//!
//! # Responsibility
//! - Drive one batch: adapter fetch, normalize, validate, persist.
//! - Summarize the batch as a serializable `BatchReport`.
//!
//! # Invariants
//! - Unknown sources and zero counts fail before any item is processed.
//! - Items are processed sequentially in adapter order.
//! - A failing item never aborts the batch; it becomes a `SkippedItem`.
//! - Dedup hits count as `duplicates`, never as ingested or skipped.

use crate::model::article::{Article, ArticleId};
use crate::model::fingerprint::UrlHash;
use crate::model::metadata::{Metadata, ValidatedMetadata};
use crate::repo::article_repo::{ArticleStore, RepoError, SqliteArticleStore};
use crate::service::normalizer::normalize;
use crate::service::persistence::{
    PersistenceCoordinator, RetryPolicy, SaveOutcome, Sleeper, ThreadSleeper,
};
use crate::service::validator::validate;
use crate::source::{SourceAdapter, SourceContext, SourceError, SourceOptions, SourceRegistry};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::num::NonZeroUsize;

pub const STATUS_SUCCESS: &str = "success";

/// One newly curated article in a batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleSummary {
    pub id: ArticleId,
    pub url_hash: UrlHash,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl ArticleSummary {
    fn new(article: &Article, metadata: ValidatedMetadata) -> Self {
        Self {
            id: article.id,
            url_hash: article.url_hash.clone(),
            metadata: metadata.into_inner(),
        }
    }
}

/// Candidate that did not make it into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub url: String,
    pub reason: String,
}

/// Outcome of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub status: &'static str,
    pub source: String,
    /// Number of newly stored articles (`curated.len()`).
    pub ingested: usize,
    /// Candidates whose URL was already stored.
    pub duplicates: usize,
    pub curated: Vec<ArticleSummary>,
    pub skipped: Vec<SkippedItem>,
}

impl BatchReport {
    fn new(source: &str) -> Self {
        Self {
            status: STATUS_SUCCESS,
            source: source.to_string(),
            ingested: 0,
            duplicates: 0,
            curated: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, url: &str, reason: impl Into<String>) {
        self.skipped.push(SkippedItem {
            url: url.to_string(),
            reason: reason.into(),
        });
    }

    /// Total candidates the adapter handed over.
    pub fn candidates(&self) -> usize {
        self.ingested + self.duplicates + self.skipped.len()
    }
}

/// Batch-level failures. Per-item failures live in `BatchReport::skipped`.
#[derive(Debug)]
pub enum PipelineError {
    UnknownSource(String),
    /// `max_count` must be at least 1.
    InvalidCount,
    /// Adapter construction rejected credentials or options.
    Source(SourceError),
    /// The article store could not be prepared for the run.
    Store(RepoError),
    /// Every candidate exhausted its retries against a locked store.
    StoreUnavailable { attempted: usize, last_error: String },
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSource(name) => write!(f, "unknown source: {name}"),
            Self::InvalidCount => write!(f, "max_count must be a positive integer"),
            Self::Source(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "article store unavailable: {err}"),
            Self::StoreUnavailable {
                attempted,
                last_error,
            } => write!(
                f,
                "article store stayed locked for all {attempted} candidates: {last_error}"
            ),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::UnknownSource(_) | Self::InvalidCount | Self::StoreUnavailable { .. } => None,
        }
    }
}

impl From<SourceError> for PipelineError {
    fn from(value: SourceError) -> Self {
        match value {
            SourceError::UnknownSource(name) => Self::UnknownSource(name),
            other => Self::Source(other),
        }
    }
}

impl From<RepoError> for PipelineError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Ingestion orchestrator bound to a registry and shared adapter context.
pub struct IngestPipeline<Z: Sleeper = ThreadSleeper> {
    registry: SourceRegistry,
    context: SourceContext,
    coordinator: PersistenceCoordinator<Z>,
}

impl IngestPipeline<ThreadSleeper> {
    pub fn new(registry: SourceRegistry, context: SourceContext, policy: RetryPolicy) -> Self {
        Self::with_coordinator(registry, context, PersistenceCoordinator::new(policy))
    }
}

impl<Z: Sleeper> IngestPipeline<Z> {
    pub fn with_coordinator(
        registry: SourceRegistry,
        context: SourceContext,
        coordinator: PersistenceCoordinator<Z>,
    ) -> Self {
        Self {
            registry,
            context,
            coordinator,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &PersistenceCoordinator<Z> {
        &self.coordinator
    }

    /// Runs one batch against a migrated connection.
    ///
    /// The article store lives only for this call.
    pub fn run_on_connection(
        &mut self,
        conn: &Connection,
        source_name: &str,
        max_count: usize,
        options: &SourceOptions,
    ) -> Result<BatchReport, PipelineError> {
        let mut adapter = self.registry.build(source_name, &self.context, options)?;
        let mut store = SqliteArticleStore::try_new(conn)?;
        self.run_adapter(&mut store, adapter.as_mut(), max_count)
    }

    /// Resolves `source_name` and runs one batch against `store`.
    ///
    /// # Errors
    /// - `UnknownSource` / `Source` when the adapter cannot be built.
    /// - `InvalidCount` when `max_count == 0`.
    /// - `StoreUnavailable` when every candidate hit a locked store.
    pub fn run<S>(
        &mut self,
        store: &mut S,
        source_name: &str,
        max_count: usize,
        options: &SourceOptions,
    ) -> Result<BatchReport, PipelineError>
    where
        S: ArticleStore + ?Sized,
    {
        let mut adapter = self.registry.build(source_name, &self.context, options)?;
        self.run_adapter(store, adapter.as_mut(), max_count)
    }

    /// Runs one batch with an already-built adapter.
    pub fn run_adapter<S>(
        &mut self,
        store: &mut S,
        adapter: &mut dyn SourceAdapter,
        max_count: usize,
    ) -> Result<BatchReport, PipelineError>
    where
        S: ArticleStore + ?Sized,
    {
        let limit = NonZeroUsize::new(max_count).ok_or(PipelineError::InvalidCount)?;
        let source = adapter.name().to_string();
        info!(
            "event=pipeline_run module=pipeline status=start source={} max_count={}",
            source, max_count
        );

        let mut candidates = adapter.fetch_candidates(limit);
        candidates.truncate(limit.get());

        let mut report = BatchReport::new(&source);
        let mut contention_failures = 0usize;
        let mut last_contention = None;

        for raw in &candidates {
            let metadata = normalize(raw, &source);
            let validated = match validate(&metadata) {
                Ok(validated) => validated,
                Err(err) => {
                    warn!(
                        "event=item_validate module=pipeline status=skipped source={} url={} field={} error={}",
                        source,
                        raw.url,
                        err.field().unwrap_or("-"),
                        err
                    );
                    report.skip(&raw.url, err.to_string());
                    continue;
                }
            };

            match self.coordinator.save_or_get(store, &validated) {
                Ok(SaveOutcome::Created(article)) => {
                    debug!(
                        "event=item_persist module=pipeline status=created source={} url_hash={}",
                        source, article.url_hash
                    );
                    report.curated.push(ArticleSummary::new(&article, validated));
                }
                Ok(SaveOutcome::Existing(article)) => {
                    debug!(
                        "event=item_persist module=pipeline status=duplicate source={} url_hash={}",
                        source, article.url_hash
                    );
                    report.duplicates += 1;
                }
                Err(err) => {
                    error!(
                        "event=item_persist module=pipeline status=error source={} url={} attempts={} error={}",
                        source,
                        raw.url,
                        self.coordinator.attempts(),
                        err
                    );
                    if err.is_contention() {
                        contention_failures += 1;
                        last_contention = Some(err.to_string());
                    }
                    report.skip(&raw.url, err.to_string());
                }
            }
        }
        report.ingested = report.curated.len();

        if !candidates.is_empty() && contention_failures == candidates.len() {
            error!(
                "event=pipeline_run module=pipeline status=error source={} error_code=store_unavailable attempted={}",
                source,
                candidates.len()
            );
            return Err(PipelineError::StoreUnavailable {
                attempted: candidates.len(),
                last_error: last_contention.unwrap_or_default(),
            });
        }

        info!(
            "event=pipeline_run module=pipeline status=ok source={} candidates={} ingested={} duplicates={} skipped={}",
            source,
            candidates.len(),
            report.ingested,
            report.duplicates,
            report.skipped.len()
        );
        Ok(report)
    }
}
