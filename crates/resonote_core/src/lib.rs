//! Core library for Resonote.
//! Article ingestion, curation and dedup-persist live here; front ends only
//! wire configuration and print results.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod source;

pub use config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, open_db_with_options, DbError, DbOptions};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status};
pub use model::article::{Article, ArticleId, NewArticle, ReadingStatus};
pub use model::fingerprint::{fingerprint, UrlHash};
pub use model::metadata::{Metadata, RawItem, ValidatedMetadata};
pub use model::tag::Tag;
pub use repo::article_repo::{ArticleStore, RepoError, RepoResult, SqliteArticleStore};
pub use repo::library_repo::{ArticleListQuery, SqliteLibraryRepository, TagCount};
pub use repo::reflection_repo::{Reflection, SqliteReflectionRepository};
pub use service::library_service::{LibraryError, LibraryService};
pub use service::normalizer::normalize;
pub use service::persistence::{
    Backoff, PersistError, PersistenceCoordinator, RetryPolicy, SaveOutcome, Sleeper,
    ThreadSleeper,
};
pub use service::pipeline::{BatchReport, IngestPipeline, PipelineError, SkippedItem};
pub use service::reflection_service::{ReflectionError, ReflectionService};
pub use service::tag_service::resolve_tags;
pub use service::validator::{validate, validate_json, ValidationError};
pub use source::{
    SourceAdapter, SourceContext, SourceCredentials, SourceError, SourceOptions, SourceRegistry,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
