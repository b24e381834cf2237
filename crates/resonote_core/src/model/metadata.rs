//! Transient ingestion shapes.
//!
//! # Responsibility
//! - `RawItem`: what a source adapter emits, before any policy applies.
//! - `Metadata`: normalized projection of a `RawItem` plus source defaults.
//! - `ValidatedMetadata`: `Metadata` that passed the strict schema check.
//!
//! # Invariants
//! - None of these shapes has persistent identity.
//! - `ValidatedMetadata` can only be built by the validator.

use crate::model::article::ReadingStatus;
use serde::{Deserialize, Serialize};

/// Unprocessed candidate emitted by a source adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    /// Upstream headline; may be missing or blank.
    pub title: Option<String>,
    pub url: String,
    pub author: Option<String>,
    /// Adapter-specific tags, possibly empty.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Body word count when the upstream reports it.
    pub word_count: Option<u32>,
}

impl RawItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_word_count(mut self, word_count: u32) -> Self {
        self.word_count = Some(word_count);
        self
    }
}

/// Normalized article metadata. Unknown fields are rejected on deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub source: String,
    pub estimated_reading_time_min: u32,
    #[serde(default)]
    pub reading_status: ReadingStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Metadata that satisfied every schema rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidatedMetadata(Metadata);

impl ValidatedMetadata {
    pub(crate) fn new_unchecked(metadata: Metadata) -> Self {
        Self(metadata)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.0
    }

    pub fn url(&self) -> &str {
        &self.0.url
    }

    pub fn into_inner(self) -> Metadata {
        self.0
    }
}
