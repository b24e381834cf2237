//! Curated article domain model.
//!
//! # Responsibility
//! - Define the canonical record produced by ingestion.
//! - Define the insert shape handed to the storage contract.
//!
//! # Invariants
//! - `url_hash` is the unique identity; `id` is a stable handle for
//!   library/reflection operations and never reused.
//! - `created_at` is set once by storage and never changes.
//! - `estimated_reading_time_min` is always >= 1.

use crate::model::fingerprint::{fingerprint, UrlHash};
use crate::model::metadata::ValidatedMetadata;
use crate::model::tag::Tag;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable handle for one stored article.
pub type ArticleId = Uuid;

/// Reading lifecycle of an article.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    #[default]
    Unread,
    Read,
}

impl ReadingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unread" => Some(Self::Unread),
            "read" => Some(Self::Read),
            _ => None,
        }
    }
}

impl Display for ReadingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored article as read back from the article store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub url_hash: UrlHash,
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    /// Origin label, e.g. `reddit` or `guardian`.
    pub source: String,
    pub estimated_reading_time_min: u32,
    pub reading_status: ReadingStatus,
    pub favorite: bool,
    /// Creation instant in epoch milliseconds.
    pub created_at: i64,
    /// Associated tags in association order.
    pub tags: Vec<Tag>,
}

impl Article {
    /// Returns associated tag names in association order.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }
}

/// Insert shape for a not-yet-stored article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub id: ArticleId,
    pub url_hash: UrlHash,
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub source: String,
    pub estimated_reading_time_min: u32,
    pub reading_status: ReadingStatus,
}

impl NewArticle {
    /// Builds an insert shape from validated metadata with a fresh id.
    pub fn from_validated(metadata: &ValidatedMetadata) -> Self {
        let metadata = metadata.metadata();
        Self {
            id: Uuid::new_v4(),
            url_hash: fingerprint(&metadata.url),
            title: metadata.title.clone(),
            author: metadata.author.clone(),
            url: metadata.url.clone(),
            source: metadata.source.clone(),
            estimated_reading_time_min: metadata.estimated_reading_time_min,
            reading_status: metadata.reading_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReadingStatus;

    #[test]
    fn reading_status_parses_case_insensitively() {
        assert_eq!(ReadingStatus::parse(" READ "), Some(ReadingStatus::Read));
        assert_eq!(ReadingStatus::parse("unread"), Some(ReadingStatus::Unread));
        assert_eq!(ReadingStatus::parse("archived"), None);
        assert_eq!(ReadingStatus::default(), ReadingStatus::Unread);
    }
}
