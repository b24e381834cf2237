//! Shared tag vocabulary.

use serde::{Deserialize, Serialize};

/// Stored tag row. `name` is always trimmed and lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Normalizes one raw tag value: trims whitespace and lowercases.
///
/// Returns `None` when nothing remains after trimming.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}
