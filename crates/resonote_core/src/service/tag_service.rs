//! Tag canonicalization and race-safe find-or-create.
//!
//! # Responsibility
//! - Resolve raw tag strings to shared `Tag` rows, creating missing ones.
//!
//! # Invariants
//! - Names are trimmed and lowercased before lookup; blank names are skipped.
//! - Output preserves input order, including repeated names.
//! - Each distinct name hits storage at most once per call.
//! - A lost creation race (`UniqueViolation`) resolves to the winner's row.

use crate::model::tag::{normalize_tag, Tag};
use crate::repo::article_repo::{ArticleStore, RepoError, RepoResult};
use log::debug;
use std::collections::HashMap;

/// Resolves raw tag names to stored tags, creating the missing ones.
pub fn resolve_tags<S, T>(store: &mut S, names: &[T]) -> RepoResult<Vec<Tag>>
where
    S: ArticleStore + ?Sized,
    T: AsRef<str>,
{
    let mut cache: HashMap<String, Tag> = HashMap::new();
    let mut resolved = Vec::with_capacity(names.len());

    for raw in names {
        let Some(name) = normalize_tag(raw.as_ref()) else {
            continue;
        };

        if let Some(tag) = cache.get(&name) {
            resolved.push(tag.clone());
            continue;
        }

        let tag = find_or_create(store, &name)?;
        cache.insert(name, tag.clone());
        resolved.push(tag);
    }

    Ok(resolved)
}

fn find_or_create<S>(store: &mut S, name: &str) -> RepoResult<Tag>
where
    S: ArticleStore + ?Sized,
{
    if let Some(existing) = store.find_tag_by_name(name)? {
        return Ok(existing);
    }

    match store.insert_tag(name) {
        Ok(created) => {
            debug!("event=tag_create module=tags status=ok tag={}", name);
            Ok(created)
        }
        Err(RepoError::UniqueViolation(_)) => {
            debug!(
                "event=tag_create module=tags status=race_lost tag={}",
                name
            );
            store.find_tag_by_name(name)?.ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "tag `{name}` rejected as duplicate but not found on re-query"
                ))
            })
        }
        Err(other) => Err(other),
    }
}
