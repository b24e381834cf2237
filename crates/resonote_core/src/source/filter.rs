//! Per-fetch candidate filtering.
//!
//! # Invariants
//! - Blacklist phrases match case-insensitively against title, body and author.
//! - The first occurrence of a URL wins; later repeats are dropped.
//! - The collector never holds more than its limit.

use crate::model::metadata::RawItem;
use std::collections::HashSet;

/// Phrase dropped by default: correction notices are not articles.
pub const DEFAULT_BLACKLIST: &[&str] = &["corrections and clarifications"];

/// Case-insensitive phrase blacklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blacklist {
    phrases: Vec<String>,
}

impl Default for Blacklist {
    fn default() -> Self {
        Self::new(DEFAULT_BLACKLIST.iter().copied())
    }
}

impl Blacklist {
    /// Builds a blacklist; blank phrases are ignored.
    pub fn new<I, T>(phrases: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|phrase| phrase.as_ref().trim().to_lowercase())
            .filter(|phrase| !phrase.is_empty())
            .collect();
        Self { phrases }
    }

    pub fn empty() -> Self {
        Self {
            phrases: Vec::new(),
        }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Returns the first phrase contained in any of `texts`.
    pub fn matches(&self, texts: &[Option<&str>]) -> Option<&str> {
        let lowered: Vec<String> = texts.iter().flatten().map(|text| text.to_lowercase()).collect();
        self.phrases
            .iter()
            .find(|phrase| lowered.iter().any(|text| text.contains(phrase.as_str())))
            .map(String::as_str)
    }
}

/// Outcome of offering one candidate to a collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    /// URL missing or blank.
    Unusable,
    Blacklisted(String),
    DuplicateUrl,
    /// Limit already reached; nothing more is accepted.
    Full,
}

/// Accumulates accepted candidates for one `fetch_candidates` call.
#[derive(Debug)]
pub struct CandidateCollector<'b> {
    limit: usize,
    blacklist: &'b Blacklist,
    seen_urls: HashSet<String>,
    items: Vec<RawItem>,
}

impl<'b> CandidateCollector<'b> {
    pub fn new(limit: usize, blacklist: &'b Blacklist) -> Self {
        Self {
            limit,
            blacklist,
            seen_urls: HashSet::new(),
            items: Vec::with_capacity(limit.min(64)),
        }
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.limit
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Offers one candidate; `body` is only used for blacklist matching.
    pub fn offer(&mut self, item: RawItem, body: Option<&str>) -> Offer {
        if self.is_full() {
            return Offer::Full;
        }
        let url = item.url.trim();
        if url.is_empty() {
            return Offer::Unusable;
        }
        if let Some(phrase) =
            self.blacklist
                .matches(&[item.title.as_deref(), body, item.author.as_deref()])
        {
            return Offer::Blacklisted(phrase.to_string());
        }
        if !self.seen_urls.insert(url.to_string()) {
            return Offer::DuplicateUrl;
        }
        self.items.push(item);
        Offer::Accepted
    }

    pub fn into_items(self) -> Vec<RawItem> {
        self.items
    }
}
