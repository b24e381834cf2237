//! Source adapters that produce raw ingestion candidates.
//!
//! # Responsibility
//! - Define the adapter contract (`SourceAdapter`) and its build inputs.
//! - Host concrete adapters: link aggregator (`reddit`), news API
//!   (`guardian`) and generic web page (`webpage`).
//!
//! # Invariants
//! - Missing credentials/options fail at construction, never mid-fetch.
//! - `fetch_candidates` never fails: transient upstream errors are logged
//!   and the adapter moves to its next pagination strategy.
//! - A single fetch never returns two items with the same URL and never
//!   more than `limit` items.

use crate::model::metadata::RawItem;
use log::warn;
use std::collections::BTreeMap;
use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::num::NonZeroUsize;
use std::sync::Arc;

pub mod filter;
pub mod guardian;
pub mod http;
pub mod reddit;
pub mod registry;
pub mod webpage;

pub use filter::{Blacklist, CandidateCollector, Offer};
pub use http::{HttpClient, HttpError, ReqwestHttpClient};
pub use registry::{SourceFactory, SourceRegistry, SourceRegistryError};

pub const GUARDIAN_API_KEY: &str = "GUARDIAN_API_KEY";
pub const REDDIT_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const REDDIT_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const REDDIT_USER_AGENT: &str = "REDDIT_USER_AGENT";

const CREDENTIAL_KEYS: &[&str] = &[
    GUARDIAN_API_KEY,
    REDDIT_CLIENT_ID,
    REDDIT_CLIENT_SECRET,
    REDDIT_USER_AGENT,
];

/// Adapter contract: one instance per external source.
pub trait SourceAdapter {
    /// Origin label stamped on every article from this adapter.
    fn name(&self) -> &str;

    /// Re-queries upstream and returns at most `limit` accepted candidates.
    fn fetch_candidates(&mut self, limit: NonZeroUsize) -> Vec<RawItem>;
}

/// Build-time and fetch-time source errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    UnknownSource(String),
    /// Missing or malformed credential/option for the named source.
    Configuration { source_name: String, message: String },
}

impl SourceError {
    pub fn configuration(source_name: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSource(name) => write!(f, "unknown source: {name}"),
            Self::Configuration {
                source_name,
                message,
            } => write!(f, "source `{source_name}` is misconfigured: {message}"),
        }
    }
}

impl Error for SourceError {}

/// Free-form per-run adapter options (`subreddit`, `section`, `url`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOptions {
    values: BTreeMap<String, String>,
}

impl SourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds options from `key=value` style pairs; later keys win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(key, value)| (key.into().trim().to_string(), value.into()))
            .collect();
        Self { values }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into().trim().to_string(), value.into());
    }

    /// Returns a non-blank option value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Logs every option key the adapter does not understand.
    pub fn warn_unused(&self, source_name: &str, known: &[&str]) {
        for (key, value) in &self.values {
            if !known.contains(&key.as_str()) {
                warn!(
                    "event=source_options module=source status=ignored source={} key={} value={}",
                    source_name, key, value
                );
            }
        }
    }
}

/// Credentials looked up by adapters at construction time.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SourceCredentials {
    values: BTreeMap<String, String>,
}

impl std::fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SourceCredentials {
    /// Reads known credential variables from the process environment.
    ///
    /// `USER_AGENT` is accepted as a fallback for `REDDIT_USER_AGENT`.
    pub fn from_env() -> Self {
        let mut credentials = Self::default();
        for key in CREDENTIAL_KEYS {
            if let Ok(value) = env::var(key) {
                credentials = credentials.with(*key, value);
            }
        }
        if credentials.get(REDDIT_USER_AGENT).is_none() {
            if let Ok(value) = env::var("USER_AGENT") {
                credentials = credentials.with(REDDIT_USER_AGENT, value);
            }
        }
        credentials
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Returns the credential or a configuration error naming it.
    pub fn require(&self, source_name: &str, key: &str) -> Result<String, SourceError> {
        self.get(key).map(str::to_string).ok_or_else(|| {
            SourceError::configuration(source_name, format!("missing {key} in environment"))
        })
    }
}

/// Shared inputs handed to every adapter factory.
#[derive(Clone)]
pub struct SourceContext {
    pub credentials: SourceCredentials,
    pub http: Arc<dyn HttpClient>,
    pub blacklist: Blacklist,
}

impl SourceContext {
    pub fn new(credentials: SourceCredentials, http: Arc<dyn HttpClient>) -> Self {
        Self {
            credentials,
            http,
            blacklist: Blacklist::default(),
        }
    }

    pub fn with_blacklist(mut self, blacklist: Blacklist) -> Self {
        self.blacklist = blacklist;
        self
    }
}

/// Path segments of `url` shorter than 20 characters, capped at 5.
pub(crate) fn path_tags(url: &str) -> Vec<String> {
    let Ok(parsed) = url::Url::parse(url) else {
        return Vec::new();
    };
    parsed
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty() && segment.chars().count() < 20)
        .take(5)
        .map(str::to_string)
        .collect()
}
