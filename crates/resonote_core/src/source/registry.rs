//! In-process source registry.
//!
//! Maps source names to adapter factories so the pipeline can build a fresh
//! adapter per run from options and shared context.

use crate::source::guardian::GuardianAdapter;
use crate::source::reddit::RedditAdapter;
use crate::source::webpage::WebpageAdapter;
use crate::source::{SourceAdapter, SourceContext, SourceError, SourceOptions};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Builds one adapter instance for a run.
pub type SourceFactory = Arc<
    dyn Fn(&SourceContext, &SourceOptions) -> Result<Box<dyn SourceAdapter>, SourceError>
        + Send
        + Sync,
>;

/// Source registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRegistryError {
    InvalidSourceName(String),
    DuplicateSourceName(String),
}

impl Display for SourceRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSourceName(value) => write!(f, "source name is invalid: {value}"),
            Self::DuplicateSourceName(value) => {
                write!(f, "source name already registered: {value}")
            }
        }
    }
}

impl Error for SourceRegistryError {}

/// Name → factory table.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    factories: BTreeMap<String, SourceFactory>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `guardian`, `reddit` and `webpage`.
    pub fn with_builtin_sources() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            "guardian".to_string(),
            Arc::new(|context: &SourceContext, options: &SourceOptions| {
                GuardianAdapter::from_options(context, options)
                    .map(|adapter| Box::new(adapter) as Box<dyn SourceAdapter>)
            }),
        );
        registry.factories.insert(
            "reddit".to_string(),
            Arc::new(|context: &SourceContext, options: &SourceOptions| {
                RedditAdapter::from_options(context, options)
                    .map(|adapter| Box::new(adapter) as Box<dyn SourceAdapter>)
            }),
        );
        registry.factories.insert(
            "webpage".to_string(),
            Arc::new(|context: &SourceContext, options: &SourceOptions| {
                WebpageAdapter::from_options(context, options)
                    .map(|adapter| Box::new(adapter) as Box<dyn SourceAdapter>)
            }),
        );
        registry
    }

    /// Registers one factory under `name`.
    ///
    /// Lookup ignores ASCII case, so `feedX` and `feedx` name the same source.
    pub fn register(
        &mut self,
        name: &str,
        factory: SourceFactory,
    ) -> Result<(), SourceRegistryError> {
        let name = source_key(name);
        if !is_valid_source_name(&name) {
            return Err(SourceRegistryError::InvalidSourceName(name));
        }
        if self.factories.contains_key(name.as_str()) {
            return Err(SourceRegistryError::DuplicateSourceName(name));
        }

        self.factories.insert(name, factory);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&source_key(name))
    }

    /// Returns sorted source names.
    pub fn source_names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Builds a fresh adapter for `name`.
    ///
    /// # Errors
    /// - `UnknownSource` when nothing is registered under `name`.
    /// - `Configuration` when the factory rejects credentials or options.
    pub fn build(
        &self,
        name: &str,
        context: &SourceContext,
        options: &SourceOptions,
    ) -> Result<Box<dyn SourceAdapter>, SourceError> {
        let factory = self
            .factories
            .get(&source_key(name))
            .ok_or_else(|| SourceError::UnknownSource(name.trim().to_string()))?;
        factory(context, options)
    }
}

/// Names match case-insensitively; the registry stores them lowercased.
fn source_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn is_valid_source_name(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
