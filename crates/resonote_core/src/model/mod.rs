//! Domain model for curated articles.
//!
//! # Responsibility
//! - Define canonical records persisted by the article store.
//! - Define transient ingestion shapes (`RawItem`, `Metadata`).
//!
//! # Invariants
//! - Every stored article is identified by its `url_hash` fingerprint.
//! - Tags are shared vocabulary; articles only own their associations.

pub mod article;
pub mod fingerprint;
pub mod metadata;
pub mod tag;
