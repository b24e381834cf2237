//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`Contention`, `UniqueViolation`,
//!   `NotFound`) in addition to DB transport errors.

pub mod article_repo;
pub mod library_repo;
pub mod reflection_repo;
