//! Strict metadata schema validation.
//!
//! # Responsibility
//! - Gate normalized metadata before it may reach persistence.
//! - Reject unknown fields in serialized payloads to catch contract drift.
//!
//! # Invariants
//! - A returned `ValidatedMetadata` has a non-blank title and source, an
//!   absolute http(s) URL with a host, and a reading time >= 1.
//! - Validation never mutates the metadata it accepts.

use crate::model::metadata::{Metadata, ValidatedMetadata};
use std::error::Error;
use std::fmt::{Display, Formatter};
use url::Url;

/// Reason a metadata record was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingTitle,
    MissingSource,
    InvalidUrl { url: String, reason: String },
    NonPositiveReadingTime(u32),
    /// Payload did not match the schema (unknown or mistyped fields).
    Schema(String),
}

impl ValidationError {
    /// Name of the offending field, when there is exactly one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingTitle => Some("title"),
            Self::MissingSource => Some("source"),
            Self::InvalidUrl { .. } => Some("url"),
            Self::NonPositiveReadingTime(_) => Some("estimated_reading_time_min"),
            Self::Schema(_) => None,
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTitle => write!(f, "title is required and must not be blank"),
            Self::MissingSource => write!(f, "source is required and must not be blank"),
            Self::InvalidUrl { url, reason } => write!(f, "url `{url}` is invalid: {reason}"),
            Self::NonPositiveReadingTime(value) => write!(
                f,
                "estimated_reading_time_min must be a positive integer, got {value}"
            ),
            Self::Schema(message) => write!(f, "metadata schema mismatch: {message}"),
        }
    }
}

impl Error for ValidationError {}

/// Validates normalized metadata against the article schema.
pub fn validate(metadata: &Metadata) -> Result<ValidatedMetadata, ValidationError> {
    if metadata.title.trim().is_empty() {
        return Err(ValidationError::MissingTitle);
    }

    check_url(&metadata.url)?;

    if metadata.estimated_reading_time_min == 0 {
        return Err(ValidationError::NonPositiveReadingTime(
            metadata.estimated_reading_time_min,
        ));
    }

    if metadata.source.trim().is_empty() {
        return Err(ValidationError::MissingSource);
    }

    Ok(ValidatedMetadata::new_unchecked(metadata.clone()))
}

/// Validates a serialized metadata payload, rejecting unknown fields.
pub fn validate_json(value: serde_json::Value) -> Result<ValidatedMetadata, ValidationError> {
    let metadata: Metadata = serde_json::from_value(value)
        .map_err(|err| ValidationError::Schema(err.to_string()))?;
    validate(&metadata)
}

fn check_url(value: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidUrl {
        url: value.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(value).map_err(|err| invalid(&err.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("host is missing"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate, validate_json, ValidationError};
    use crate::model::article::ReadingStatus;
    use crate::model::metadata::Metadata;
    use serde_json::json;

    fn metadata() -> Metadata {
        Metadata {
            title: "Title".to_string(),
            author: None,
            url: "https://example.com/a".to_string(),
            source: "guardian".to_string(),
            estimated_reading_time_min: 3,
            reading_status: ReadingStatus::Unread,
            tags: vec![],
        }
    }

    #[test]
    fn accepts_well_formed_metadata() {
        let validated = validate(&metadata()).expect("metadata should validate");
        assert_eq!(validated.metadata(), &metadata());
    }

    #[test]
    fn rejects_blank_title() {
        let mut input = metadata();
        input.title = "  ".to_string();
        let err = validate(&input).unwrap_err();
        assert_eq!(err, ValidationError::MissingTitle);
        assert_eq!(err.field(), Some("title"));
    }

    #[test]
    fn rejects_relative_and_non_http_urls() {
        for url in ["not-a-url", "/relative/path", "ftp://example.com/file", "mailto:a@b.c"] {
            let mut input = metadata();
            input.url = url.to_string();
            let err = validate(&input).expect_err("url should be rejected");
            assert_eq!(err.field(), Some("url"), "url `{url}`");
        }
    }

    #[test]
    fn rejects_zero_reading_time_and_blank_source() {
        let mut input = metadata();
        input.estimated_reading_time_min = 0;
        assert_eq!(
            validate(&input).unwrap_err(),
            ValidationError::NonPositiveReadingTime(0)
        );

        let mut input = metadata();
        input.source = String::new();
        assert_eq!(validate(&input).unwrap_err(), ValidationError::MissingSource);
    }

    #[test]
    fn json_payload_with_unknown_field_is_rejected() {
        let payload = json!({
            "title": "Title",
            "author": null,
            "url": "https://example.com/a",
            "source": "guardian",
            "estimated_reading_time_min": 3,
            "content": "unexpected"
        });
        let err = validate_json(payload).unwrap_err();
        assert!(matches!(err, ValidationError::Schema(message) if message.contains("content")));
    }

    #[test]
    fn json_payload_with_negative_reading_time_is_rejected() {
        let payload = json!({
            "title": "Title",
            "author": null,
            "url": "https://example.com/a",
            "source": "guardian",
            "estimated_reading_time_min": -1
        });
        assert!(matches!(
            validate_json(payload),
            Err(ValidationError::Schema(_))
        ));
    }

    #[test]
    fn json_payload_defaults_status_and_tags() {
        let payload = json!({
            "title": "Title",
            "author": "Reporter",
            "url": "https://example.com/a",
            "source": "guardian",
            "estimated_reading_time_min": 4
        });
        let validated = validate_json(payload).expect("payload should validate");
        assert_eq!(validated.metadata().reading_status, ReadingStatus::Unread);
        assert!(validated.metadata().tags.is_empty());
    }
}
