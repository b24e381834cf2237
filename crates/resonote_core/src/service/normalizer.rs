//! Raw item normalization.
//!
//! # Responsibility
//! - Turn an adapter `RawItem` plus source label into canonical `Metadata`.
//! - Apply fallback rules for missing title, author, tags and reading time.
//!
//! # Invariants
//! - Pure function: no I/O, no logging, same input yields same output.
//! - Newly normalized items are always `unread`.

use crate::model::article::ReadingStatus;
use crate::model::metadata::{Metadata, RawItem};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Reading time used when the pipeline does not know the body length.
pub const DEFAULT_READING_TIME_MIN: u32 = 3;
/// Words per minute used to estimate reading time from a word count.
pub const WORDS_PER_MINUTE: u32 = 200;
/// Maximum number of tags derived from a URL path.
pub const MAX_DERIVED_TAGS: usize = 5;

static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-_/]+").expect("valid separator regex"));

/// Normalizes one raw candidate into canonical metadata.
pub fn normalize(raw: &RawItem, source: &str) -> Metadata {
    let parsed = Url::parse(raw.url.trim()).ok();
    let segments = parsed.as_ref().map(path_segments).unwrap_or_default();

    let title = raw
        .title
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback_title(parsed.as_ref(), &segments));

    let author = raw
        .author
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let tags = if raw.tags.is_empty() {
        derive_tags(&segments)
    } else {
        raw.tags.clone()
    };

    Metadata {
        title,
        author,
        url: raw.url.trim().to_string(),
        source: source.to_string(),
        estimated_reading_time_min: estimate_reading_time(raw.word_count),
        reading_status: ReadingStatus::Unread,
        tags,
    }
}

/// `ceil(word_count / 200)`, at least 1; the default when unknown.
pub fn estimate_reading_time(word_count: Option<u32>) -> u32 {
    match word_count {
        Some(words) => words.div_ceil(WORDS_PER_MINUTE).max(1),
        None => DEFAULT_READING_TIME_MIN,
    }
}

fn path_segments(url: &Url) -> Vec<String> {
    url.path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn fallback_title(url: Option<&Url>, segments: &[String]) -> String {
    match (segments.last(), url) {
        (Some(last), _) => title_case(&SEPARATOR_RE.replace_all(last, " ")),
        (None, Some(url)) => {
            let host = url.host_str().unwrap_or_default();
            match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            }
        }
        (None, None) => String::new(),
    }
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn derive_tags(segments: &[String]) -> Vec<String> {
    segments
        .iter()
        .filter(|segment| {
            segment.chars().count() > 2 && segment.chars().all(char::is_alphabetic)
        })
        .map(|segment| segment.to_lowercase())
        .take(MAX_DERIVED_TAGS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{estimate_reading_time, normalize, DEFAULT_READING_TIME_MIN};
    use crate::model::article::ReadingStatus;
    use crate::model::metadata::RawItem;

    #[test]
    fn keeps_upstream_title_and_author() {
        let raw = RawItem::new("  Gut bacteria and stroke ", "https://newatlas.com/stroke/gut")
            .with_author("Jane Doe");
        let metadata = normalize(&raw, "reddit");
        assert_eq!(metadata.title, "Gut bacteria and stroke");
        assert_eq!(metadata.author.as_deref(), Some("Jane Doe"));
        assert_eq!(metadata.source, "reddit");
        assert_eq!(metadata.reading_status, ReadingStatus::Unread);
    }

    #[test]
    fn derives_title_from_last_path_segment() {
        let raw = RawItem {
            url: "https://newatlas.com/stroke/gut-microbiome_STROKE/".to_string(),
            ..RawItem::default()
        };
        let metadata = normalize(&raw, "web");
        assert_eq!(metadata.title, "Gut Microbiome Stroke");
    }

    #[test]
    fn falls_back_to_host_when_path_is_empty() {
        let raw = RawItem {
            title: Some("   ".to_string()),
            url: "https://www.example.org/".to_string(),
            ..RawItem::default()
        };
        assert_eq!(normalize(&raw, "web").title, "www.example.org");
    }

    #[test]
    fn host_fallback_keeps_explicit_port() {
        let raw = RawItem {
            url: "http://localhost:8080/".to_string(),
            ..RawItem::default()
        };
        assert_eq!(normalize(&raw, "web").title, "localhost:8080");
    }

    #[test]
    fn unparseable_url_without_title_leaves_title_empty() {
        let raw = RawItem {
            url: "not-a-url".to_string(),
            ..RawItem::default()
        };
        assert_eq!(normalize(&raw, "reddit").title, "");
    }

    #[test]
    fn derives_alphabetic_tags_from_path_in_order() {
        let raw = RawItem::new(
            "t",
            "https://site.com/World/2024/oct/Science/ab/tech/space/health/extra/more",
        );
        let metadata = normalize(&raw, "web");
        assert_eq!(
            metadata.tags,
            vec!["world", "oct", "science", "tech", "space"]
        );
    }

    #[test]
    fn adapter_tags_take_precedence() {
        let raw = RawItem::new("t", "https://site.com/world/news").with_tags(["Politics"]);
        assert_eq!(normalize(&raw, "guardian").tags, vec!["Politics"]);
    }

    #[test]
    fn blank_author_becomes_none() {
        let raw = RawItem::new("t", "https://site.com/a").with_author("  ");
        assert_eq!(normalize(&raw, "reddit").author, None);
    }

    #[test]
    fn reading_time_uses_word_count_when_known() {
        assert_eq!(estimate_reading_time(None), DEFAULT_READING_TIME_MIN);
        assert_eq!(estimate_reading_time(Some(0)), 1);
        assert_eq!(estimate_reading_time(Some(200)), 1);
        assert_eq!(estimate_reading_time(Some(201)), 2);
        assert_eq!(estimate_reading_time(Some(1234)), 7);
    }
}
