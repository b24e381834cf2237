//! Generic web page adapter: headline links picked by a CSS selector.
//!
//! # Invariants
//! - Only absolute http(s) links survive; relative hrefs resolve against the
//!   page they were found on.
//! - Links back to the page itself, fragments and script/mail links are
//!   skipped.

use crate::model::metadata::RawItem;
use crate::source::filter::{Blacklist, CandidateCollector, Offer};
use crate::source::http::HttpClient;
use crate::source::{SourceAdapter, SourceContext, SourceError, SourceOptions};
use log::{debug, info, warn};
use scraper::{ElementRef, Html, Selector};
use std::num::NonZeroUsize;
use std::sync::Arc;
use url::Url;

pub const WEBPAGE_SOURCE: &str = "webpage";
pub const DEFAULT_HEADLINE_SELECTOR: &str = r#"a[data-testid="Heading"], h2 a, h3 a"#;
pub const DEFAULT_MIN_TITLE_WORDS: usize = 3;
const KNOWN_OPTIONS: &[&str] = &["url", "selector", "fallback_urls", "min_title_words", "label"];
const SKIPPED_HREF_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:", "data:"];

/// Scrapes headline anchors from one page plus optional fallbacks.
pub struct WebpageAdapter {
    http: Arc<dyn HttpClient>,
    label: String,
    pages: Vec<Url>,
    selector: Selector,
    min_title_words: usize,
    blacklist: Blacklist,
}

impl WebpageAdapter {
    /// Builds the adapter; the `url` option is required.
    ///
    /// Options: `url`, `fallback_urls` (comma separated), `selector`,
    /// `min_title_words`, `label` (source label, defaults to `webpage`).
    pub fn from_options(
        context: &SourceContext,
        options: &SourceOptions,
    ) -> Result<Self, SourceError> {
        let primary = options
            .get("url")
            .ok_or_else(|| SourceError::configuration(WEBPAGE_SOURCE, "missing `url` option"))?;
        options.warn_unused(WEBPAGE_SOURCE, KNOWN_OPTIONS);

        let mut pages = vec![parse_page_url(primary)?];
        if let Some(fallbacks) = options.get("fallback_urls") {
            for raw in fallbacks.split(',').map(str::trim).filter(|raw| !raw.is_empty()) {
                pages.push(parse_page_url(raw)?);
            }
        }

        let selector_text = options.get("selector").unwrap_or(DEFAULT_HEADLINE_SELECTOR);
        let selector = Selector::parse(selector_text).map_err(|err| {
            SourceError::configuration(
                WEBPAGE_SOURCE,
                format!("invalid selector `{selector_text}`: {err}"),
            )
        })?;

        let min_title_words = match options.get("min_title_words") {
            Some(raw) => raw.parse().map_err(|_| {
                SourceError::configuration(
                    WEBPAGE_SOURCE,
                    format!("min_title_words must be a non-negative integer, got `{raw}`"),
                )
            })?,
            None => DEFAULT_MIN_TITLE_WORDS,
        };

        Ok(Self {
            http: Arc::clone(&context.http),
            label: options.get("label").unwrap_or(WEBPAGE_SOURCE).to_string(),
            pages,
            selector,
            min_title_words,
            blacklist: context.blacklist.clone(),
        })
    }

    fn collect_page(&self, page: &Url, html: &str, collector: &mut CandidateCollector<'_>) {
        let document = Html::parse_document(html);
        for element in document.select(&self.selector) {
            if collector.is_full() {
                break;
            }
            let Some(url) = resolve_link(page, &element) else {
                continue;
            };
            let title = anchor_text(&element);
            if title.split_whitespace().count() < self.min_title_words {
                continue;
            }
            let item = RawItem {
                title: Some(title),
                url,
                ..RawItem::default()
            };
            if let Offer::Blacklisted(phrase) = collector.offer(item, None) {
                debug!(
                    "event=source_filter module=source source=webpage status=blacklisted phrase={}",
                    phrase
                );
            }
        }
    }
}

impl SourceAdapter for WebpageAdapter {
    fn name(&self) -> &str {
        &self.label
    }

    fn fetch_candidates(&mut self, limit: NonZeroUsize) -> Vec<RawItem> {
        let mut collector = CandidateCollector::new(limit.get(), &self.blacklist);

        for page in &self.pages {
            if collector.is_full() {
                break;
            }
            match self.http.get_text(page.as_str(), &[], &[]) {
                Ok(html) => self.collect_page(page, &html, &mut collector),
                Err(err) => warn!(
                    "event=source_fetch module=source source=webpage status=error page={} error={}",
                    page, err
                ),
            }
        }

        info!(
            "event=source_fetch module=source source=webpage status=ok label={} pages={} accepted={}",
            self.label,
            self.pages.len(),
            collector.len()
        );
        collector.into_items()
    }
}

fn parse_page_url(raw: &str) -> Result<Url, SourceError> {
    let url = Url::parse(raw).map_err(|err| {
        SourceError::configuration(WEBPAGE_SOURCE, format!("invalid page url `{raw}`: {err}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SourceError::configuration(
            WEBPAGE_SOURCE,
            format!("page url `{raw}` must use http or https"),
        ));
    }
    Ok(url)
}

fn resolve_link(page: &Url, element: &ElementRef<'_>) -> Option<String> {
    let href = element.value().attr("href")?.trim();
    if href.is_empty() || SKIPPED_HREF_PREFIXES.iter().any(|prefix| href.starts_with(prefix)) {
        return None;
    }
    let mut resolved = page.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);

    let mut page_without_fragment = page.clone();
    page_without_fragment.set_fragment(None);
    if resolved == page_without_fragment || resolved.path() == "/" {
        return None;
    }
    Some(resolved.into())
}

fn anchor_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
