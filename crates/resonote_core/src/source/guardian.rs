//! Curated news API adapter (Guardian content search).
//!
//! # Invariants
//! - Paywalled results are never emitted.
//! - Orderings are tried newest, relevance, oldest until the limit is met.

use crate::model::metadata::RawItem;
use crate::source::filter::{Blacklist, CandidateCollector, Offer};
use crate::source::http::{HttpClient, HttpError};
use crate::source::{
    path_tags, SourceAdapter, SourceContext, SourceError, SourceOptions, GUARDIAN_API_KEY,
};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;

pub const GUARDIAN_SOURCE: &str = "guardian";
pub const GUARDIAN_SEARCH_URL: &str = "https://content.guardianapis.com/search";
pub const DEFAULT_SECTION: &str = "news";
const ORDERINGS: [&str; 3] = ["newest", "relevance", "oldest"];
const MAX_PAGE_SIZE: usize = 50;
const KNOWN_OPTIONS: &[&str] = &["section", "query"];

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchResponse,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    web_title: Option<String>,
    web_url: Option<String>,
    #[serde(default)]
    fields: ResultFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultFields {
    byline: Option<String>,
    body_text: Option<String>,
    trail_text: Option<String>,
    wordcount: Option<Value>,
    access: Option<String>,
    is_accessible_for_free: Option<Value>,
}

impl ResultFields {
    fn is_paywalled(&self) -> bool {
        let subscription = self
            .access
            .as_deref()
            .is_some_and(|value| value.eq_ignore_ascii_case("subscription"));
        let not_free = match &self.is_accessible_for_free {
            Some(Value::Bool(free)) => !free,
            Some(Value::String(free)) => free.eq_ignore_ascii_case("false"),
            _ => false,
        };
        subscription || not_free
    }

    fn word_count(&self) -> Option<u32> {
        match &self.wordcount {
            Some(Value::Number(number)) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
            Some(Value::String(text)) => text.trim().parse().ok(),
            _ => None,
        }
    }

    fn body(&self) -> Option<&str> {
        self.body_text.as_deref().or(self.trail_text.as_deref())
    }
}

/// Guardian content search adapter.
pub struct GuardianAdapter {
    http: Arc<dyn HttpClient>,
    api_key: String,
    section: String,
    query: Option<String>,
    blacklist: Blacklist,
}

impl GuardianAdapter {
    /// Builds the adapter; `GUARDIAN_API_KEY` is required.
    pub fn from_options(
        context: &SourceContext,
        options: &SourceOptions,
    ) -> Result<Self, SourceError> {
        let api_key = context.credentials.require(GUARDIAN_SOURCE, GUARDIAN_API_KEY)?;
        options.warn_unused(GUARDIAN_SOURCE, KNOWN_OPTIONS);
        Ok(Self {
            http: Arc::clone(&context.http),
            api_key,
            section: options.get("section").unwrap_or(DEFAULT_SECTION).to_string(),
            query: options.get("query").map(str::to_string),
            blacklist: context.blacklist.clone(),
        })
    }

    fn search(&self, order_by: &str, page_size: usize) -> Result<Vec<SearchResult>, HttpError> {
        let page_size = page_size.to_string();
        let mut query = vec![
            ("api-key", self.api_key.as_str()),
            ("section", self.section.as_str()),
            ("page-size", page_size.as_str()),
            ("order-by", order_by),
            ("show-fields", "all"),
        ];
        if let Some(q) = self.query.as_deref() {
            query.push(("q", q));
        }
        let body = self.http.get_text(GUARDIAN_SEARCH_URL, &query, &[])?;
        let envelope: SearchEnvelope = serde_json::from_str(&body)?;
        Ok(envelope.response.results)
    }
}

impl SourceAdapter for GuardianAdapter {
    fn name(&self) -> &str {
        GUARDIAN_SOURCE
    }

    fn fetch_candidates(&mut self, limit: NonZeroUsize) -> Vec<RawItem> {
        let mut collector = CandidateCollector::new(limit.get(), &self.blacklist);
        let mut paywalled = 0usize;

        for order_by in ORDERINGS {
            if collector.is_full() {
                break;
            }
            let results = match self.search(order_by, limit.get().min(MAX_PAGE_SIZE)) {
                Ok(results) => results,
                Err(err) => {
                    warn!(
                        "event=source_fetch module=source source=guardian status=error order_by={} error={}",
                        order_by, err
                    );
                    continue;
                }
            };

            for result in results {
                let Some(url) = result.web_url.filter(|url| !url.trim().is_empty()) else {
                    continue;
                };
                if result.fields.is_paywalled() {
                    paywalled += 1;
                    continue;
                }
                let item = RawItem {
                    title: result.web_title,
                    tags: path_tags(&url),
                    url,
                    author: result.fields.byline.clone(),
                    word_count: result.fields.word_count(),
                };
                if let Offer::Blacklisted(phrase) = collector.offer(item, result.fields.body()) {
                    debug!(
                        "event=source_filter module=source source=guardian status=blacklisted phrase={}",
                        phrase
                    );
                }
                if collector.is_full() {
                    break;
                }
            }
        }

        info!(
            "event=source_fetch module=source source=guardian status=ok section={} accepted={} paywalled={}",
            self.section,
            collector.len(),
            paywalled
        );
        collector.into_items()
    }
}

#[cfg(test)]
mod tests {
    use super::{GuardianAdapter, GUARDIAN_SEARCH_URL};
    use crate::source::http::{HttpClient, HttpError};
    use crate::source::{
        SourceAdapter, SourceContext, SourceCredentials, SourceOptions, GUARDIAN_API_KEY,
    };
    use serde_json::json;
    use std::collections::VecDeque;
    use std::num::NonZeroUsize;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct ScriptedHttp {
        responses: Mutex<VecDeque<Result<String, HttpError>>>,
        requests: Mutex<Vec<Vec<(String, String)>>>,
    }

    impl ScriptedHttp {
        fn with(responses: Vec<Result<String, HttpError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::default(),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn param(&self, index: usize, key: &str) -> Option<String> {
            self.requests.lock().unwrap()[index]
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
        }
    }

    impl HttpClient for ScriptedHttp {
        fn get_text(
            &self,
            url: &str,
            query: &[(&str, &str)],
            _headers: &[(&str, &str)],
        ) -> Result<String, HttpError> {
            assert_eq!(url, GUARDIAN_SEARCH_URL);
            self.requests.lock().unwrap().push(
                query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::Transport("no scripted response".to_string())))
        }

        fn post_form(
            &self,
            url: &str,
            _form: &[(&str, &str)],
            _basic_auth: Option<(&str, &str)>,
            _headers: &[(&str, &str)],
        ) -> Result<String, HttpError> {
            panic!("unexpected POST to {url}");
        }
    }

    fn adapter(http: Arc<ScriptedHttp>, options: SourceOptions) -> GuardianAdapter {
        let credentials = SourceCredentials::default().with(GUARDIAN_API_KEY, "test-key");
        let context = SourceContext::new(credentials, http);
        GuardianAdapter::from_options(&context, &options).expect("adapter should build")
    }

    fn page(results: serde_json::Value) -> Result<String, HttpError> {
        Ok(json!({ "response": { "status": "ok", "results": results } }).to_string())
    }

    fn limit(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    #[test]
    fn maps_results_and_sends_expected_query() {
        let http = ScriptedHttp::with(vec![page(json!([{
            "webTitle": "Storm hits coast",
            "webUrl": "https://www.theguardian.com/world/2024/oct/12/storm",
            "fields": { "byline": "A Reporter", "wordcount": "612", "bodyText": "Wind." }
        }]))]);
        let mut adapter = adapter(
            Arc::clone(&http),
            SourceOptions::from_pairs([("section", "world"), ("query", "storm")]),
        );

        let items = adapter.fetch_candidates(limit(1));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("Storm hits coast"));
        assert_eq!(items[0].author.as_deref(), Some("A Reporter"));
        assert_eq!(items[0].word_count, Some(612));
        assert_eq!(items[0].tags, vec!["world", "2024", "oct", "12", "storm"]);

        assert_eq!(http.request_count(), 1);
        assert_eq!(http.param(0, "api-key").as_deref(), Some("test-key"));
        assert_eq!(http.param(0, "section").as_deref(), Some("world"));
        assert_eq!(http.param(0, "q").as_deref(), Some("storm"));
        assert_eq!(http.param(0, "order-by").as_deref(), Some("newest"));
        assert_eq!(http.param(0, "page-size").as_deref(), Some("1"));
    }

    #[test]
    fn drops_paywalled_and_blacklisted_results() {
        let http = ScriptedHttp::with(vec![page(json!([
            {
                "webTitle": "Premium story",
                "webUrl": "https://www.theguardian.com/news/premium",
                "fields": { "isAccessibleForFree": "false" }
            },
            {
                "webTitle": "Members only",
                "webUrl": "https://www.theguardian.com/news/members",
                "fields": { "access": "subscription" }
            },
            {
                "webTitle": "Corrections and clarifications",
                "webUrl": "https://www.theguardian.com/news/corrections"
            },
            {
                "webTitle": "Open story",
                "webUrl": "https://www.theguardian.com/news/open",
                "fields": { "isAccessibleForFree": "true" }
            }
        ]))]);
        let mut adapter = adapter(http, SourceOptions::new());

        let items = adapter.fetch_candidates(limit(4));
        let titles: Vec<_> = items.iter().filter_map(|item| item.title.as_deref()).collect();
        assert_eq!(titles, vec!["Open story"]);
    }

    #[test]
    fn falls_through_all_orderings_on_errors() {
        let http = ScriptedHttp::with(vec![
            Err(HttpError::Status {
                url: GUARDIAN_SEARCH_URL.to_string(),
                status: 500,
            }),
            Err(HttpError::RateLimited {
                url: GUARDIAN_SEARCH_URL.to_string(),
            }),
            Ok("not json".to_string()),
        ]);
        let mut adapter = adapter(Arc::clone(&http), SourceOptions::new());

        assert!(adapter.fetch_candidates(limit(3)).is_empty());
        assert_eq!(http.request_count(), 3);
        assert_eq!(http.param(1, "order-by").as_deref(), Some("relevance"));
        assert_eq!(http.param(2, "order-by").as_deref(), Some("oldest"));
    }

    #[test]
    fn repeated_result_across_orderings_is_kept_once() {
        let same = json!([{
            "webTitle": "Same story",
            "webUrl": "https://www.theguardian.com/news/same"
        }]);
        let http = ScriptedHttp::with(vec![page(same.clone()), page(same.clone()), page(same)]);
        let mut adapter = adapter(Arc::clone(&http), SourceOptions::new());

        let items = adapter.fetch_candidates(limit(3));
        assert_eq!(items.len(), 1);
        assert_eq!(http.request_count(), 3);
    }

    #[test]
    fn stops_paging_once_limit_is_met() {
        let http = ScriptedHttp::with(vec![page(json!([
            { "webTitle": "One", "webUrl": "https://www.theguardian.com/news/one" },
            { "webTitle": "Two", "webUrl": "https://www.theguardian.com/news/two" }
        ]))]);
        let mut adapter = adapter(Arc::clone(&http), SourceOptions::new());

        assert_eq!(adapter.fetch_candidates(limit(2)).len(), 2);
        assert_eq!(http.request_count(), 1);
    }
}
