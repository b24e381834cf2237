//! Link aggregator adapter (Reddit listings over app-only OAuth).
//!
//! # Invariants
//! - Self posts are never emitted; only outbound links are candidates.
//! - The access token is requested once per adapter and reused across
//!   listing strategies.

use crate::model::metadata::RawItem;
use crate::source::filter::{Blacklist, CandidateCollector, Offer};
use crate::source::http::{HttpClient, HttpError};
use crate::source::{
    path_tags, SourceAdapter, SourceContext, SourceError, SourceOptions, REDDIT_CLIENT_ID,
    REDDIT_CLIENT_SECRET, REDDIT_USER_AGENT,
};
use log::{debug, info, warn};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::sync::Arc;

pub const REDDIT_SOURCE: &str = "reddit";
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
pub const DEFAULT_SUBREDDIT: &str = "news";
const MAX_LISTING_LIMIT: usize = 100;
const KNOWN_OPTIONS: &[&str] = &["subreddit"];

/// Listing endpoint plus optional `t` time window.
const STRATEGIES: [(&str, Option<&str>); 4] = [
    ("top", Some("day")),
    ("top", Some("week")),
    ("hot", None),
    ("new", None),
];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: Option<String>,
    url: Option<String>,
    author: Option<String>,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    selftext: String,
}

/// Reddit subreddit listing adapter.
pub struct RedditAdapter {
    http: Arc<dyn HttpClient>,
    client_id: String,
    client_secret: String,
    user_agent: String,
    subreddit: String,
    blacklist: Blacklist,
    access_token: Option<String>,
}

impl RedditAdapter {
    /// Builds the adapter; client id, secret and user agent are required.
    pub fn from_options(
        context: &SourceContext,
        options: &SourceOptions,
    ) -> Result<Self, SourceError> {
        let credentials = &context.credentials;
        let client_id = credentials.require(REDDIT_SOURCE, REDDIT_CLIENT_ID)?;
        let client_secret = credentials.require(REDDIT_SOURCE, REDDIT_CLIENT_SECRET)?;
        let user_agent = credentials.require(REDDIT_SOURCE, REDDIT_USER_AGENT)?;
        options.warn_unused(REDDIT_SOURCE, KNOWN_OPTIONS);

        let subreddit = options
            .get("subreddit")
            .unwrap_or(DEFAULT_SUBREDDIT)
            .trim_start_matches("r/")
            .to_string();
        if !subreddit
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(SourceError::configuration(
                REDDIT_SOURCE,
                format!("invalid subreddit `{subreddit}`"),
            ));
        }

        Ok(Self {
            http: Arc::clone(&context.http),
            client_id,
            client_secret,
            user_agent,
            subreddit,
            blacklist: context.blacklist.clone(),
            access_token: None,
        })
    }

    fn token(&mut self) -> Result<String, HttpError> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }
        let body = self.http.post_form(
            REDDIT_TOKEN_URL,
            &[("grant_type", "client_credentials")],
            Some((self.client_id.as_str(), self.client_secret.as_str())),
            &[("User-Agent", self.user_agent.as_str())],
        )?;
        let token: TokenResponse = serde_json::from_str(&body)?;
        self.access_token = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    fn listing(
        &self,
        token: &str,
        sort: &str,
        window: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Post>, HttpError> {
        let url = format!("{REDDIT_API_BASE}/r/{}/{sort}", self.subreddit);
        let limit = limit.to_string();
        let mut query = vec![("limit", limit.as_str()), ("raw_json", "1")];
        if let Some(window) = window {
            query.push(("t", window));
        }
        let authorization = format!("bearer {token}");
        let headers = [
            ("Authorization", authorization.as_str()),
            ("User-Agent", self.user_agent.as_str()),
        ];
        let body = self.http.get_text(&url, &query, &headers)?;
        let listing: Listing = serde_json::from_str(&body)?;
        Ok(listing.data.children.into_iter().map(|child| child.data).collect())
    }
}

impl SourceAdapter for RedditAdapter {
    fn name(&self) -> &str {
        REDDIT_SOURCE
    }

    fn fetch_candidates(&mut self, limit: NonZeroUsize) -> Vec<RawItem> {
        let token = match self.token() {
            Ok(token) => token,
            Err(err) => {
                warn!(
                    "event=source_auth module=source source=reddit status=error error={}",
                    err
                );
                return Vec::new();
            }
        };

        let mut collector = CandidateCollector::new(limit.get(), &self.blacklist);
        let mut self_posts = 0usize;

        for (sort, window) in STRATEGIES {
            if collector.is_full() {
                break;
            }
            let posts = match self.listing(&token, sort, window, limit.get().min(MAX_LISTING_LIMIT))
            {
                Ok(posts) => posts,
                Err(err) => {
                    warn!(
                        "event=source_fetch module=source source=reddit status=error subreddit={} sort={} window={} error={}",
                        self.subreddit,
                        sort,
                        window.unwrap_or("-"),
                        err
                    );
                    continue;
                }
            };

            for post in posts {
                if post.is_self {
                    self_posts += 1;
                    continue;
                }
                let Some(url) = post.url.filter(|url| !url.trim().is_empty()) else {
                    continue;
                };
                let author = post
                    .author
                    .filter(|author| author != "[deleted]" && !author.trim().is_empty());
                let item = RawItem {
                    title: post.title,
                    tags: path_tags(&url),
                    url,
                    author,
                    word_count: None,
                };
                let body = Some(post.selftext.as_str()).filter(|text| !text.is_empty());
                if let Offer::Blacklisted(phrase) = collector.offer(item, body) {
                    debug!(
                        "event=source_filter module=source source=reddit status=blacklisted phrase={}",
                        phrase
                    );
                }
                if collector.is_full() {
                    break;
                }
            }
        }

        info!(
            "event=source_fetch module=source source=reddit status=ok subreddit={} accepted={} self_posts={}",
            self.subreddit,
            collector.len(),
            self_posts
        );
        collector.into_items()
    }
}
