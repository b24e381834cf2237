//! Find-or-create article persistence with bounded retry.
//!
//! # Responsibility
//! - Turn validated metadata into exactly one stored article per URL.
//! - Retry the full lookup-then-insert unit when the store is contended.
//!
//! # Invariants
//! - First write wins: an existing article is returned unchanged.
//! - At most `RetryPolicy::max_attempts` attempts per call; every failed
//!   attempt is rolled back before the next one starts.
//! - A lost url_hash race resolves to the winner's article, including on
//!   the final attempt.
//! - Waiting goes through `Sleeper`, never `std::thread::sleep` directly.

use crate::model::article::{Article, NewArticle};
use crate::model::metadata::ValidatedMetadata;
use crate::repo::article_repo::{ArticleStore, RepoError};
use crate::service::tag_service::resolve_tags;
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failed attempt.
    Fixed(Duration),
    /// `base * attempt` after the n-th failed attempt.
    Linear { base: Duration },
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Linear { base } => base.saturating_mul(attempt.max(1)),
        }
    }
}

/// Bounded retry policy for contended writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Builds a policy; `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Backoff::Fixed(DEFAULT_BACKOFF))
    }
}

/// Waiting primitive used between retry attempts.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Result of one `save_or_get` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The URL was new; this article was just stored.
    Created(Article),
    /// An article with the same fingerprint already existed.
    Existing(Article),
}

impl SaveOutcome {
    pub fn article(&self) -> &Article {
        match self {
            Self::Created(article) | Self::Existing(article) => article,
        }
    }

    pub fn into_article(self) -> Article {
        match self {
            Self::Created(article) | Self::Existing(article) => article,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Persistence failure for a single item.
#[derive(Debug)]
pub enum PersistError {
    /// Every attempt hit a contended store.
    ContentionExhausted { attempts: u32, last_error: RepoError },
    /// Non-retryable storage failure.
    Repo(RepoError),
}

impl PersistError {
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::ContentionExhausted { .. })
    }
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContentionExhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "failed to insert article after {attempts} attempts (still locked): {last_error}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ContentionExhausted { last_error, .. } => Some(last_error),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for PersistError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Coordinates dedup-or-insert against an `ArticleStore`.
pub struct PersistenceCoordinator<Z: Sleeper = ThreadSleeper> {
    policy: RetryPolicy,
    sleeper: Z,
    last_attempts: u32,
    last_rollbacks: u32,
}

impl PersistenceCoordinator<ThreadSleeper> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, ThreadSleeper)
    }
}

impl Default for PersistenceCoordinator<ThreadSleeper> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<Z: Sleeper> PersistenceCoordinator<Z> {
    pub fn with_sleeper(policy: RetryPolicy, sleeper: Z) -> Self {
        Self {
            policy,
            sleeper,
            last_attempts: 0,
            last_rollbacks: 0,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn sleeper(&self) -> &Z {
        &self.sleeper
    }

    /// Attempts made by the most recent `save_or_get` call.
    pub fn attempts(&self) -> u32 {
        self.last_attempts
    }

    /// Rollbacks of failed attempts during the most recent call.
    pub fn rollbacks(&self) -> u32 {
        self.last_rollbacks
    }

    /// Returns the stored article for `metadata.url`, creating it if absent.
    ///
    /// # Errors
    /// - `ContentionExhausted` when every attempt met a locked store.
    /// - `Repo` for any other storage failure (not retried).
    pub fn save_or_get<S>(
        &mut self,
        store: &mut S,
        metadata: &ValidatedMetadata,
    ) -> Result<SaveOutcome, PersistError>
    where
        S: ArticleStore + ?Sized,
    {
        self.last_attempts = 0;
        self.last_rollbacks = 0;
        let max_attempts = self.policy.max_attempts();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            self.last_attempts = attempt;
            let err = match attempt_once(store, metadata) {
                Ok(outcome) => {
                    if attempt > 1 {
                        info!(
                            "event=article_save module=persistence status=recovered attempts={} url={}",
                            attempt,
                            metadata.url()
                        );
                    }
                    return Ok(outcome);
                }
                Err(err) => err,
            };

            self.rollback_failed_attempt(store);

            match err {
                RepoError::Contention(_) => {
                    let delay = self.policy.backoff().delay(attempt);
                    warn!(
                        "event=article_save module=persistence status=retry attempt={} max_attempts={} delay_ms={} url={} error={}",
                        attempt,
                        max_attempts,
                        delay.as_millis(),
                        metadata.url(),
                        err
                    );
                    if attempt < max_attempts {
                        self.sleeper.sleep(delay);
                    }
                    last_error = Some(err);
                }
                // Lost the insert race on url_hash: the next lookup sees the winner.
                RepoError::UniqueViolation(_) => {
                    debug!(
                        "event=article_save module=persistence status=race_lost attempt={} url={}",
                        attempt,
                        metadata.url()
                    );
                    last_error = Some(err);
                }
                other => {
                    error!(
                        "event=article_save module=persistence status=error attempt={} url={} error={}",
                        attempt,
                        metadata.url(),
                        other
                    );
                    return Err(PersistError::Repo(other));
                }
            }
        }

        match last_error {
            Some(err @ RepoError::Contention(_)) => {
                error!(
                    "event=article_save module=persistence status=exhausted attempts={} url={}",
                    max_attempts,
                    metadata.url()
                );
                Err(PersistError::ContentionExhausted {
                    attempts: max_attempts,
                    last_error: err,
                })
            }
            // The winner of a url_hash race committed before our last
            // insert; it is visible now even though the budget is spent.
            Some(err @ RepoError::UniqueViolation(_)) => {
                let url_hash = NewArticle::from_validated(metadata).url_hash;
                match store.find_by_url_hash(&url_hash)? {
                    Some(existing) => {
                        debug!(
                            "event=article_save module=persistence status=existing_after_race attempts={} url_hash={}",
                            max_attempts,
                            existing.url_hash
                        );
                        Ok(SaveOutcome::Existing(existing))
                    }
                    None => Err(PersistError::Repo(err)),
                }
            }
            Some(other) => Err(PersistError::Repo(other)),
            None => Err(PersistError::Repo(RepoError::InvalidData(
                "retry loop finished without an attempt".to_string(),
            ))),
        }
    }

    fn rollback_failed_attempt<S>(&mut self, store: &mut S)
    where
        S: ArticleStore + ?Sized,
    {
        self.last_rollbacks += 1;
        if let Err(err) = store.rollback() {
            warn!(
                "event=article_save module=persistence status=error error_code=rollback_failed error={}",
                err
            );
        }
    }
}

fn attempt_once<S>(store: &mut S, metadata: &ValidatedMetadata) -> Result<SaveOutcome, RepoError>
where
    S: ArticleStore + ?Sized,
{
    let new_article = NewArticle::from_validated(metadata);

    store.begin()?;
    if let Some(existing) = store.find_by_url_hash(&new_article.url_hash)? {
        store.rollback()?;
        debug!(
            "event=article_save module=persistence status=existing url_hash={}",
            existing.url_hash
        );
        return Ok(SaveOutcome::Existing(existing));
    }

    let tags = resolve_tags(store, metadata.metadata().tags.as_slice())?;
    let article = store.insert_article(&new_article, &tags)?;
    store.commit()?;
    debug!(
        "event=article_save module=persistence status=created url_hash={} tags={}",
        article.url_hash,
        article.tags.len()
    );
    Ok(SaveOutcome::Created(article))
}
