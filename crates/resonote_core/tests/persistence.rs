use resonote_core::db::{open_db_in_memory, open_db_with_options, DbOptions};
use resonote_core::{
    normalize, validate, Article, ArticleStore, Backoff, NewArticle, PersistError,
    PersistenceCoordinator, RawItem, RepoError, RepoResult, RetryPolicy, SaveOutcome, Sleeper,
    SqliteArticleStore, Tag, UrlHash, ValidatedMetadata,
};
use rusqlite::Connection;
use std::cell::Cell;
use std::time::Duration;

#[derive(Debug, Default)]
struct RecordingSleeper {
    slept: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.slept.push(duration);
    }
}

/// Fails `begin` with `Contention` for the first `busy_attempts` calls.
struct FlakyStore<'conn> {
    inner: SqliteArticleStore<'conn>,
    busy_attempts: u32,
    begins: u32,
    rollbacks: u32,
}

impl<'conn> FlakyStore<'conn> {
    fn new(conn: &'conn Connection, busy_attempts: u32) -> Self {
        Self {
            inner: SqliteArticleStore::try_new(conn).unwrap(),
            busy_attempts,
            begins: 0,
            rollbacks: 0,
        }
    }
}

impl ArticleStore for FlakyStore<'_> {
    fn begin(&mut self) -> RepoResult<()> {
        self.begins += 1;
        if self.begins <= self.busy_attempts {
            return Err(RepoError::Contention("database is locked".to_string()));
        }
        self.inner.begin()
    }

    fn commit(&mut self) -> RepoResult<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> RepoResult<()> {
        self.rollbacks += 1;
        self.inner.rollback()
    }

    fn find_by_url_hash(&self, url_hash: &UrlHash) -> RepoResult<Option<Article>> {
        self.inner.find_by_url_hash(url_hash)
    }

    fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>> {
        self.inner.find_tag_by_name(name)
    }

    fn insert_tag(&mut self, name: &str) -> RepoResult<Tag> {
        self.inner.insert_tag(name)
    }

    fn insert_article(&mut self, article: &NewArticle, tags: &[Tag]) -> RepoResult<Article> {
        self.inner.insert_article(article, tags)
    }
}

/// Misses the article on the first lookup, as if a concurrent writer
/// committed it between our lookup and our insert.
struct LateArticleStore<'conn> {
    inner: SqliteArticleStore<'conn>,
    hidden: Cell<bool>,
}

impl ArticleStore for LateArticleStore<'_> {
    fn begin(&mut self) -> RepoResult<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> RepoResult<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> RepoResult<()> {
        self.inner.rollback()
    }

    fn find_by_url_hash(&self, url_hash: &UrlHash) -> RepoResult<Option<Article>> {
        if !self.hidden.get() {
            self.hidden.set(true);
            return Ok(None);
        }
        self.inner.find_by_url_hash(url_hash)
    }

    fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>> {
        self.inner.find_tag_by_name(name)
    }

    fn insert_tag(&mut self, name: &str) -> RepoResult<Tag> {
        self.inner.insert_tag(name)
    }

    fn insert_article(&mut self, article: &NewArticle, tags: &[Tag]) -> RepoResult<Article> {
        self.inner.insert_article(article, tags)
    }
}

fn metadata(title: &str, url: &str, tags: &[&str]) -> ValidatedMetadata {
    let raw = RawItem::new(title, url).with_tags(tags.iter().copied());
    validate(&normalize(&raw, "test")).unwrap()
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Backoff::Fixed(Duration::from_millis(10)))
}

fn recording_coordinator(max_attempts: u32) -> PersistenceCoordinator<RecordingSleeper> {
    PersistenceCoordinator::with_sleeper(fast_policy(max_attempts), RecordingSleeper::default())
}

fn article_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM articles;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn saving_same_url_twice_returns_existing_article() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteArticleStore::try_new(&conn).unwrap();
    let mut coordinator = recording_coordinator(3);

    let first = coordinator
        .save_or_get(&mut store, &metadata("Original", "http://x.com/a", &["Tech"]))
        .unwrap();
    let second = coordinator
        .save_or_get(&mut store, &metadata("Rewritten", "http://x.com/a", &["other"]))
        .unwrap();

    assert!(first.is_created());
    match second {
        SaveOutcome::Existing(article) => {
            assert_eq!(&article, first.article());
            assert_eq!(article.title, "Original");
            assert_eq!(article.tag_names(), vec!["tech"]);
        }
        other => panic!("expected existing article, got {other:?}"),
    }
    assert_eq!(coordinator.attempts(), 1);
    assert_eq!(article_count(&conn), 1);
    assert!(conn.is_autocommit(), "dedup hit must not leave a transaction open");
}

#[test]
fn url_variants_are_stored_separately() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteArticleStore::try_new(&conn).unwrap();
    let mut coordinator = recording_coordinator(3);

    for url in ["https://x.com/story", "https://x.com/story/"] {
        let outcome = coordinator
            .save_or_get(&mut store, &metadata("Story", url, &[]))
            .unwrap();
        assert!(outcome.is_created(), "{url} should be a new article");
    }
    assert_eq!(article_count(&conn), 2);
}

#[test]
fn contention_is_retried_until_success() {
    let conn = open_db_in_memory().unwrap();
    let mut store = FlakyStore::new(&conn, 2);
    let mut coordinator = recording_coordinator(3);

    let outcome = coordinator
        .save_or_get(&mut store, &metadata("Busy", "http://x.com/busy", &[]))
        .unwrap();

    assert!(outcome.is_created());
    assert_eq!(coordinator.attempts(), 3);
    assert_eq!(coordinator.rollbacks(), 2);
    assert_eq!(
        coordinator.sleeper().slept,
        vec![Duration::from_millis(10), Duration::from_millis(10)]
    );
    assert_eq!(article_count(&conn), 1);
}

#[test]
fn contention_gives_up_after_max_attempts() {
    let conn = open_db_in_memory().unwrap();
    let mut store = FlakyStore::new(&conn, u32::MAX);
    let policy = RetryPolicy::new(
        4,
        Backoff::Linear {
            base: Duration::from_millis(5),
        },
    );
    let mut coordinator = PersistenceCoordinator::with_sleeper(policy, RecordingSleeper::default());

    let err = coordinator
        .save_or_get(&mut store, &metadata("Locked", "http://x.com/locked", &[]))
        .unwrap_err();

    match err {
        PersistError::ContentionExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 4);
            assert!(last_error.is_contention());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.begins, 4);
    assert_eq!(store.rollbacks, 4);
    assert_eq!(coordinator.rollbacks(), 4);
    assert_eq!(
        coordinator.sleeper().slept,
        vec![
            Duration::from_millis(5),
            Duration::from_millis(10),
            Duration::from_millis(15)
        ]
    );
    assert_eq!(article_count(&conn), 0);
}

#[test]
fn lost_insert_race_returns_winner_without_sleeping() {
    let conn = open_db_in_memory().unwrap();
    let mut coordinator = recording_coordinator(3);
    let winner = {
        let mut store = SqliteArticleStore::try_new(&conn).unwrap();
        coordinator
            .save_or_get(&mut store, &metadata("Winner", "http://x.com/race", &["a"]))
            .unwrap()
            .into_article()
    };

    let mut store = LateArticleStore {
        inner: SqliteArticleStore::try_new(&conn).unwrap(),
        hidden: Cell::new(false),
    };
    let outcome = coordinator
        .save_or_get(&mut store, &metadata("Loser", "http://x.com/race", &["b"]))
        .unwrap();

    assert_eq!(outcome, SaveOutcome::Existing(winner));
    assert_eq!(coordinator.attempts(), 2);
    assert!(coordinator.sleeper().slept.is_empty());
    assert_eq!(article_count(&conn), 1);

    let tag_b: i64 = conn
        .query_row("SELECT COUNT(*) FROM tags WHERE name = 'b';", [], |row| row.get(0))
        .unwrap();
    assert_eq!(tag_b, 0, "rolled back attempt must not leave its tags behind");
}

#[test]
fn lost_insert_race_on_single_attempt_still_returns_winner() {
    let conn = open_db_in_memory().unwrap();
    let winner = {
        let mut store = SqliteArticleStore::try_new(&conn).unwrap();
        PersistenceCoordinator::default()
            .save_or_get(&mut store, &metadata("Winner", "http://x.com/once", &[]))
            .unwrap()
            .into_article()
    };

    let mut store = LateArticleStore {
        inner: SqliteArticleStore::try_new(&conn).unwrap(),
        hidden: Cell::new(false),
    };
    let mut coordinator = PersistenceCoordinator::with_sleeper(
        RetryPolicy::new(1, Backoff::Fixed(Duration::ZERO)),
        RecordingSleeper::default(),
    );
    let outcome = coordinator
        .save_or_get(&mut store, &metadata("Loser", "http://x.com/once", &[]))
        .unwrap();

    assert_eq!(outcome, SaveOutcome::Existing(winner));
    assert_eq!(coordinator.attempts(), 1);
    assert_eq!(coordinator.rollbacks(), 1);
    assert!(coordinator.sleeper().slept.is_empty());
    assert_eq!(article_count(&conn), 1);
    assert!(conn.is_autocommit());
}

#[test]
fn locked_file_database_reports_contention_then_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.sqlite3");
    let options = DbOptions {
        busy_timeout: Duration::from_millis(20),
    };
    let holder = open_db_with_options(&path, options).unwrap();
    let writer = open_db_with_options(&path, options).unwrap();

    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let mut coordinator = recording_coordinator(2);
    let item = metadata("Contended", "http://x.com/contended", &[]);
    {
        let mut store = SqliteArticleStore::try_new(&writer).unwrap();
        let err = coordinator.save_or_get(&mut store, &item).unwrap_err();
        assert!(err.is_contention(), "unexpected error: {err}");
        assert_eq!(coordinator.attempts(), 2);
    }

    holder.execute_batch("COMMIT;").unwrap();

    let mut store = SqliteArticleStore::try_new(&writer).unwrap();
    let outcome = coordinator.save_or_get(&mut store, &item).unwrap();
    assert!(outcome.is_created());
    assert_eq!(article_count(&holder), 1);
}
