//! Article storage contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the narrow storage contract consulted by ingestion.
//! - Translate SQLite failures into semantic errors (`Contention`,
//!   `UniqueViolation`) the persistence coordinator can act on.
//!
//! # Invariants
//! - Every call participates in the ambient transaction opened by `begin`.
//! - `insert_*` never updates an existing row; uniqueness conflicts surface
//!   as `RepoError::UniqueViolation`.
//! - A store dropped mid-transaction rolls the transaction back.

use crate::db::DbError;
use crate::model::article::{Article, ArticleId, NewArticle, ReadingStatus};
use crate::model::fingerprint::UrlHash;
use crate::model::tag::Tag;
use log::warn;
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub(crate) const ARTICLE_SELECT_SQL: &str = "SELECT
    id,
    url_hash,
    title,
    author,
    url,
    source,
    estimated_reading_time_min,
    reading_status,
    favorite,
    created_at
FROM articles";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for article/tag/reflection persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Another writer holds the database lock (`SQLITE_BUSY`/`SQLITE_LOCKED`).
    Contention(String),
    /// A unique constraint rejected the write.
    UniqueViolation(String),
    Db(DbError),
    NotFound(ArticleId),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl RepoError {
    /// Whether retrying the whole unit of work may succeed.
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Contention(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contention(message) => write!(f, "database is locked: {message}"),
            Self::UniqueViolation(message) => write!(f, "uniqueness violation: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "article not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &value {
            let detail = message.clone().unwrap_or_else(|| failure.to_string());
            match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    return Self::Contention(detail);
                }
                ErrorCode::ConstraintViolation
                    if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                        || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
                {
                    return Self::UniqueViolation(detail);
                }
                _ => {}
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract consulted by the persistence coordinator.
pub trait ArticleStore {
    /// Opens the ambient write transaction.
    fn begin(&mut self) -> RepoResult<()>;
    /// Commits the ambient transaction.
    fn commit(&mut self) -> RepoResult<()>;
    /// Rolls back the ambient transaction; no-op when none is open.
    fn rollback(&mut self) -> RepoResult<()>;
    fn find_by_url_hash(&self, url_hash: &UrlHash) -> RepoResult<Option<Article>>;
    /// Looks up a tag by its already-normalized name.
    fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>>;
    /// Creates a tag row; an existing name yields `UniqueViolation`.
    fn insert_tag(&mut self, name: &str) -> RepoResult<Tag>;
    /// Creates an article and its tag associations, returning the stored row.
    fn insert_article(&mut self, article: &NewArticle, tags: &[Tag]) -> RepoResult<Article>;
}

/// SQLite-backed article store.
pub struct SqliteArticleStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteArticleStore<'conn> {
    /// Constructs a store from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["articles", "tags", "article_tags"])?;
        Ok(Self { conn })
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }
}

impl ArticleStore for SqliteArticleStore<'_> {
    fn begin(&mut self) -> RepoResult<()> {
        // IMMEDIATE takes the write lock up front, so contention shows up here
        // instead of as a snapshot conflict halfway through the insert.
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    fn commit(&mut self) -> RepoResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback(&mut self) -> RepoResult<()> {
        if self.in_transaction() {
            self.conn.execute_batch("ROLLBACK;")?;
        }
        Ok(())
    }

    fn find_by_url_hash(&self, url_hash: &UrlHash) -> RepoResult<Option<Article>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ARTICLE_SELECT_SQL} WHERE url_hash = ?1;"))?;
        let mut rows = stmt.query([url_hash.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_article_row(self.conn, row)?)),
            None => Ok(None),
        }
    }

    fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, name FROM tags WHERE name = ?1;",
                [name],
                |row| {
                    Ok(Tag {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(tag)
    }

    fn insert_tag(&mut self, name: &str) -> RepoResult<Tag> {
        self.conn
            .execute("INSERT INTO tags (name) VALUES (?1);", [name])?;
        Ok(Tag {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn insert_article(&mut self, article: &NewArticle, tags: &[Tag]) -> RepoResult<Article> {
        self.conn.execute(
            "INSERT INTO articles (
                id,
                url_hash,
                title,
                author,
                url,
                source,
                estimated_reading_time_min,
                reading_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                article.id.to_string(),
                article.url_hash.as_str(),
                article.title.as_str(),
                article.author.as_deref(),
                article.url.as_str(),
                article.source.as_str(),
                i64::from(article.estimated_reading_time_min),
                article.reading_status.as_str(),
            ],
        )?;

        let mut seen = HashSet::new();
        let mut position: i64 = 0;
        for tag in tags {
            if !seen.insert(tag.id) {
                continue;
            }
            self.conn.execute(
                "INSERT INTO article_tags (article_id, tag_id, position) VALUES (?1, ?2, ?3);",
                params![article.id.to_string(), tag.id, position],
            )?;
            position += 1;
        }

        self.find_by_url_hash(&article.url_hash)?.ok_or_else(|| {
            RepoError::InvalidData(format!(
                "article {} missing in read-back after insert",
                article.id
            ))
        })
    }
}

impl Drop for SqliteArticleStore<'_> {
    fn drop(&mut self) {
        if self.in_transaction() {
            if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
                warn!(
                    "event=store_release module=repo status=error error_code=rollback_failed error={}",
                    err
                );
            }
        }
    }
}

pub(crate) fn parse_article_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Article> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in articles.id"))
    })?;

    let hash_text: String = row.get("url_hash")?;
    let url_hash = UrlHash::parse(&hash_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid hash `{hash_text}` in articles.url_hash"))
    })?;

    let status_text: String = row.get("reading_status")?;
    let reading_status = ReadingStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid reading status `{status_text}` in articles.reading_status"
        ))
    })?;

    let reading_time: i64 = row.get("estimated_reading_time_min")?;
    let estimated_reading_time_min = u32::try_from(reading_time)
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid reading time `{reading_time}` in articles.estimated_reading_time_min"
            ))
        })?;

    let favorite = match row.get::<_, i64>("favorite")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid favorite value `{other}` in articles.favorite"
            )));
        }
    };

    Ok(Article {
        id,
        url_hash,
        title: row.get("title")?,
        author: row.get("author")?,
        url: row.get("url")?,
        source: row.get("source")?,
        estimated_reading_time_min,
        reading_status,
        favorite,
        created_at: row.get("created_at")?,
        tags: load_tags_for_article(conn, &id_text)?,
    })
}

fn load_tags_for_article(conn: &Connection, article_id: &str) -> RepoResult<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name
         FROM article_tags at
         INNER JOIN tags t ON t.id = at.tag_id
         WHERE at.article_id = ?1
         ORDER BY at.position ASC;",
    )?;
    let mut rows = stmt.query([article_id])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
        });
    }
    Ok(tags)
}

pub(crate) fn ensure_tables(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [*table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ArticleStore, RepoError, SqliteArticleStore};
    use crate::db::open_db_in_memory;
    use crate::model::article::{NewArticle, ReadingStatus};
    use crate::model::fingerprint::fingerprint;
    use uuid::Uuid;

    fn new_article(url: &str) -> NewArticle {
        NewArticle {
            id: Uuid::new_v4(),
            url_hash: fingerprint(url),
            title: "Title".to_string(),
            author: None,
            url: url.to_string(),
            source: "test".to_string(),
            estimated_reading_time_min: 3,
            reading_status: ReadingStatus::Unread,
        }
    }

    #[test]
    fn duplicate_tag_insert_reports_unique_violation() {
        let conn = open_db_in_memory().unwrap();
        let mut store = SqliteArticleStore::try_new(&conn).unwrap();
        store.insert_tag("tech").unwrap();
        let err = store.insert_tag("tech").unwrap_err();
        assert!(matches!(err, RepoError::UniqueViolation(_)));
    }

    #[test]
    fn duplicate_url_hash_reports_unique_violation() {
        let conn = open_db_in_memory().unwrap();
        let mut store = SqliteArticleStore::try_new(&conn).unwrap();
        store.insert_article(&new_article("http://x.com/a"), &[]).unwrap();
        let err = store
            .insert_article(&new_article("http://x.com/a"), &[])
            .unwrap_err();
        assert!(matches!(err, RepoError::UniqueViolation(_)));
    }

    #[test]
    fn insert_article_keeps_tag_order_and_drops_repeats() {
        let conn = open_db_in_memory().unwrap();
        let mut store = SqliteArticleStore::try_new(&conn).unwrap();
        let world = store.insert_tag("world").unwrap();
        let tech = store.insert_tag("tech").unwrap();
        let stored = store
            .insert_article(
                &new_article("http://x.com/b"),
                &[world.clone(), tech.clone(), world.clone()],
            )
            .unwrap();
        assert_eq!(stored.tag_names(), vec!["world", "tech"]);
        assert!(!stored.favorite);
        assert_eq!(stored.reading_status, ReadingStatus::Unread);
    }

    #[test]
    fn dropping_store_mid_transaction_rolls_back() {
        let conn = open_db_in_memory().unwrap();
        {
            let mut store = SqliteArticleStore::try_new(&conn).unwrap();
            store.begin().unwrap();
            store.insert_article(&new_article("http://x.com/c"), &[]).unwrap();
        }
        assert!(conn.is_autocommit());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM articles;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = SqliteArticleStore::try_new(&conn).err().unwrap();
        assert!(matches!(err, RepoError::MissingRequiredTable("articles")));
    }
}
