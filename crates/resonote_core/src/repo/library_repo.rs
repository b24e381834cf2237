//! Reading-library repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide list/filter and per-article mutation APIs over stored articles.
//! - Keep article deletion cascading to reflections and tag associations.
//!
//! # Invariants
//! - Lists are ordered by `created_at DESC` with insertion order as tiebreak.
//! - Mutations never touch identity fields (`url_hash`, `url`, `created_at`).
//! - Tags are never deleted, only their associations.

use crate::model::article::{Article, ArticleId, ReadingStatus};
use crate::repo::article_repo::{
    ensure_tables, parse_article_row, RepoError, RepoResult, ARTICLE_SELECT_SQL,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;

const ARTICLES_DEFAULT_LIMIT: u32 = 10;
const ARTICLES_LIMIT_MAX: u32 = 50;

/// Query options for library listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleListQuery {
    /// Exact origin label match.
    pub source: Option<String>,
    pub status: Option<ReadingStatus>,
    pub favorite: Option<bool>,
    /// Normalized tag name, exact match.
    pub tag: Option<String>,
    /// Maximum rows to return. Defaults to 10 and clamps to 50.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Usage count of one tag across stored articles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Repository interface for reading-library operations.
pub trait LibraryRepository {
    fn get_article(&self, id: ArticleId) -> RepoResult<Option<Article>>;
    fn list_articles(&self, query: &ArticleListQuery) -> RepoResult<Vec<Article>>;
    /// Returns tag usage sorted by count desc, then name asc.
    fn tag_counts(&self) -> RepoResult<Vec<TagCount>>;
    fn set_reading_status(&self, id: ArticleId, status: ReadingStatus) -> RepoResult<()>;
    /// Flips the favorite flag and returns the new value.
    fn toggle_favorite(&self, id: ArticleId) -> RepoResult<bool>;
    fn delete_article(&self, id: ArticleId) -> RepoResult<()>;
}

/// SQLite-backed reading library.
pub struct SqliteLibraryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLibraryRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["articles", "tags", "article_tags", "reflections"])?;
        Ok(Self { conn })
    }
}

impl LibraryRepository for SqliteLibraryRepository<'_> {
    fn get_article(&self, id: ArticleId) -> RepoResult<Option<Article>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ARTICLE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_article_row(self.conn, row)?)),
            None => Ok(None),
        }
    }

    fn list_articles(&self, query: &ArticleListQuery) -> RepoResult<Vec<Article>> {
        let mut sql = format!("{ARTICLE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(source) = query.source.as_ref() {
            sql.push_str(" AND source = ?");
            bind_values.push(Value::Text(source.clone()));
        }

        if let Some(status) = query.status {
            sql.push_str(" AND reading_status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        if let Some(favorite) = query.favorite {
            sql.push_str(" AND favorite = ?");
            bind_values.push(Value::Integer(i64::from(favorite)));
        }

        if let Some(tag) = query.tag.as_ref() {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM article_tags at
                    INNER JOIN tags t ON t.id = at.tag_id
                    WHERE at.article_id = articles.id
                      AND t.name = ?
                )",
            );
            bind_values.push(Value::Text(tag.clone()));
        }

        sql.push_str(" ORDER BY created_at DESC, rowid DESC");
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_article_limit(
            query.limit,
        ))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut articles = Vec::new();
        while let Some(row) = rows.next()? {
            articles.push(parse_article_row(self.conn, row)?);
        }
        Ok(articles)
    }

    fn tag_counts(&self) -> RepoResult<Vec<TagCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name, COUNT(at.article_id) AS usage
             FROM tags t
             INNER JOIN article_tags at ON at.tag_id = t.id
             GROUP BY t.id
             ORDER BY usage DESC, t.name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut counts = Vec::new();
        while let Some(row) = rows.next()? {
            let usage: i64 = row.get(1)?;
            counts.push(TagCount {
                tag: row.get(0)?,
                count: u64::try_from(usage).unwrap_or_default(),
            });
        }
        Ok(counts)
    }

    fn set_reading_status(&self, id: ArticleId, status: ReadingStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE articles SET reading_status = ?1 WHERE id = ?2;",
            params![status.as_str(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn toggle_favorite(&self, id: ArticleId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE articles SET favorite = 1 - favorite WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        let favorite: i64 = self.conn.query_row(
            "SELECT favorite FROM articles WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(favorite == 1)
    }

    fn delete_article(&self, id: ArticleId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM articles WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

/// Normalizes list limit according to the library contract.
pub fn normalize_article_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => ARTICLES_DEFAULT_LIMIT,
        Some(value) if value > ARTICLES_LIMIT_MAX => ARTICLES_LIMIT_MAX,
        Some(value) => value,
    }
}
