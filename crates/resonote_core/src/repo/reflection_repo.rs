//! Reflection repository contracts and SQLite implementation.
//!
//! # Invariants
//! - At most one reflection per article (`reflections.article_id` unique).
//! - Reflections disappear with their article (`ON DELETE CASCADE`).

use crate::model::article::ArticleId;
use crate::repo::article_repo::{ensure_tables, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

/// Free-text note attached to one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reflection {
    pub id: i64,
    pub article_id: ArticleId,
    pub content: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Repository interface for reflection CRUD.
pub trait ReflectionRepository {
    fn article_exists(&self, article_id: ArticleId) -> RepoResult<bool>;
    /// Creates the reflection; a second one for the same article yields
    /// `UniqueViolation`.
    fn insert_reflection(&self, article_id: ArticleId, content: &str) -> RepoResult<Reflection>;
    fn get_reflection(&self, article_id: ArticleId) -> RepoResult<Option<Reflection>>;
    fn update_reflection(&self, article_id: ArticleId, content: &str) -> RepoResult<Reflection>;
    fn delete_reflection(&self, article_id: ArticleId) -> RepoResult<()>;
}

/// SQLite-backed reflection repository.
pub struct SqliteReflectionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReflectionRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["articles", "reflections"])?;
        Ok(Self { conn })
    }

    fn load(&self, article_id: ArticleId) -> RepoResult<Option<Reflection>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, article_id, content, created_at, updated_at
                 FROM reflections
                 WHERE article_id = ?1;",
                [article_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, article_text, content, created_at, updated_at)) = row else {
            return Ok(None);
        };
        let article_id = Uuid::parse_str(&article_text).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid uuid value `{article_text}` in reflections.article_id"
            ))
        })?;
        Ok(Some(Reflection {
            id,
            article_id,
            content,
            created_at,
            updated_at,
        }))
    }

    fn read_back(&self, article_id: ArticleId) -> RepoResult<Reflection> {
        self.load(article_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("reflection for {article_id} missing in read-back"))
        })
    }
}

impl ReflectionRepository for SqliteReflectionRepository<'_> {
    fn article_exists(&self, article_id: ArticleId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM articles WHERE id = ?1);",
            [article_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert_reflection(&self, article_id: ArticleId, content: &str) -> RepoResult<Reflection> {
        self.conn.execute(
            "INSERT INTO reflections (article_id, content) VALUES (?1, ?2);",
            params![article_id.to_string(), content],
        )?;
        self.read_back(article_id)
    }

    fn get_reflection(&self, article_id: ArticleId) -> RepoResult<Option<Reflection>> {
        self.load(article_id)
    }

    fn update_reflection(&self, article_id: ArticleId, content: &str) -> RepoResult<Reflection> {
        let changed = self.conn.execute(
            "UPDATE reflections
             SET
                content = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE article_id = ?1;",
            params![article_id.to_string(), content],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(article_id));
        }
        self.read_back(article_id)
    }

    fn delete_reflection(&self, article_id: ArticleId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM reflections WHERE article_id = ?1;",
            [article_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(article_id));
        }
        Ok(())
    }
}
