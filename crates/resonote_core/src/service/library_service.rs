//! Reading-library use-case service.
//!
//! # Responsibility
//! - List and filter stored articles for the reader.
//! - Apply per-article reader actions (read, favorite, delete).
//!
//! # Invariants
//! - Tag filters are normalized the same way tags are stored.
//! - Missing articles surface as `LibraryError::ArticleNotFound`.

use crate::model::article::{Article, ArticleId, ReadingStatus};
use crate::model::tag::normalize_tag;
use crate::repo::article_repo::RepoError;
use crate::repo::library_repo::{
    normalize_article_limit, ArticleListQuery, LibraryRepository, TagCount,
};
use log::info;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for library use-cases.
#[derive(Debug)]
pub enum LibraryError {
    ArticleNotFound(ArticleId),
    /// Tag filter was blank after normalization.
    InvalidTag(String),
    Repo(RepoError),
}

impl Display for LibraryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArticleNotFound(id) => write!(f, "article not found: {id}"),
            Self::InvalidTag(value) => write!(f, "invalid tag filter: `{value}`"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LibraryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LibraryError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::ArticleNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// List result envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticlesListResult {
    /// Newest first.
    pub items: Vec<Article>,
    /// Effective normalized limit used by the query.
    pub applied_limit: u32,
}

/// Library facade over a repository implementation.
pub struct LibraryService<R: LibraryRepository> {
    repo: R,
}

impl<R: LibraryRepository> LibraryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn get_article(&self, id: ArticleId) -> Result<Article, LibraryError> {
        self.repo
            .get_article(id)?
            .ok_or(LibraryError::ArticleNotFound(id))
    }

    /// Lists articles with normalized tag filter and limit.
    pub fn list_articles(
        &self,
        query: &ArticleListQuery,
    ) -> Result<ArticlesListResult, LibraryError> {
        let mut query = query.clone();
        if let Some(raw) = query.tag.take() {
            let tag = normalize_tag(&raw).ok_or(LibraryError::InvalidTag(raw))?;
            query.tag = Some(tag);
        }
        query.source = query
            .source
            .map(|source| source.trim().to_string())
            .filter(|source| !source.is_empty());
        let applied_limit = normalize_article_limit(query.limit);
        query.limit = Some(applied_limit);

        let items = self.repo.list_articles(&query)?;
        Ok(ArticlesListResult {
            items,
            applied_limit,
        })
    }

    pub fn tag_counts(&self) -> Result<Vec<TagCount>, LibraryError> {
        Ok(self.repo.tag_counts()?)
    }

    pub fn mark_read(&self, id: ArticleId) -> Result<(), LibraryError> {
        self.set_reading_status(id, ReadingStatus::Read)
    }

    pub fn set_reading_status(
        &self,
        id: ArticleId,
        status: ReadingStatus,
    ) -> Result<(), LibraryError> {
        self.repo.set_reading_status(id, status)?;
        info!(
            "event=article_status module=library status=ok article_id={} reading_status={}",
            id, status
        );
        Ok(())
    }

    /// Flips the favorite flag; returns the new value.
    pub fn toggle_favorite(&self, id: ArticleId) -> Result<bool, LibraryError> {
        let favorite = self.repo.toggle_favorite(id)?;
        info!(
            "event=article_favorite module=library status=ok article_id={} favorite={}",
            id, favorite
        );
        Ok(favorite)
    }

    /// Deletes the article with its reflection and tag associations.
    pub fn delete_article(&self, id: ArticleId) -> Result<(), LibraryError> {
        self.repo.delete_article(id)?;
        info!(
            "event=article_delete module=library status=ok article_id={}",
            id
        );
        Ok(())
    }
}
