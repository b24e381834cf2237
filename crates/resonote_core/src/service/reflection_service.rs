//! Reflection use-case service.
//!
//! # Invariants
//! - One reflection per article; content is trimmed and never blank.
//! - Creating a reflection requires the article to exist.

use crate::model::article::ArticleId;
use crate::repo::article_repo::RepoError;
use crate::repo::reflection_repo::{Reflection, ReflectionRepository};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for reflection use-cases.
#[derive(Debug)]
pub enum ReflectionError {
    ArticleNotFound(ArticleId),
    ReflectionNotFound(ArticleId),
    AlreadyExists(ArticleId),
    EmptyContent,
    Repo(RepoError),
}

impl Display for ReflectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArticleNotFound(id) => write!(f, "article not found: {id}"),
            Self::ReflectionNotFound(id) => write!(f, "no reflection for article {id}"),
            Self::AlreadyExists(id) => write!(f, "article {id} already has a reflection"),
            Self::EmptyContent => write!(f, "reflection content must not be blank"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReflectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ReflectionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Reflection facade over a repository implementation.
pub struct ReflectionService<R: ReflectionRepository> {
    repo: R,
}

impl<R: ReflectionRepository> ReflectionService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create(
        &self,
        article_id: ArticleId,
        content: &str,
    ) -> Result<Reflection, ReflectionError> {
        let content = normalize_content(content)?;
        if !self.repo.article_exists(article_id)? {
            return Err(ReflectionError::ArticleNotFound(article_id));
        }
        let reflection = match self.repo.insert_reflection(article_id, content) {
            Ok(reflection) => reflection,
            Err(RepoError::UniqueViolation(_)) => {
                return Err(ReflectionError::AlreadyExists(article_id))
            }
            Err(other) => return Err(other.into()),
        };
        info!(
            "event=reflection_create module=reflection status=ok article_id={}",
            article_id
        );
        Ok(reflection)
    }

    pub fn get(&self, article_id: ArticleId) -> Result<Reflection, ReflectionError> {
        self.repo
            .get_reflection(article_id)?
            .ok_or(ReflectionError::ReflectionNotFound(article_id))
    }

    /// Replaces the content of an existing reflection.
    pub fn update(
        &self,
        article_id: ArticleId,
        content: &str,
    ) -> Result<Reflection, ReflectionError> {
        let content = normalize_content(content)?;
        match self.repo.update_reflection(article_id, content) {
            Ok(reflection) => Ok(reflection),
            Err(RepoError::NotFound(_)) => Err(ReflectionError::ReflectionNotFound(article_id)),
            Err(other) => Err(other.into()),
        }
    }

    pub fn delete(&self, article_id: ArticleId) -> Result<(), ReflectionError> {
        match self.repo.delete_reflection(article_id) {
            Ok(()) => {
                info!(
                    "event=reflection_delete module=reflection status=ok article_id={}",
                    article_id
                );
                Ok(())
            }
            Err(RepoError::NotFound(_)) => Err(ReflectionError::ReflectionNotFound(article_id)),
            Err(other) => Err(other.into()),
        }
    }
}

fn normalize_content(content: &str) -> Result<&str, ReflectionError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ReflectionError::EmptyContent);
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::normalize_content;

    #[test]
    fn content_is_trimmed_and_blank_rejected() {
        assert_eq!(normalize_content("  thoughts \n").unwrap(), "thoughts");
        assert!(normalize_content(" \t ").is_err());
    }
}
