//! The narrow query surface the scraper needs from persistence.

use async_trait::async_trait;
use uuid::Uuid;

use super::models::{NewPost, NewSource, Post, Source};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("source {0} not found")]
    NotFound(Uuid),
    #[error("post with url {url} already exists")]
    Duplicate { url: String },
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("database configuration error: {0}")]
    Configuration(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

/// Checks whether a sqlx error is a unique-constraint violation.
pub trait UniqueViolationExt {
    fn is_unique_violation(&self) -> bool;
}

impl UniqueViolationExt for sqlx::Error {
    fn is_unique_violation(&self) -> bool {
        match self {
            sqlx::Error::Database(err) => err.is_unique_violation(),
            _ => false,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Up to `limit` sources, least recently fetched first; never-fetched sources lead.
    async fn sources_due(&self, limit: i64) -> Result<Vec<Source>, StoreError>;

    /// Stamps `last_fetched_at` with the current time and returns the updated row.
    async fn mark_fetched(&self, id: Uuid) -> Result<Source, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when a post with the same url exists.
    async fn insert_post(&self, post: NewPost) -> Result<Post, StoreError>;

    async fn create_source(&self, source: NewSource) -> Result<Source, StoreError>;

    async fn list_sources(&self) -> Result<Vec<Source>, StoreError>;

    /// Newest posts first.
    async fn list_posts(&self, limit: i64) -> Result<Vec<Post>, StoreError>;
}
