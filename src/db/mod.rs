mod core;
pub mod models;
mod post;
mod schema;
mod source;
pub mod store;

pub use self::core::Database;
pub use self::models::{NewPost, NewSource, Post, Source};
pub use self::store::{Store, StoreError, UniqueViolationExt};

use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
impl Store for Database {
    async fn sources_due(&self, limit: i64) -> Result<Vec<Source>, StoreError> {
        self.find_sources_due(limit).await
    }

    async fn mark_fetched(&self, id: Uuid) -> Result<Source, StoreError> {
        self.mark_source_fetched(id).await
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post, StoreError> {
        self.create_post(&post).await
    }

    async fn create_source(&self, source: NewSource) -> Result<Source, StoreError> {
        self.register_source(&source).await
    }

    async fn list_sources(&self) -> Result<Vec<Source>, StoreError> {
        self.all_sources().await
    }

    async fn list_posts(&self, limit: i64) -> Result<Vec<Post>, StoreError> {
        self.recent_posts(limit).await
    }
}
