use chrono::Utc;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use super::core::Database;
use super::models::{NewPost, Post};
use super::store::{StoreError, UniqueViolationExt};
use crate::TARGET_DB;

const POST_COLUMNS: &str =
    "id, title, description, url, published_at, source_name, created_at, updated_at";

impl Database {
    /// Inserts a post. No existence check is made first; the unique `url`
    /// column rejects items that were already ingested.
    #[instrument(target = "db_query", level = "debug", skip(self, post), fields(url = %post.url))]
    pub async fn create_post(&self, post: &NewPost) -> Result<Post, StoreError> {
        if post.url.trim().is_empty() {
            error!(target: TARGET_DB, "Attempted to insert a post without a url");
            return Err(StoreError::Invalid("empty post url".to_string()));
        }

        let now = Utc::now();
        let result = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (id, title, description, url, published_at, source_name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.url)
        .bind(post.published_at)
        .bind(&post.source_name)
        .bind(now)
        .fetch_one(self.pool())
        .await;

        match result {
            Ok(created) => {
                debug!(target: TARGET_DB, "Inserted post: {}", created.url);
                Ok(created)
            }
            Err(err) if err.is_unique_violation() => {
                debug!(target: TARGET_DB, "Duplicate url detected, skipping insert: {}", post.url);
                Err(StoreError::Duplicate {
                    url: post.url.clone(),
                })
            }
            Err(err) => {
                error!(target: TARGET_DB, "Failed to insert post {}: {:?}", post.url, err);
                Err(StoreError::Database(err))
            }
        }
    }

    pub async fn recent_posts(&self, limit: i64) -> Result<Vec<Post>, StoreError> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            ORDER BY published_at IS NULL, published_at DESC, created_at DESC
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(posts)
    }

    pub async fn count_posts(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candidate(url: &str) -> NewPost {
        NewPost {
            title: "Hello".to_string(),
            description: Some("World".to_string()),
            url: url.to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
            source_name: Some("Example".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_post_round_trips_fields() {
        let db = Database::in_memory().await.unwrap();
        let created = db
            .create_post(&candidate("https://example.com/a"))
            .await
            .unwrap();

        assert_eq!(created.title, "Hello");
        assert_eq!(created.description.as_deref(), Some("World"));
        assert_eq!(created.source_name.as_deref(), Some("Example"));
        assert_eq!(
            created.published_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(created.created_at, created.updated_at);
    }

    #[tokio::test]
    async fn test_duplicate_url_is_distinguished() {
        let db = Database::in_memory().await.unwrap();
        db.create_post(&candidate("https://example.com/a"))
            .await
            .unwrap();

        let err = db
            .create_post(&candidate("https://example.com/a"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(db.count_posts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_url_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let err = db.create_post(&candidate("  ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(db.count_posts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_recent_posts_puts_undated_last() {
        let db = Database::in_memory().await.unwrap();
        let mut undated = candidate("https://example.com/undated");
        undated.published_at = None;
        db.create_post(&undated).await.unwrap();

        let mut older = candidate("https://example.com/older");
        older.published_at = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        db.create_post(&older).await.unwrap();
        db.create_post(&candidate("https://example.com/newer"))
            .await
            .unwrap();

        let urls: Vec<String> = db
            .recent_posts(10)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/newer",
                "https://example.com/older",
                "https://example.com/undated"
            ]
        );
    }
}
