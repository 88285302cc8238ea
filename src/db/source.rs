use chrono::Utc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use super::core::Database;
use super::models::{NewSource, Source};
use super::store::StoreError;
use crate::TARGET_DB;

const SOURCE_COLUMNS: &str =
    "id, name, url, source_type, created_at, updated_at, last_fetched_at";

impl Database {
    #[instrument(target = "db_query", level = "info", skip(self))]
    pub async fn register_source(&self, source: &NewSource) -> Result<Source, StoreError> {
        if source.url.trim().is_empty() {
            error!(target: TARGET_DB, "Attempted to register a source without a url");
            return Err(StoreError::Invalid("empty source url".to_string()));
        }

        let now = Utc::now();
        let created = sqlx::query_as::<_, Source>(&format!(
            r#"
            INSERT INTO sources (id, name, url, source_type, created_at, updated_at, last_fetched_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5, NULL)
            RETURNING {SOURCE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&source.name)
        .bind(source.url.trim())
        .bind(&source.source_type)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        info!(target: TARGET_DB, "Registered source {} ({})", created.name, created.url);
        Ok(created)
    }

    /// Never-fetched sources sort first because SQLite orders NULL before any value.
    #[instrument(target = "db_query", level = "debug", skip(self))]
    pub async fn find_sources_due(&self, limit: i64) -> Result<Vec<Source>, StoreError> {
        let sources = sqlx::query_as::<_, Source>(&format!(
            r#"
            SELECT {SOURCE_COLUMNS}
            FROM sources
            ORDER BY last_fetched_at ASC, created_at ASC, id ASC
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Found {} sources due for fetching", sources.len());
        Ok(sources)
    }

    #[instrument(target = "db_query", level = "debug", skip(self))]
    pub async fn mark_source_fetched(&self, id: Uuid) -> Result<Source, StoreError> {
        let now = Utc::now();
        let updated = sqlx::query_as::<_, Source>(&format!(
            r#"
            UPDATE sources
            SET last_fetched_at = ?1, updated_at = ?1
            WHERE id = ?2
            RETURNING {SOURCE_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        updated.ok_or(StoreError::NotFound(id))
    }

    pub async fn all_sources(&self) -> Result<Vec<Source>, StoreError> {
        let sources = sqlx::query_as::<_, Source>(&format!(
            "SELECT {SOURCE_COLUMNS} FROM sources ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(sources)
    }
}
