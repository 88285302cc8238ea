//! Row types for registered sources and ingested posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered feed endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    /// Free-form tag supplied at registration; the scraper never reads it.
    pub source_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSource {
    pub name: String,
    pub url: String,
    pub source_type: String,
}

/// A persisted feed item. `url` is unique across all posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert candidate built from a feed item; id and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: Option<String>,
}
