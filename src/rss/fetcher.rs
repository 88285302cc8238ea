//! Retrieving a feed over HTTP and turning it into canonical items.

use reqwest::header;
use tracing::{debug, info, instrument, warn};

use super::client::{create_http_client, FeedAliases};
use super::parser::normalize;
use super::types::{FeedError, FeedItem};
use super::util::{preprocess_xml, preview};
use crate::TARGET_WEB_REQUEST;

/// A fetched response body and the `Content-Type` it was served with.
#[derive(Debug)]
struct FeedBody {
    content_type: String,
    bytes: Vec<u8>,
}

impl FeedBody {
    fn is_xml(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("xml")
    }
}

/// Downloads feeds with one shared client. Cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    aliases: FeedAliases,
}

impl Fetcher {
    pub fn new(aliases: FeedAliases) -> Result<Self, FeedError> {
        Ok(Self::with_client(create_http_client()?, aliases))
    }

    pub fn with_client(client: reqwest::Client, aliases: FeedAliases) -> Self {
        Fetcher { client, aliases }
    }

    /// Fetches `url` and returns its items in document order.
    #[instrument(target = "web_request", level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>, FeedError> {
        let body = self.fetch_body(url).await?;
        let cleaned = preprocess_xml(&body.bytes);

        let items = normalize(&cleaned).map_err(|err| {
            debug!(
                target: TARGET_WEB_REQUEST,
                "Could not normalize {} ({}): {}",
                url,
                body.content_type,
                preview(&cleaned, 200)
            );
            err
        })?;

        debug!(target: TARGET_WEB_REQUEST, "Fetched {} items from {}", items.len(), url);
        Ok(items)
    }

    /// The primary response, or the first alias serving XML when the primary does not.
    async fn fetch_body(&self, url: &str) -> Result<FeedBody, FeedError> {
        let primary = self.get(url).await?;
        if primary.is_xml() {
            return Ok(primary);
        }

        let aliases = self.aliases.for_url(url);
        if aliases.is_empty() {
            return Ok(primary);
        }

        debug!(
            target: TARGET_WEB_REQUEST,
            "{} served {:?}, trying {} alternate URL(s)",
            url,
            primary.content_type,
            aliases.len()
        );

        for alias in aliases {
            match self.get(alias).await {
                Ok(body) if body.is_xml() => {
                    info!(target: TARGET_WEB_REQUEST, "Using alternate feed {} for {}", alias, url);
                    return Ok(body);
                }
                Ok(body) => {
                    debug!(
                        target: TARGET_WEB_REQUEST,
                        "Alternate {} served {:?}", alias, body.content_type
                    );
                }
                Err(err) => {
                    warn!(target: TARGET_WEB_REQUEST, "Alternate {} failed: {}", alias, err);
                }
            }
        }

        Ok(primary)
    }

    async fn get(&self, url: &str) -> Result<FeedBody, FeedError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let bytes = response.bytes().await.map_err(|source| FeedError::Body {
            url: url.to_string(),
            source,
        })?;

        Ok(FeedBody {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}
