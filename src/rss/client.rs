//! HTTP client creation and alternate feed URLs for RSS sources.

use anyhow::{Context, Result};
use reqwest::{cookie::Jar, header, redirect};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::types::{ACCEPT, ACCEPT_LANGUAGE, MAX_REDIRECTS, REQUEST_TIMEOUT, USER_AGENT};
use crate::TARGET_WEB_REQUEST;

/// Create the shared client used for every feed request.
pub fn create_http_client() -> reqwest::Result<reqwest::Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::ACCEPT, header::HeaderValue::from_static(ACCEPT));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static(ACCEPT_LANGUAGE),
    );

    let policy = redirect::Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error(format!("stopped after {} redirects", MAX_REDIRECTS))
        } else {
            debug!(target: TARGET_WEB_REQUEST, "Following redirect to {}", attempt.url());
            attempt.follow()
        }
    });

    reqwest::Client::builder()
        .cookie_provider(Arc::new(Jar::default()))
        .gzip(true)
        .timeout(REQUEST_TIMEOUT)
        .redirect(policy)
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
}

/// Alternate feed URLs for hosts whose primary address sometimes serves HTML.
///
/// Keys are host names without a leading `www.`; values are tried in order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FeedAliases {
    by_host: HashMap<String, Vec<String>>,
}

impl Default for FeedAliases {
    fn default() -> Self {
        let farnam = vec![
            "https://www.farnamstreetblog.com/feed/rss/".to_string(),
            "https://fs.blog/feed/".to_string(),
            "https://fs.blog/feed/rss/".to_string(),
        ];

        let mut aliases = FeedAliases::empty();
        aliases.insert("farnamstreetblog.com", farnam.clone());
        aliases.insert("fs.blog", farnam);
        aliases
    }
}

impl FeedAliases {
    pub fn empty() -> Self {
        FeedAliases {
            by_host: HashMap::new(),
        }
    }

    /// The built-in table with entries from a JSON file (`{"host": ["url", ...]}`)
    /// layered on top. File entries replace built-in entries for the same host.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("feed aliases file does not exist: {}", path.display());
        }

        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read feed aliases from {}", path.display()))?;
        let extra: FeedAliases = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse feed aliases in {}", path.display()))?;

        info!(
            target: TARGET_WEB_REQUEST,
            "Loaded {} feed alias host(s) from {}",
            extra.by_host.len(),
            path.display()
        );

        let mut aliases = FeedAliases::default();
        aliases.merge(extra);
        Ok(aliases)
    }

    pub fn insert(&mut self, host: &str, urls: Vec<String>) {
        self.by_host.insert(normalize_host(host), urls);
    }

    pub fn merge(&mut self, other: FeedAliases) {
        for (host, urls) in other.by_host {
            self.insert(&host, urls);
        }
    }

    /// Alternates registered for the host of `url`, empty when none are.
    pub fn for_url(&self, url: &str) -> &[String] {
        url::Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(normalize_host))
            .and_then(|host| self.by_host.get(&host))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}
