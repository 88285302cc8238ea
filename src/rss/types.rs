//! Type definitions for the RSS module.

use tokio::time::Duration;

/// One entry from an RSS or Atom feed, in a shape common to both formats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    /// Empty when the entry carried no link; such items are never persisted.
    pub link: String,
    pub description: Option<String>,
    /// The raw publication date string, parsed later by [`super::date::parse_date`].
    pub pub_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
}

impl FeedFormat {
    /// Maps a root element's local name onto a format, ignoring case.
    pub fn from_root(local_name: &str) -> Option<Self> {
        if local_name.eq_ignore_ascii_case("rss") {
            Some(FeedFormat::Rss)
        } else if local_name.eq_ignore_ascii_case("feed") {
            Some(FeedFormat::Atom)
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to fetch feed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to parse XML: {0}")]
    Malformed(String),
    #[error("unknown feed format: {0}")]
    UnknownFormat(String),
}

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_REDIRECTS: usize = 5;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml, text/xml";
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
