//! Ingesting one due source: mark it fetched, pull its feed, store new posts.

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::{NewPost, Source, Store};
use crate::rss::{parse_date, FeedItem, Fetcher};
use crate::TARGET_SCRAPER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Every item was either stored or deliberately skipped.
    Completed,
    /// The source could not be marked fetched; nothing was downloaded.
    MarkFailed,
    /// Fetching or normalizing the feed failed.
    FetchFailed,
    /// A non-duplicate store error aborted the remaining items.
    StoreFailed,
}

/// What happened to one source during one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub source_id: Uuid,
    pub outcome: IngestOutcome,
    pub created: usize,
    pub duplicates: usize,
    /// Items dropped for a blank link or an unparseable date.
    pub skipped: usize,
}

impl IngestReport {
    fn new(source_id: Uuid) -> Self {
        IngestReport {
            source_id,
            outcome: IngestOutcome::Completed,
            created: 0,
            duplicates: 0,
            skipped: 0,
        }
    }
}

/// Processes a single source. Failures are logged and reported, never returned.
///
/// The source is marked fetched before the network call, so a feed that keeps
/// failing moves to the back of the due queue like any other.
pub async fn process_source(store: &dyn Store, fetcher: &Fetcher, source: &Source) -> IngestReport {
    let mut report = IngestReport::new(source.id);

    if let Err(err) = store.mark_fetched(source.id).await {
        error!(target: TARGET_SCRAPER, "Couldn't mark source {} ({}) as fetched: {}", source.name, source.id, err);
        report.outcome = IngestOutcome::MarkFailed;
        return report;
    }

    let items = match fetcher.fetch(&source.url).await {
        Ok(items) => items,
        Err(err) => {
            error!(target: TARGET_SCRAPER, "Error fetching feed {}: {}", source.url, err);
            report.outcome = IngestOutcome::FetchFailed;
            return report;
        }
    };

    debug!(target: TARGET_SCRAPER, "Source {} returned {} items", source.url, items.len());

    for item in items {
        let Some(post) = build_post(source, item) else {
            report.skipped += 1;
            continue;
        };

        let url = post.url.clone();
        match store.insert_post(post).await {
            Ok(_) => report.created += 1,
            Err(err) if err.is_duplicate() => {
                debug!(target: TARGET_SCRAPER, "Post {} already exists", url);
                report.duplicates += 1;
            }
            Err(err) => {
                error!(target: TARGET_SCRAPER, "Couldn't create post {}: {}", url, err);
                report.outcome = IngestOutcome::StoreFailed;
                break;
            }
        }
    }

    info!(
        target: TARGET_SCRAPER,
        "Collected {} new posts from {} ({} duplicates, {} skipped)",
        report.created,
        source.url,
        report.duplicates,
        report.skipped
    );

    report
}

/// Turns a feed item into an insert candidate, or `None` when it must be skipped.
fn build_post(source: &Source, item: FeedItem) -> Option<NewPost> {
    let url = item.link.trim();
    if url.is_empty() {
        debug!(target: TARGET_SCRAPER, "Skipping item {:?} from {}: no link", item.title, source.url);
        return None;
    }

    let published_at = match item.pub_date.as_deref() {
        Some(raw) => match parse_date(raw) {
            Ok(date) => Some(date),
            Err(err) => {
                warn!(target: TARGET_SCRAPER, "Skipping {}: {}", url, err);
                return None;
            }
        },
        None => None,
    };

    Some(NewPost {
        title: item.title,
        description: item.description,
        url: url.to_string(),
        published_at,
        source_name: Some(source.name.clone()).filter(|name| !name.is_empty()),
    })
}
