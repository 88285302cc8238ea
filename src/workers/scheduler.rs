//! The scrape loop: every interval, ingest a batch of due sources in parallel.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use super::ingest::{process_source, IngestReport};
use crate::db::Store;
use crate::rss::Fetcher;
use crate::TARGET_SCRAPER;

pub struct Scheduler {
    store: Arc<dyn Store>,
    fetcher: Arc<Fetcher>,
    concurrency: usize,
    interval: Duration,
}

impl Scheduler {
    /// `concurrency` and `interval` are clamped to at least one source and one millisecond.
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<Fetcher>,
        concurrency: usize,
        interval: Duration,
    ) -> Self {
        Scheduler {
            store,
            fetcher,
            concurrency: concurrency.max(1),
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Runs forever. The first cycle starts immediately.
    ///
    /// A cycle that overruns the interval is followed by a single immediate
    /// cycle; the remaining missed ticks are dropped and later cycles stay on
    /// the original interval grid.
    pub async fn run(self) {
        info!(
            target: TARGET_SCRAPER,
            "Scraping on {} workers every {:?}", self.concurrency, self.interval
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// One batch: up to `concurrency` due sources, processed in parallel.
    /// Returns once every worker has finished.
    pub async fn run_cycle(&self) -> Vec<IngestReport> {
        let limit = i64::try_from(self.concurrency).unwrap_or(i64::MAX);
        let sources = match self.store.sources_due(limit).await {
            Ok(sources) => sources,
            Err(err) => {
                error!(target: TARGET_SCRAPER, "Error fetching sources to scrape: {}", err);
                return Vec::new();
            }
        };

        if sources.is_empty() {
            debug!(target: TARGET_SCRAPER, "No sources due");
            return Vec::new();
        }

        info!(target: TARGET_SCRAPER, "Fetching {} sources", sources.len());

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();

        for source in sources {
            let store = Arc::clone(&self.store);
            let fetcher = Arc::clone(&self.fetcher);
            let permits = Arc::clone(&permits);

            workers.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                process_source(store.as_ref(), &fetcher, &source).await
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(err) => error!(target: TARGET_SCRAPER, "Worker task failed: {}", err),
            }
        }

        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewPost, NewSource, Post, Source, StoreError};
    use crate::rss::FeedAliases;
    use crate::workers::IngestOutcome;
    use async_trait::async_trait;
    use mockito::Server;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;
    use uuid::Uuid;

    fn feed(slug: &str) -> String {
        format!(
            r#"<rss version="2.0"><channel>
<item><title>{slug}</title><link>https://example.com/{slug}/1</link><pubDate>Mon, 02 Jan 2006 15:04:05 GMT</pubDate></item>
<item><title>{slug} without link</title><link></link></item>
</channel></rss>"#
        )
    }

    fn fetcher() -> Arc<Fetcher> {
        Arc::new(Fetcher::new(FeedAliases::empty()).unwrap())
    }

    /// Every call fails; counts how often the due list was requested.
    #[derive(Default)]
    struct Unavailable {
        due_calls: AtomicUsize,
    }

    #[async_trait]
    impl Store for Unavailable {
        async fn sources_due(&self, _limit: i64) -> Result<Vec<Source>, StoreError> {
            self.due_calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn mark_fetched(&self, id: Uuid) -> Result<Source, StoreError> {
            Err(StoreError::NotFound(id))
        }
        async fn insert_post(&self, _post: NewPost) -> Result<Post, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn create_source(&self, _source: NewSource) -> Result<Source, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn list_sources(&self) -> Result<Vec<Source>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn list_posts(&self, _limit: i64) -> Result<Vec<Post>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
    }

    #[tokio::test]
    async fn test_single_cycle_end_to_end() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/feed.xml")
            .with_status(200)
            .with_header("content-type", "application/rss+xml")
            .with_body(feed("only"))
            .create_async()
            .await;

        let db = Database::in_memory().await.unwrap();
        db.register_source(&NewSource {
            name: "Example".to_string(),
            url: format!("{}/feed.xml", server.url()),
            source_type: "rss".to_string(),
        })
        .await
        .unwrap();

        let scheduler = Scheduler::new(
            Arc::new(db.clone()),
            fetcher(),
            10,
            Duration::from_secs(3600),
        );
        let reports = scheduler.run_cycle().await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].created, 1);
        assert_eq!(reports[0].skipped, 1);
        assert_eq!(db.count_posts().await.unwrap(), 1);

        let sources = db.list_sources().await.unwrap();
        assert!(sources[0].last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_failing_source_does_not_stop_siblings() {
        let mut server = Server::new_async().await;
        let db = Database::in_memory().await.unwrap();
        let mut broken = None;

        for n in 0..5 {
            let path = format!("/feed{}.xml", n);
            if n == 2 {
                server
                    .mock("GET", path.as_str())
                    .with_status(500)
                    .create_async()
                    .await;
            } else {
                server
                    .mock("GET", path.as_str())
                    .with_status(200)
                    .with_header("content-type", "text/xml")
                    .with_body(feed(&format!("source{}", n)))
                    .create_async()
                    .await;
            }

            let source = db
                .register_source(&NewSource {
                    name: format!("Source {}", n),
                    url: format!("{}{}", server.url(), path),
                    source_type: "rss".to_string(),
                })
                .await
                .unwrap();
            if n == 2 {
                broken = Some(source.id);
            }
        }
        let broken = broken.unwrap();

        let scheduler = Scheduler::new(
            Arc::new(db.clone()),
            fetcher(),
            3,
            Duration::from_secs(3600),
        );

        // The second batch takes the two never-fetched sources plus the oldest fetched one.
        let first = scheduler.run_cycle().await;
        let second = scheduler.run_cycle().await;
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);

        for report in first.iter().chain(second.iter()) {
            if report.source_id == broken {
                assert_eq!(report.outcome, IngestOutcome::FetchFailed);
            } else {
                assert_eq!(report.outcome, IngestOutcome::Completed);
            }
        }

        assert_eq!(db.count_posts().await.unwrap(), 4);
        let sources = db.list_sources().await.unwrap();
        assert_eq!(sources.len(), 5);
        assert!(sources.iter().all(|s| s.last_fetched_at.is_some()));
    }

    #[tokio::test]
    async fn test_shared_link_across_batch_is_stored_once() {
        let mut server = Server::new_async().await;
        let db = Database::in_memory().await.unwrap();
        let shared = r#"<rss version="2.0"><channel>
<item><title>Syndicated</title><link>https://example.com/shared</link></item>
</channel></rss>"#;

        for n in 0..3 {
            let path = format!("/mirror{}.xml", n);
            server
                .mock("GET", path.as_str())
                .with_status(200)
                .with_header("content-type", "application/rss+xml")
                .with_body(shared)
                .create_async()
                .await;
            db.register_source(&NewSource {
                name: format!("Mirror {}", n),
                url: format!("{}{}", server.url(), path),
                source_type: "rss".to_string(),
            })
            .await
            .unwrap();
        }

        let scheduler = Scheduler::new(
            Arc::new(db.clone()),
            fetcher(),
            3,
            Duration::from_secs(3600),
        );
        let reports = scheduler.run_cycle().await;

        assert_eq!(reports.len(), 3);
        assert!(reports
            .iter()
            .all(|r| r.outcome == IngestOutcome::Completed));
        assert_eq!(reports.iter().map(|r| r.created).sum::<usize>(), 1);
        assert_eq!(reports.iter().map(|r| r.duplicates).sum::<usize>(), 2);

        let posts = db.list_posts(10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "https://example.com/shared");
    }

    #[tokio::test]
    async fn test_query_failure_skips_cycle() {
        let store = Arc::new(Unavailable::default());
        let scheduler = Scheduler::new(store.clone(), fetcher(), 3, Duration::from_secs(3600));

        assert!(scheduler.run_cycle().await.is_empty());
        assert_eq!(store.due_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loop_survives_store_outage() {
        let store = Arc::new(Unavailable::default());
        let scheduler = Scheduler::new(store.clone(), fetcher(), 3, Duration::from_millis(10));

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(!handle.is_finished());
        handle.abort();
        assert!(store.due_calls.load(Ordering::SeqCst) >= 2);
    }

    /// Sleeps through the first due query, then answers instantly; records when each query ran.
    struct SlowFirstQuery {
        started: Instant,
        calls: Mutex<Vec<Duration>>,
        first_delay: Duration,
    }

    #[async_trait]
    impl Store for SlowFirstQuery {
        async fn sources_due(&self, _limit: i64) -> Result<Vec<Source>, StoreError> {
            let first = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(self.started.elapsed());
                calls.len() == 1
            };
            if first {
                tokio::time::sleep(self.first_delay).await;
            }
            Ok(Vec::new())
        }
        async fn mark_fetched(&self, id: Uuid) -> Result<Source, StoreError> {
            Err(StoreError::NotFound(id))
        }
        async fn insert_post(&self, _post: NewPost) -> Result<Post, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn create_source(&self, _source: NewSource) -> Result<Source, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn list_sources(&self) -> Result<Vec<Source>, StoreError> {
            Ok(Vec::new())
        }
        async fn list_posts(&self, _limit: i64) -> Result<Vec<Post>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_overrun_fires_once_then_keeps_schedule() {
        let store = Arc::new(SlowFirstQuery {
            started: Instant::now(),
            calls: Mutex::new(Vec::new()),
            first_delay: Duration::from_millis(500),
        });
        let scheduler = Scheduler::new(store.clone(), fetcher(), 1, Duration::from_millis(200));

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(900)).await;
        handle.abort();

        // Ticks due at 0, 200, 400, 600, 800 ms; the overrun swallows 200 and 400.
        let calls = store.calls.lock().unwrap().clone();
        assert!(calls.len() >= 3, "calls: {:?}", calls);
        let catch_up = calls[1] - calls[0];
        let next = calls[2] - calls[1];
        assert!(catch_up >= Duration::from_millis(480), "calls: {:?}", calls);
        assert!(next < Duration::from_millis(160), "calls: {:?}", calls);
    }
}
