//! One aggregation cycle: select the stalest feed, claim it, fetch it, and
//! commit its items.
//!
//! The claim (`last_fetched_at = now`) is written before the fetch starts, so a
//! feed that always fails still rotates to the back of the queue instead of
//! being retried on every tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use crate::app::GatorError;
use crate::domain::{Feed, Item};
use crate::fetcher::Fetcher;
use crate::normalizer::{normalize_pub_date, optional_text, Document, Entry};
use crate::scheduler::shutdown::Shutdown;
use crate::store::{InsertOutcome, Store};

/// Step of the cycle at which a feed-level failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Select,
    Claim,
    Fetch,
}

#[derive(Debug)]
pub struct FeedFailure {
    pub feed_id: Option<i64>,
    pub feed_url: Option<String>,
    pub stage: CycleStage,
    pub error: GatorError,
}

#[derive(Debug, Error)]
pub enum ItemError {
    #[error("entry has no link")]
    MissingLink,

    #[error(transparent)]
    Store(#[from] GatorError),
}

#[derive(Debug)]
pub struct ItemFailure {
    /// Position of the entry in the fetched document.
    pub index: usize,
    pub link: String,
    pub error: ItemError,
}

#[derive(Debug)]
pub struct CycleSummary {
    pub feed_id: i64,
    pub feed_url: String,
    pub created: usize,
    pub duplicates: usize,
    pub failures: Vec<ItemFailure>,
}

#[derive(Debug)]
pub enum CycleReport {
    /// The store holds no feeds.
    NoFeeds,
    /// The feed was fetched; individual items may still have failed.
    Completed(CycleSummary),
    FeedFailed(FeedFailure),
}

impl CycleReport {
    pub fn is_feed_failure(&self) -> bool {
        matches!(self, CycleReport::FeedFailed(_))
    }

    pub fn created(&self) -> usize {
        match self {
            CycleReport::Completed(summary) => summary.created,
            _ => 0,
        }
    }
}

#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn Store + Send + Sync>,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    fetch_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn Store + Send + Sync>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            fetch_timeout,
        }
    }

    pub async fn run_one_cycle(&self, shutdown: &mut Shutdown) -> CycleReport {
        if shutdown.is_triggered() {
            return failed(None, CycleStage::Select, GatorError::Cancelled);
        }

        let feed = match self.store.next_feed_to_fetch() {
            Ok(Some(feed)) => feed,
            Ok(None) => return CycleReport::NoFeeds,
            Err(e) => return failed(None, CycleStage::Select, e),
        };

        if let Err(e) = self.store.mark_feed_fetched(feed.id, Utc::now()) {
            return failed(Some(&feed), CycleStage::Claim, e);
        }

        tracing::debug!(feed_id = feed.id, url = %feed.url, "claimed feed");

        let fetched = tokio::select! {
            biased;
            _ = shutdown.triggered() => Err(GatorError::Cancelled),
            result = self.fetcher.fetch(&feed.url, self.fetch_timeout) => result,
        };

        let document = match fetched {
            Ok(document) => document,
            Err(e) => return failed(Some(&feed), CycleStage::Fetch, e),
        };

        CycleReport::Completed(self.commit_items(&feed, &document))
    }

    fn commit_items(&self, feed: &Feed, document: &Document) -> CycleSummary {
        let mut summary = CycleSummary {
            feed_id: feed.id,
            feed_url: feed.url.clone(),
            created: 0,
            duplicates: 0,
            failures: Vec::new(),
        };

        for (index, entry) in document.entries.iter().enumerate() {
            let Some(item) = candidate_item(feed.id, entry) else {
                tracing::warn!(feed_id = feed.id, index, "skipping entry without link");
                summary.failures.push(ItemFailure {
                    index,
                    link: String::new(),
                    error: ItemError::MissingLink,
                });
                continue;
            };

            match self.store.create_item(&item) {
                Ok(InsertOutcome::Created(id)) => {
                    tracing::debug!(item_id = id, link = %item.link, "stored item");
                    summary.created += 1;
                }
                Ok(InsertOutcome::Duplicate) => {
                    tracing::debug!(link = %item.link, "item already stored");
                    summary.duplicates += 1;
                }
                Err(e) => {
                    tracing::warn!(link = %item.link, error = %e, "failed to store item");
                    summary.failures.push(ItemFailure {
                        index,
                        link: item.link,
                        error: ItemError::Store(e),
                    });
                }
            }
        }

        summary
    }
}

fn failed(feed: Option<&Feed>, stage: CycleStage, error: GatorError) -> CycleReport {
    CycleReport::FeedFailed(FeedFailure {
        feed_id: feed.map(|f| f.id),
        feed_url: feed.map(|f| f.url.clone()),
        stage,
        error,
    })
}

/// Build the row to insert for `entry`, or `None` when it has no link to key on.
pub fn candidate_item(feed_id: i64, entry: &Entry) -> Option<Item> {
    if entry.link.is_empty() {
        return None;
    }

    let mut item = Item::new(feed_id, entry.link.clone());
    item.title = optional_text(&entry.title);
    item.description = optional_text(&entry.description);
    item.published_at = normalize_pub_date(&entry.pub_date);
    Some(item)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::app::Result;
    use crate::domain::User;
    use crate::scheduler::shutdown;
    use crate::store::SqliteStore;

    /// Serves canned documents by URL; unknown URLs fail.
    #[derive(Default)]
    struct ScriptedFetcher {
        documents: Mutex<HashMap<String, Document>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn serve(&self, url: &str, document: Document) {
            self.documents
                .lock()
                .unwrap()
                .insert(url.to_string(), document);
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str, _deadline: Duration) -> Result<Document> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.documents
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| GatorError::FeedParse(format!("no document for {}", url)))
        }
    }

    /// Never completes.
    struct HangingFetcher;

    #[async_trait]
    impl Fetcher for HangingFetcher {
        async fn fetch(&self, _url: &str, _deadline: Duration) -> Result<Document> {
            std::future::pending().await
        }
    }

    fn entry(title: &str, link: &str) -> Entry {
        Entry {
            title: title.into(),
            link: link.into(),
            description: String::new(),
            pub_date: String::new(),
        }
    }

    fn document(entries: Vec<Entry>) -> Document {
        Document {
            title: "Doc".into(),
            entries,
            ..Document::default()
        }
    }

    struct Fixture {
        store: Arc<SqliteStore>,
        fetcher: Arc<ScriptedFetcher>,
        pipeline: IngestionPipeline,
        user_id: i64,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let fetcher = Arc::new(ScriptedFetcher::default());
        let user_id = store.create_user(&User::new("alice".into())).unwrap();
        let pipeline =
            IngestionPipeline::new(store.clone(), fetcher.clone(), Duration::from_secs(5));
        Fixture {
            store,
            fetcher,
            pipeline,
            user_id,
        }
    }

    impl Fixture {
        fn add_feed(&self, url: &str) -> i64 {
            self.store
                .create_feed(&Feed::new(url.into(), url.into(), self.user_id))
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_no_feeds_is_a_no_op() {
        let f = fixture();
        let (_trigger, mut stop) = shutdown::channel();

        let report = f.pipeline.run_one_cycle(&mut stop).await;

        assert!(matches!(report, CycleReport::NoFeeds));
        assert!(!report.is_feed_failure());
        assert_eq!(f.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cycle_stores_items_in_document_order() {
        let f = fixture();
        let feed_id = f.add_feed("https://a.example.com/rss");
        f.fetcher.serve(
            "https://a.example.com/rss",
            document(vec![
                entry("One", "https://a.example.com/1"),
                entry("Two", "https://a.example.com/2"),
            ]),
        );
        let (_trigger, mut stop) = shutdown::channel();

        let report = f.pipeline.run_one_cycle(&mut stop).await;

        let CycleReport::Completed(summary) = report else {
            panic!("expected completed cycle");
        };
        assert_eq!(summary.feed_id, feed_id);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.duplicates, 0);
        assert!(summary.failures.is_empty());

        let items = f.store.get_items_by_feed(feed_id).unwrap();
        assert_eq!(items[0].link, "https://a.example.com/1");
        assert_eq!(items[1].link, "https://a.example.com/2");
        assert!(f.store.get_feed(feed_id).unwrap().unwrap().last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_second_cycle_on_unchanged_document_adds_nothing() {
        let f = fixture();
        let feed_id = f.add_feed("https://a.example.com/rss");
        f.fetcher.serve(
            "https://a.example.com/rss",
            document(vec![entry("One", "https://a.example.com/1")]),
        );
        let (_trigger, mut stop) = shutdown::channel();

        f.pipeline.run_one_cycle(&mut stop).await;
        let before = f.store.get_items_by_feed(feed_id).unwrap();
        let report = f.pipeline.run_one_cycle(&mut stop).await;
        let after = f.store.get_items_by_feed(feed_id).unwrap();

        let CycleReport::Completed(summary) = report else {
            panic!("expected completed cycle");
        };
        assert_eq!(summary.created, 0);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_duplicate_links_within_document() {
        let f = fixture();
        let feed_id = f.add_feed("https://a.example.com/rss");
        f.fetcher.serve(
            "https://a.example.com/rss",
            document(vec![
                entry("First copy", "https://a.example.com/same"),
                entry("Second copy", "https://a.example.com/same"),
            ]),
        );
        let (_trigger, mut stop) = shutdown::channel();

        let report = f.pipeline.run_one_cycle(&mut stop).await;

        assert!(!report.is_feed_failure());
        let CycleReport::Completed(summary) = report else {
            panic!("expected completed cycle");
        };
        assert_eq!(summary.created, 1);
        assert_eq!(summary.duplicates, 1);
        assert!(summary.failures.is_empty());

        let items = f.store.get_items_by_feed(feed_id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("First copy"));
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_claim_and_stores_nothing() {
        let f = fixture();
        let feed_id = f.add_feed("https://broken.example.com/rss");
        let (_trigger, mut stop) = shutdown::channel();

        let report = f.pipeline.run_one_cycle(&mut stop).await;

        let CycleReport::FeedFailed(failure) = report else {
            panic!("expected feed failure");
        };
        assert_eq!(failure.stage, CycleStage::Fetch);
        assert_eq!(failure.feed_id, Some(feed_id));
        assert!(matches!(failure.error, GatorError::FeedParse(_)));

        let feed = f.store.get_feed(feed_id).unwrap().unwrap();
        assert!(feed.last_fetched_at.is_some());
        assert_eq!(f.store.count_items().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failing_feed_rotates_behind_healthy_one() {
        let f = fixture();
        let broken = f.add_feed("https://broken.example.com/rss");
        let healthy = f.add_feed("https://ok.example.com/rss");
        f.fetcher.serve("https://ok.example.com/rss", document(vec![]));
        let (_trigger, mut stop) = shutdown::channel();

        let first = f.pipeline.run_one_cycle(&mut stop).await;
        let second = f.pipeline.run_one_cycle(&mut stop).await;

        let CycleReport::FeedFailed(failure) = first else {
            panic!("expected feed failure");
        };
        assert_eq!(failure.feed_id, Some(broken));
        let CycleReport::Completed(summary) = second else {
            panic!("expected completed cycle");
        };
        assert_eq!(summary.feed_id, healthy);
    }

    #[tokio::test]
    async fn test_never_fetched_feed_goes_first() {
        let f = fixture();
        let a = f.add_feed("https://a.example.com/rss");
        let b = f.add_feed("https://b.example.com/rss");
        f.store
            .mark_feed_fetched(b, Utc::now() - ChronoDuration::minutes(10))
            .unwrap();
        f.fetcher.serve("https://a.example.com/rss", document(vec![]));
        f.fetcher.serve("https://b.example.com/rss", document(vec![]));
        let (_trigger, mut stop) = shutdown::channel();

        let CycleReport::Completed(first) = f.pipeline.run_one_cycle(&mut stop).await else {
            panic!("expected completed cycle");
        };
        let CycleReport::Completed(second) = f.pipeline.run_one_cycle(&mut stop).await else {
            panic!("expected completed cycle");
        };

        assert_eq!(first.feed_id, a);
        assert_eq!(second.feed_id, b);
    }

    #[tokio::test]
    async fn test_empty_fields_are_stored_as_absent() {
        let f = fixture();
        let feed_id = f.add_feed("https://a.example.com/rss");
        f.fetcher.serve(
            "https://a.example.com/rss",
            document(vec![Entry {
                title: String::new(),
                link: "https://a.example.com/bare".into(),
                description: String::new(),
                pub_date: "Mon, 01 Jan 2024 00:00:00 GMT".into(),
            }]),
        );
        let (_trigger, mut stop) = shutdown::channel();

        f.pipeline.run_one_cycle(&mut stop).await;

        let item = &f.store.get_items_by_feed(feed_id).unwrap()[0];
        assert_eq!(item.title, None);
        assert_eq!(item.description, None);
        assert_eq!(item.published_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_entry_without_link_is_item_failure() {
        let f = fixture();
        f.add_feed("https://a.example.com/rss");
        f.fetcher.serve(
            "https://a.example.com/rss",
            document(vec![
                entry("No link", ""),
                entry("Good", "https://a.example.com/good"),
            ]),
        );
        let (_trigger, mut stop) = shutdown::channel();

        let report = f.pipeline.run_one_cycle(&mut stop).await;

        let CycleReport::Completed(summary) = report else {
            panic!("expected completed cycle");
        };
        assert_eq!(summary.created, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].index, 0);
        assert!(matches!(summary.failures[0].error, ItemError::MissingLink));
    }

    #[tokio::test]
    async fn test_already_stopped_claims_nothing() {
        let f = fixture();
        let feed_id = f.add_feed("https://a.example.com/rss");
        let (trigger, mut stop) = shutdown::channel();
        trigger.trigger();

        let report = f.pipeline.run_one_cycle(&mut stop).await;

        let CycleReport::FeedFailed(failure) = report else {
            panic!("expected feed failure");
        };
        assert_eq!(failure.stage, CycleStage::Select);
        assert!(matches!(failure.error, GatorError::Cancelled));
        assert!(f.store.get_feed(feed_id).unwrap().unwrap().last_fetched_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_fetch_cancels_cycle() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let user_id = store.create_user(&User::new("alice".into())).unwrap();
        let feed_id = store
            .create_feed(&Feed::new("slow".into(), "https://slow.example.com".into(), user_id))
            .unwrap();
        let pipeline = IngestionPipeline::new(
            store.clone(),
            Arc::new(HangingFetcher),
            Duration::from_secs(30),
        );
        let (trigger, mut stop) = shutdown::channel();

        let stopper = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.trigger();
        };
        let (report, _) = tokio::join!(pipeline.run_one_cycle(&mut stop), stopper);

        let CycleReport::FeedFailed(failure) = report else {
            panic!("expected feed failure");
        };
        assert_eq!(failure.stage, CycleStage::Fetch);
        assert!(matches!(failure.error, GatorError::Cancelled));
        // The claim stands.
        assert!(store.get_feed(feed_id).unwrap().unwrap().last_fetched_at.is_some());
        assert_eq!(store.count_items().unwrap(), 0);
    }

    #[test]
    fn test_candidate_item_keeps_raw_unparsable_date() {
        let mut e = entry("Title", "https://a.example.com/x");
        e.pub_date = "sometime last week".into();

        let item = candidate_item(7, &e).unwrap();
        assert_eq!(item.feed_id, 7);
        assert_eq!(item.title.as_deref(), Some("Title"));
        assert_eq!(item.published_at.as_deref(), Some("sometime last week"));
    }
}
