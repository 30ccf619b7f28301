pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{Feed, FeedWithOwner, FollowedFeed, Item, Subscription, User};

pub use sqlite::SqliteStore;

/// Result of proposing a new item to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(i64),
    /// An item with the same link already exists; nothing was written.
    Duplicate,
}

pub trait Store {
    // User operations
    fn create_user(&self, user: &User) -> Result<i64>;
    fn get_user(&self, name: &str) -> Result<Option<User>>;
    fn get_users(&self) -> Result<Vec<User>>;
    fn delete_all_users(&self) -> Result<usize>;

    // Feed operations
    fn create_feed(&self, feed: &Feed) -> Result<i64>;
    fn get_feed(&self, id: i64) -> Result<Option<Feed>>;
    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>>;
    fn get_feeds_with_owner(&self) -> Result<Vec<FeedWithOwner>>;

    /// The feed due next: never-fetched feeds first, then oldest
    /// `last_fetched_at`, ties broken by insertion order. Read-only.
    fn next_feed_to_fetch(&self) -> Result<Option<Feed>>;
    fn mark_feed_fetched(&self, id: i64, when: DateTime<Utc>) -> Result<()>;

    // Subscription operations
    fn create_subscription(&self, subscription: &Subscription) -> Result<FollowedFeed>;
    fn get_subscriptions_for_user(&self, user_id: i64) -> Result<Vec<FollowedFeed>>;
    fn delete_subscription(&self, user_id: i64, feed_url: &str) -> Result<bool>;

    // Item operations
    fn create_item(&self, item: &Item) -> Result<InsertOutcome>;
    fn get_items_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<Item>>;
}
