use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user following a feed. At most one exists per (user, feed) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub feed_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(user_id: i64, feed_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id,
            feed_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Subscription row resolved to the names shown to the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowedFeed {
    pub subscription_id: i64,
    pub feed_id: i64,
    pub feed_name: String,
    pub feed_url: String,
    pub user_name: String,
}
