use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    /// User who created the feed.
    pub user_id: i64,
    /// Start time of the most recent fetch attempt, `None` if never claimed.
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feed {
    pub fn new(name: String, url: String, user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            url,
            user_id,
            last_fetched_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}

/// A feed joined with the name of the user who added it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedWithOwner {
    pub feed: Feed,
    pub owner_name: String,
}
