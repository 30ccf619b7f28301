use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub feed_id: i64,
    pub title: Option<String>,
    /// Canonical link, unique across all items. Duplicates are rejected on insert.
    pub link: String,
    pub description: Option<String>,
    /// RFC 3339 when the source date could be parsed, otherwise the raw text.
    pub published_at: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(feed_id: i64, link: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            feed_id,
            title: None,
            link,
            description: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(Untitled)")
    }

    pub fn display_description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}
