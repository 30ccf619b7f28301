use chrono::{DateTime, SecondsFormat, Utc};
use html_escape::decode_html_entities;
use rss::Channel;

use crate::app::{GatorError, Result};

/// A parsed RSS channel with entity-decoded text.
///
/// Elements missing from the source come through as empty strings; deciding
/// what "absent" means is left to the ingestion step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub title: String,
    pub link: String,
    pub description: String,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    pub title: String,
    pub link: String,
    pub description: String,
    /// `pubDate` exactly as received. No calendar parsing happens here.
    pub pub_date: String,
}

#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, body: &[u8]) -> Result<Document> {
        let channel =
            Channel::read_from(body).map_err(|e| GatorError::FeedParse(e.to_string()))?;

        let entries = channel
            .items()
            .iter()
            .map(|item| Entry {
                title: decode(item.title().unwrap_or_default()),
                link: item.link().unwrap_or_default().to_string(),
                description: decode(item.description().unwrap_or_default()),
                pub_date: item.pub_date().unwrap_or_default().to_string(),
            })
            .collect();

        Ok(Document {
            title: decode(channel.title()),
            link: channel.link().to_string(),
            description: decode(channel.description()),
            entries,
        })
    }
}

// Feeds routinely escape their HTML twice; the XML reader undoes one level.
fn decode(text: &str) -> String {
    decode_html_entities(text).into_owned()
}

/// `None` for exactly empty text, the text otherwise.
pub fn optional_text(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Best-effort publication date: RFC 3339 UTC when the text parses as
/// RFC 2822 or RFC 3339, the raw text when it does not, `None` when empty.
pub fn normalize_pub_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .map(|dt| dt.with_timezone(&Utc));

    match parsed {
        Ok(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        Err(_) => Some(raw.to_string()),
    }
}
