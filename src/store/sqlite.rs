use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{GatorError, Result};
use crate::domain::{Feed, FeedWithOwner, FollowedFeed, Item, Subscription, User};
use crate::store::{InsertOutcome, Store};

const USER_COLUMNS: &str = "id, name, created_at, updated_at";
const FEED_COLUMNS: &str = "id, name, url, user_id, last_fetched_at, created_at, updated_at";
// Matches publication dates the normalizer rewrote to RFC 3339. Raw dates that
// did not parse must not take part in recency ordering.
const TIMESTAMP_GLOB: &str = "[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]T*";
const ITEM_COLUMNS: &str =
    "id, feed_id, title, link, description, published_at, created_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations.to_latest(&mut conn)?;

        Ok(())
    }

    /// Every item of one feed in insertion order.
    pub fn get_items_by_feed(&self, feed_id: i64) -> Result<Vec<Item>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items WHERE feed_id = ?1 ORDER BY id",
            ITEM_COLUMNS
        ))?;

        let items = stmt
            .query_map(params![feed_id], Self::item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    pub fn count_items(&self) -> Result<i64> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            GatorError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    /// Fixed-width UTC text so that lexical order is chronological order.
    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn required_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
        Ok(row
            .get::<_, String>(idx)
            .ok()
            .and_then(|s| Self::parse_datetime(&s))
            .unwrap_or_else(Utc::now))
    }

    fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: Self::required_datetime(row, 2)?,
            updated_at: Self::required_datetime(row, 3)?,
        })
    }

    fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
        Ok(Feed {
            id: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            user_id: row.get(3)?,
            last_fetched_at: row
                .get::<_, Option<String>>(4)?
                .and_then(|s| Self::parse_datetime(&s)),
            created_at: Self::required_datetime(row, 5)?,
            updated_at: Self::required_datetime(row, 6)?,
        })
    }

    fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
        Ok(Item {
            id: row.get(0)?,
            feed_id: row.get(1)?,
            title: row.get(2)?,
            link: row.get(3)?,
            description: row.get(4)?,
            published_at: row.get(5)?,
            created_at: Self::required_datetime(row, 6)?,
            updated_at: Self::required_datetime(row, 7)?,
        })
    }

    fn followed_feed_from_row(row: &Row<'_>) -> rusqlite::Result<FollowedFeed> {
        Ok(FollowedFeed {
            subscription_id: row.get(0)?,
            feed_id: row.get(1)?,
            feed_name: row.get(2)?,
            feed_url: row.get(3)?,
            user_name: row.get(4)?,
        })
    }
}

impl Store for SqliteStore {
    fn create_user(&self, user: &User) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO users (name, created_at, updated_at) VALUES (?1, ?2, ?3)",
            params![
                user.name,
                Self::format_datetime(&user.created_at),
                Self::format_datetime(&user.updated_at)
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn get_user(&self, name: &str) -> Result<Option<User>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE name = ?1", USER_COLUMNS),
                params![name],
                Self::user_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn get_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY name", USER_COLUMNS))?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    fn delete_all_users(&self) -> Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM users", [])?)
    }

    fn create_feed(&self, feed: &Feed) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO feeds (name, url, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                feed.name,
                feed.url,
                feed.user_id,
                Self::format_datetime(&feed.created_at),
                Self::format_datetime(&feed.updated_at)
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn get_feed(&self, id: i64) -> Result<Option<Feed>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM feeds WHERE id = ?1", FEED_COLUMNS),
                params![id],
                Self::feed_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM feeds WHERE url = ?1", FEED_COLUMNS),
                params![url],
                Self::feed_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn get_feeds_with_owner(&self) -> Result<Vec<FeedWithOwner>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT f.id, f.name, f.url, f.user_id, f.last_fetched_at, f.created_at, f.updated_at,
                    u.name
             FROM feeds f
             JOIN users u ON u.id = f.user_id
             ORDER BY f.id",
        )?;

        let feeds = stmt
            .query_map([], |row| {
                Ok(FeedWithOwner {
                    feed: Self::feed_from_row(row)?,
                    owner_name: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(feeds)
    }

    fn next_feed_to_fetch(&self) -> Result<Option<Feed>> {
        let conn = self.conn()?;

        // NULL sorts first: never-fetched feeds win over any timestamp.
        let result = conn
            .query_row(
                &format!(
                    "SELECT {} FROM feeds
                     ORDER BY last_fetched_at IS NOT NULL, last_fetched_at ASC, id ASC
                     LIMIT 1",
                    FEED_COLUMNS
                ),
                [],
                Self::feed_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn mark_feed_fetched(&self, id: i64, when: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;

        let updated = conn.execute(
            "UPDATE feeds SET last_fetched_at = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                Self::format_datetime(&when),
                Self::format_datetime(&Utc::now()),
                id
            ],
        )?;

        if updated == 0 {
            return Err(GatorError::FeedNotFound(id.to_string()));
        }
        Ok(())
    }

    fn create_subscription(&self, subscription: &Subscription) -> Result<FollowedFeed> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                subscription.user_id,
                subscription.feed_id,
                Self::format_datetime(&subscription.created_at),
                Self::format_datetime(&subscription.updated_at)
            ],
        )?;
        let id = conn.last_insert_rowid();

        let followed = conn.query_row(
            "SELECT ff.id, f.id, f.name, f.url, u.name
             FROM feed_follows ff
             JOIN feeds f ON f.id = ff.feed_id
             JOIN users u ON u.id = ff.user_id
             WHERE ff.id = ?1",
            params![id],
            Self::followed_feed_from_row,
        )?;

        Ok(followed)
    }

    fn get_subscriptions_for_user(&self, user_id: i64) -> Result<Vec<FollowedFeed>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT ff.id, f.id, f.name, f.url, u.name
             FROM feed_follows ff
             JOIN feeds f ON f.id = ff.feed_id
             JOIN users u ON u.id = ff.user_id
             WHERE ff.user_id = ?1
             ORDER BY ff.id",
        )?;

        let followed = stmt
            .query_map(params![user_id], Self::followed_feed_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(followed)
    }

    fn delete_subscription(&self, user_id: i64, feed_url: &str) -> Result<bool> {
        let conn = self.conn()?;

        let deleted = conn.execute(
            "DELETE FROM feed_follows
             WHERE user_id = ?1 AND feed_id = (SELECT id FROM feeds WHERE url = ?2)",
            params![user_id, feed_url],
        )?;

        Ok(deleted > 0)
    }

    fn create_item(&self, item: &Item) -> Result<InsertOutcome> {
        let conn = self.conn()?;

        // Single statement: the uniqueness check and the insert cannot interleave
        // with another writer.
        let inserted = conn.execute(
            "INSERT INTO items (feed_id, title, link, description, published_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(link) DO NOTHING",
            params![
                item.feed_id,
                item.title,
                item.link,
                item.description,
                item.published_at,
                Self::format_datetime(&item.created_at),
                Self::format_datetime(&item.updated_at)
            ],
        )?;

        if inserted == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Created(conn.last_insert_rowid()))
        }
    }

    fn get_items_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<Item>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT i.id, i.feed_id, i.title, i.link, i.description, i.published_at,
                    i.created_at, i.updated_at,
                    CASE WHEN i.published_at GLOB ?3 THEN i.published_at END AS sort_key
             FROM items i
             JOIN feed_follows ff ON ff.feed_id = i.feed_id
             WHERE ff.user_id = ?1
             ORDER BY sort_key IS NULL, sort_key DESC, i.id DESC
             LIMIT ?2",
        )?;

        let items = stmt
            .query_map(
                params![user_id, limit as i64, TIMESTAMP_GLOB],
                Self::item_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }
}
