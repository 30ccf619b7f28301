//! # Gator
//!
//! A multi-user RSS aggregator for the command line.
//!
//! ## Architecture
//!
//! The aggregation loop is a single pipeline driven by a timer:
//!
//! ```text
//! Scheduler → Selector (Store) → Claim → Fetcher → Normalizer → Store
//! ```
//!
//! Each tick picks the stalest feed, stamps it as fetched, downloads and parses
//! it, then inserts any items whose link has not been seen before.
//!
//! ## Quick Start
//!
//! ```bash
//! gator register alice
//! gator addfeed "Rust Blog" https://blog.rust-lang.org/feed.xml
//! gator agg 1m
//! gator browse 5
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store, the
/// fetcher and the loaded configuration.
pub mod app;

/// Command-line interface.
///
/// A closed set of [`CommandName`](cli::CommandName)s dispatched through the
/// [`CommandRegistry`](cli::CommandRegistry).
pub mod cli;

/// Configuration file handling.
///
/// Loads from `~/.config/gator/config.toml` and persists the current user.
pub mod config;

/// Core domain models.
pub mod domain;

/// HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for feed fetching
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// RSS 2.0 parsing into a [`Document`](normalizer::Document).
pub mod normalizer;

/// Select, claim, fetch and commit for a single feed.
pub mod pipeline;

/// Periodic cycles and the shutdown signal.
pub mod scheduler;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
