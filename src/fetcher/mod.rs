pub mod http_fetcher;

use std::time::Duration;

use async_trait::async_trait;

use crate::app::Result;
use crate::normalizer::Document;

/// One bounded retrieval of a feed URL, parsed into a [`Document`].
///
/// Implementations never retry; a failed fetch is reported to the caller and
/// the scheduler decides when the feed comes around again.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str, deadline: Duration) -> Result<Document>;
}
