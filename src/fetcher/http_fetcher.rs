use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::app::Result;
use crate::config::{FetchConfig, DEFAULT_USER_AGENT};
use crate::fetcher::Fetcher;
use crate::normalizer::{Document, Normalizer};

pub struct HttpFetcher {
    client: Client,
    normalizer: Normalizer,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .gzip(true)
            .brotli(true)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            normalizer: Normalizer::new(),
        })
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        Self::new(&config.user_agent)
    }

    /// Client identifying itself with the default marker.
    pub fn with_default_agent() -> Result<Self> {
        Self::new(DEFAULT_USER_AGENT)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, deadline: Duration) -> Result<Document> {
        tracing::debug!(url, timeout_ms = deadline.as_millis() as u64, "fetching feed");

        let response = self.client.get(url).timeout(deadline).send().await?;
        response.error_for_status_ref()?;

        let body = response.bytes().await?;
        self.normalizer.normalize(&body)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::app::GatorError;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Mock Feed</title>
    <link>https://example.com/</link>
    <description>Served by mockito</description>
    <item>
      <title>First</title>
      <link>https://example.com/first</link>
      <pubDate>Tue, 02 Jan 2024 10:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    #[tokio::test]
    async fn test_fetch_sends_user_agent_and_parses() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/feed.xml")
            .match_header("user-agent", "gator")
            .with_status(200)
            .with_header("content-type", "application/rss+xml")
            .with_body(RSS)
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_agent().unwrap();
        let doc = fetcher
            .fetch(&format!("{}/feed.xml", server.url()), Duration::from_secs(5))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(doc.title, "Mock Feed");
        assert_eq!(doc.entries.len(), 1);
        assert_eq!(doc.entries[0].link, "https://example.com/first");
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.xml")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_agent().unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing.xml", server.url()), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, GatorError::Http(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/broken.xml")
            .with_status(200)
            .with_body("<html><body>not a feed</body></html>")
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_agent().unwrap();
        let err = fetcher
            .fetch(&format!("{}/broken.xml", server.url()), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, GatorError::FeedParse(_)));
    }

    #[tokio::test]
    async fn test_custom_user_agent_from_config() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/feed.xml")
            .match_header("user-agent", "gator-test/1.0")
            .with_status(200)
            .with_body(RSS)
            .create_async()
            .await;

        let config = FetchConfig {
            user_agent: "gator-test/1.0".into(),
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::from_config(&config).unwrap();
        fetcher
            .fetch(&format!("{}/feed.xml", server.url()), Duration::from_secs(5))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stalled_body_hits_deadline() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/slow.xml")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_secs(2));
                w.write_all(RSS.as_bytes())
            })
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_agent().unwrap();
        let started = std::time::Instant::now();
        let err = fetcher
            .fetch(&format!("{}/slow.xml", server.url()), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(err, GatorError::Http(ref e) if e.is_timeout()), "{:?}", err);
    }
}
