use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::api::latency::LatencyStats;
use crate::config::{FeedConfig, FetchPolicy, USER_AGENT};
use crate::error::{AppError, Result};

/// Retrieves the raw document for one feed.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, feed: &FeedConfig) -> Result<String>;
}

/// reqwest-backed fetcher with a fixed wait between attempts.
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: FetchPolicy,
    latency: Arc<LatencyStats>,
}

impl HttpFetcher {
    pub fn new(policy: FetchPolicy, latency: Arc<LatencyStats>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(policy.timeout)
            .connect_timeout(policy.timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, policy, latency })
    }

    async fn attempt(&self, feed: &FeedConfig) -> Result<String> {
        let started = Instant::now();
        let resp = self.client.get(&feed.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Fetch {
                feed: feed.id.to_string(),
                reason: format!("HTTP status {status}"),
            });
        }
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Err(AppError::Fetch {
                feed: feed.id.to_string(),
                reason: "empty response body".to_string(),
            });
        }
        self.latency.record_feed(&feed.id, started.elapsed());
        Ok(body)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, feed: &FeedConfig) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            match self.attempt(feed).await {
                Ok(body) => {
                    debug!(feed = %feed.id, bytes = body.len(), attempt, "page fetched");
                    return Ok(body);
                }
                Err(e) if attempt < self.policy.max_retries => {
                    attempt += 1;
                    warn!(
                        feed = %feed.id,
                        attempt,
                        max_retries = self.policy.max_retries,
                        wait_ms = self.policy.retry_wait.as_millis() as u64,
                        "fetch failed, retrying: {e}"
                    );
                    tokio::time::sleep(self.policy.retry_wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves the given raw HTTP responses, one per connection, in order.
    async fn serve(responses: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let (mut sock, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 4096];
                let _ = sock.read(&mut buf).await;
                sock.write_all(response.as_bytes()).await.unwrap();
                let _ = sock.shutdown().await;
            }
        });
        format!("http://{addr}/jnd28_sf1_msds.html")
    }

    fn feed(url: String) -> FeedConfig {
        FeedConfig { id: crate::types::FeedId::new("sf1"), url }
    }

    fn policy(max_retries: u32) -> FetchPolicy {
        FetchPolicy {
            timeout: Duration::from_secs(2),
            max_retries,
            retry_wait: Duration::from_millis(10),
        }
    }

    const OK: &str = "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello";
    const ERR: &str = "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const EMPTY: &str = "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    #[tokio::test]
    async fn returns_body_and_records_latency() {
        let latency = Arc::new(LatencyStats::new());
        let fetcher = HttpFetcher::new(policy(0), latency.clone()).unwrap();
        let body = fetcher.fetch(&feed(serve(vec![OK]).await)).await.unwrap();
        assert_eq!(body, "hello");
        assert_eq!(latency.overall().samples, 1);
    }

    #[tokio::test]
    async fn non_success_status_is_a_failure() {
        let fetcher = HttpFetcher::new(policy(0), Arc::new(LatencyStats::new())).unwrap();
        let err = fetcher.fetch(&feed(serve(vec![ERR]).await)).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
    }

    #[tokio::test]
    async fn empty_body_is_a_failure() {
        let fetcher = HttpFetcher::new(policy(0), Arc::new(LatencyStats::new())).unwrap();
        let err = fetcher.fetch(&feed(serve(vec![EMPTY]).await)).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let fetcher = HttpFetcher::new(policy(2), Arc::new(LatencyStats::new())).unwrap();
        let body = fetcher.fetch(&feed(serve(vec![ERR, ERR, OK]).await)).await.unwrap();
        assert_eq!(body, "hello");
    }
}
