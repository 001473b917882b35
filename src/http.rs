//! Outbound HTTP with exponential backoff retry.
//!
//! Every scrape adapter and notifier fetches through one shared
//! [`reqwest::Client`] built by [`build_client`], which carries a request
//! timeout so no call blocks indefinitely.
//!
//! # Architecture
//!
//! - [`FetchAsync`]: core trait, fetch the body of a URL as text
//! - [`ClientFetcher`]: implements it over a `reqwest::Client`
//! - [`RetryFetch`]: decorator that adds retry to any [`FetchAsync`]
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use rand::{Rng, rng};
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Desktop browser user agent; several sources serve reduced pages otherwise.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Build the shared client with browser headers and a request timeout.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"));

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
}

/// Fetch a URL's body as text.
pub trait FetchAsync {
    async fn get_text(&self, url: &str) -> reqwest::Result<String>;
}

/// [`FetchAsync`] over a `reqwest::Client`. Non-2xx statuses are errors.
#[derive(Debug, Clone)]
pub struct ClientFetcher<'a> {
    pub client: &'a Client,
}

impl FetchAsync for ClientFetcher<'_> {
    async fn get_text(&self, url: &str) -> reqwest::Result<String> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

/// Retry decorator for any [`FetchAsync`].
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: FetchAsync> RetryFetch<T> {
    /// # Arguments
    ///
    /// * `inner` - The fetcher to wrap
    /// * `max_retries` - Attempts after the first failure
    /// * `base_delay` - First backoff delay, doubled per attempt
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: FetchAsync> FetchAsync for RetryFetch<T> {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get_text(&self, url: &str) -> reqwest::Result<String> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.get_text(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            elapsed_ms_total = total_t0.elapsed().as_millis(),
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(attempt, max = self.max_retries, ?delay, error = %e, "fetch failed; backing off");
                    sleep(delay).await;
                }
            }
        }
    }
}

/// GET a URL as text with two retries starting at one second.
pub async fn get_text_with_backoff(client: &Client, url: &str) -> reqwest::Result<String> {
    RetryFetch::new(ClientFetcher { client }, 2, Duration::from_secs(1))
        .get_text(url)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
        fail_first: usize,
        client: Client,
    }

    impl FetchAsync for Flaky {
        async fn get_text(&self, _url: &str) -> reqwest::Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                // An unroutable scheme yields a real reqwest::Error without network I/O.
                self.client.get("unsupported://x").send().await.map(|_| String::new())
            } else {
                Ok("ok".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failures() {
        let inner = Flaky {
            calls: AtomicUsize::new(0),
            fail_first: 2,
            client: Client::new(),
        };
        let retry = RetryFetch::new(inner, 3, Duration::from_millis(10));
        assert_eq!(retry.get_text("x").await.unwrap(), "ok");
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let inner = Flaky {
            calls: AtomicUsize::new(0),
            fail_first: usize::MAX,
            client: Client::new(),
        };
        let retry = RetryFetch::new(inner, 2, Duration::from_millis(10));
        assert!(retry.get_text("x").await.is_err());
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_is_capped() {
        let client = Client::new();
        let retry = RetryFetch::new(ClientFetcher { client: &client }, 5, Duration::from_secs(1));
        assert!(retry.backoff(1) < Duration::from_millis(1300));
        assert!(retry.backoff(40) <= Duration::from_millis(30_250));
    }
}
