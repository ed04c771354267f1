use crate::crawler::fetcher::{FetchError, Fetcher, PageFetch};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Retries transient failures of an inner fetcher
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Timeout | Retry |
/// | Connection error | Retry |
/// | HTTP 502 / 503 / 504 | Retry |
/// | Unsafe target, redirect errors | Immediate |
/// | Any other response | Immediate |
///
/// Delays double after every attempt, starting at `base_delay`.
pub struct RetryingFetcher<F> {
    inner: F,
    max_retries: u32,
    base_delay: Duration,
}

impl<F: Fetcher> RetryingFetcher<F> {
    pub fn new(inner: F, max_retries: u32) -> Self {
        Self::with_base_delay(inner, max_retries, Duration::from_millis(500))
    }

    pub fn with_base_delay(inner: F, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
        }
    }
}

fn should_retry(result: &Result<PageFetch, FetchError>) -> bool {
    match result {
        Ok(page) => matches!(page.status, 502..=504),
        Err(err) => err.is_transient(),
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for RetryingFetcher<F> {
    async fn fetch(&self, url: &Url) -> Result<PageFetch, FetchError> {
        let mut attempt = 0;
        loop {
            let result = self.inner.fetch(url).await;
            if attempt >= self.max_retries || !should_retry(&result) {
                return result;
            }

            let delay = self.base_delay * 2u32.saturating_pow(attempt);
            tracing::debug!(
                "Transient failure for {} (attempt {}), retrying in {:?}",
                url,
                attempt + 1,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
