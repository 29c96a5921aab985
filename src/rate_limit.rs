//! Per-upstream token-bucket limiting and retrying HTTP fetch.

use crate::core::error::{NetworkError, TrackerResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

struct Bucket {
    capacity: u32,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(rate_per_sec: u32) -> Self {
        Self {
            capacity: rate_per_sec,
            tokens: rate_per_sec as f64,
            refill_per_sec: rate_per_sec as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity as f64);
        self.last_refill = Instant::now();
    }

    fn try_take(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Process-wide set of per-provider token buckets, held by `Core`.
pub struct RateLimiters {
    buckets: DashMap<String, Mutex<Bucket>>,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    pub fn register(&self, provider_id: &str, rate_per_sec: u32) {
        self.buckets
            .entry(provider_id.to_string())
            .or_insert_with(|| Mutex::new(Bucket::new(rate_per_sec)));
    }

    /// Blocks until the provider's token bucket admits the caller.
    pub async fn acquire(&self, provider_id: &str) {
        loop {
            let admitted = match self.buckets.get(provider_id) {
                Some(bucket) => bucket.lock().try_take(),
                None => true,
            };
            if admitted {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FetchOptions {
    pub max_retries: u32,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Issues a GET request with retry/backoff, decoding the body as JSON.
///
/// 429s wait `1s * (attempt + 1)` without burning an extra retry beyond
/// `max_retries`; network errors and timeouts wait `0.5s * (attempt + 1)`;
/// any other non-2xx is retried until exhaustion and then surfaced as
/// `NetworkError::Upstream`.
pub async fn fetch_with_retry<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> TrackerResult<T> {
    let mut last_err = None;
    for attempt in 0..=opts.max_retries {
        let request = client
            .get(url)
            .header("Accept", "application/json")
            .timeout(opts.timeout);

        let response = match tokio::time::timeout(opts.timeout, request.send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                last_err = Some(NetworkError::ConnectionFailed(e.to_string()));
                tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                continue;
            }
            Err(_) => {
                last_err = Some(NetworkError::Timeout(opts.timeout));
                tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                continue;
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(url, attempt, "rate limited by upstream");
            last_err = Some(NetworkError::RateLimited(Duration::from_secs(
                attempt as u64 + 1,
            )));
            tokio::time::sleep(Duration::from_secs(attempt as u64 + 1)).await;
            continue;
        }
        if !status.is_success() {
            last_err = Some(NetworkError::Upstream {
                status: Some(status.as_u16()),
                cause: status.to_string(),
            });
            debug!(url, %status, attempt, "non-2xx response, retrying");
            continue;
        }

        return response
            .json::<T>()
            .await
            .map_err(|e| NetworkError::Upstream {
                status: Some(status.as_u16()),
                cause: e.to_string(),
            })
            .map_err(Into::into);
    }
    Err(last_err
        .unwrap_or(NetworkError::ConnectionFailed("exhausted retries".to_string()))
        .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bucket_refills_over_time() {
        let limiters = RateLimiters::new();
        limiters.register("test", 1000);
        for _ in 0..1000 {
            limiters.acquire("test").await;
        }
    }

    #[test]
    fn unregistered_provider_admits_immediately() {
        let mut bucket = Bucket::new(1);
        assert!(bucket.try_take());
        assert!(!bucket.try_take());
    }
}
