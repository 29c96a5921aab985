//! Two long-lived WebSocket clients (DEX feed, wallet feed) with keepalive
//! and exponential-backoff reconnect, built on `tokio-tungstenite` with a
//! `connect_async` + `StreamExt`/`SinkExt` split loop inside a
//! `tokio::select!` — the same shape used for outbound exchange WebSocket
//! adapters elsewhere in the corpus.

pub mod dex;
pub mod wallet;

use std::time::Duration;

/// `min(base * 2^attempt, cap)`, computed with a plain `u32` attempt
/// counter — no backoff crate needed for this.
pub fn backoff_delay(base: Duration, cap: Duration, attempt: u32) -> Duration {
    let multiplier = 1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX);
    let scaled = base.as_millis() as u64 .saturating_mul(multiplier);
    Duration::from_millis(scaled.min(cap.as_millis() as u64))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Open,
    Closed,
}

/// Which live feed a raw frame arrived on — the ingestion loop uses this to
/// pick the dex-vs-wallet dedup set and the decode context shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrigin {
    Dex,
    Wallet,
}

/// One undeduplicated frame handed to the ingestion loop.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub origin: FeedOrigin,
    pub sig: String,
    pub value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_max() {
        let base = Duration::from_secs(15);
        let cap = Duration::from_secs(300);
        assert_eq!(backoff_delay(base, cap, 0), Duration::from_secs(15));
        assert_eq!(backoff_delay(base, cap, 1), Duration::from_secs(30));
        assert_eq!(backoff_delay(base, cap, 10), cap);
    }
}
