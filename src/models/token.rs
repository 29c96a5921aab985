use crate::core::types::{Mint, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenMetaSource {
    ProtocolApi,
    Aggregator,
    DexScreener,
    OnchainMetadata,
    Default,
}

/// Symbol, decimals and provenance for a mint. Decimals are always in 0..18.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMeta {
    pub symbol: String,
    pub decimals: u8,
    pub name: Option<String>,
    pub source: TokenMetaSource,
}

impl TokenMeta {
    pub fn placeholder(mint: &Mint) -> Self {
        Self {
            symbol: mint.short(),
            decimals: 9,
            name: None,
            source: TokenMetaSource::Default,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceEntry {
    pub mint: Mint,
    pub price_usd: Decimal,
    pub updated_at: Timestamp,
    pub source: String,
}

impl PriceEntry {
    /// A price is usable as long as it isn't more than twice the refresh
    /// interval old.
    pub fn is_usable(&self, now: Timestamp, refresh_interval_secs: i64) -> bool {
        now - self.updated_at < 2 * refresh_interval_secs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    Unknown,
    Ok,
    Degraded,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    pub status: ApiStatus,
    pub last_check: Timestamp,
    pub consecutive_failures: u32,
}

impl Default for ApiHealth {
    fn default() -> Self {
        Self {
            status: ApiStatus::Unknown,
            last_check: 0,
            consecutive_failures: 0,
        }
    }
}

impl ApiHealth {
    pub fn record_success(&mut self, now: Timestamp) {
        self.status = ApiStatus::Ok;
        self.consecutive_failures = 0;
        self.last_check = now;
    }

    pub fn record_failure(&mut self, now: Timestamp) {
        self.consecutive_failures += 1;
        self.status = if self.consecutive_failures < 3 {
            ApiStatus::Degraded
        } else {
            ApiStatus::Down
        };
        self.last_check = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_stale_past_double_refresh() {
        let entry = PriceEntry {
            mint: Mint::from("So11111111111111111111111111111111111111112".to_string()),
            price_usd: Decimal::new(100, 0),
            updated_at: 0,
            source: "aggregator_a".to_string(),
        };
        assert!(entry.is_usable(599, 300));
        assert!(!entry.is_usable(600, 300));
    }

    #[test]
    fn health_transitions_to_down_after_three_failures() {
        let mut health = ApiHealth::default();
        health.record_failure(1);
        assert_eq!(health.status, ApiStatus::Degraded);
        health.record_failure(2);
        assert_eq!(health.status, ApiStatus::Degraded);
        health.record_failure(3);
        assert_eq!(health.status, ApiStatus::Down);
        health.record_success(4);
        assert_eq!(health.status, ApiStatus::Ok);
        assert_eq!(health.consecutive_failures, 0);
    }
}
