//! The thin boundary exposed to the (excluded) chat-bot front end:
//! toggles, thresholds, wallet/watchlist management, and read-only
//! queries. Rejections never mutate state.

use crate::core::error::{CommandError, TrackerResult};
use crate::models::{Pool, PortfolioSnapshot};
use async_trait::async_trait;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleField {
    Enabled,
    PrimaryBuys,
    PrimarySells,
    PrimaryLpAdd,
    PrimaryLpRemove,
    TrackOtherPools,
    OtherLpAdd,
    OtherLpRemove,
    OtherBuys,
    OtherSells,
    WalletAlerts,
    DailyDigest,
    NewPoolAlerts,
    LockAlerts,
    RewardAlerts,
    ClosePoolAlerts,
    ProtocolFeeAlerts,
    AdminAlerts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKind {
    Primary,
    OtherTrade,
    OtherLp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchlistKind {
    Pool,
    Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleTimeframe {
    M15,
    H1,
    H4,
    D1,
}

#[async_trait]
pub trait CommandApi: Send + Sync {
    async fn toggle(&self, chat_id: i64, field: ToggleField) -> TrackerResult<()>;
    async fn set_threshold(&self, chat_id: i64, which: ThresholdKind, amount_usd: Decimal) -> TrackerResult<()>;
    async fn set_snooze(&self, chat_id: i64, minutes: u32) -> TrackerResult<()>;
    async fn set_quiet_hours(&self, chat_id: i64, start_utc: Option<u8>, end_utc: Option<u8>) -> TrackerResult<()>;

    async fn add_wallet(&self, chat_id: i64, address: &str) -> TrackerResult<()>;
    async fn remove_wallet(&self, chat_id: i64, address: &str) -> TrackerResult<()>;

    async fn add_portfolio_wallet(&self, chat_id: i64, address: &str) -> TrackerResult<()>;
    async fn remove_portfolio_wallet(&self, chat_id: i64, address: &str) -> TrackerResult<()>;

    async fn add_watchlist(&self, chat_id: i64, kind: WatchlistKind, value: &str) -> TrackerResult<()>;
    async fn remove_watchlist(&self, chat_id: i64, kind: WatchlistKind, value: &str) -> TrackerResult<()>;

    async fn sync_portfolio(&self, chat_id: i64) -> TrackerResult<Option<PortfolioSnapshot>>;

    async fn get_subscriber_enabled(&self, chat_id: i64) -> TrackerResult<bool>;
    async fn get_pool(&self, id: &str) -> TrackerResult<Option<Pool>>;
    async fn search_pools(&self, substring: &str) -> TrackerResult<Vec<Pool>>;
    async fn top_pools_by_volume(&self, n: usize) -> TrackerResult<Vec<Pool>>;
    async fn leaderboard(&self, pool_or_mint: &str, limit: usize) -> TrackerResult<Vec<(String, Decimal)>>;
    async fn candles(&self, pool_id: &str, tf: CandleTimeframe, limit: usize) -> TrackerResult<Vec<Candle>>;
    async fn liquidity_history(&self, pool_id: &str, limit: usize) -> TrackerResult<Vec<(i64, Decimal)>>;
}

#[derive(Debug, Clone)]
pub struct Candle {
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Validates a wallet address before the caller mutates any state.
pub fn validate_wallet(address: &str) -> Result<(), CommandError> {
    crate::core::types::Mint::parse(address)
        .map(|_| ())
        .map_err(|_| CommandError::InvalidWallet(address.to_string()))
}

/// Validates a quiet-hours pair: both present and in 0..23, or both absent.
pub fn validate_quiet_hours(start: Option<u8>, end: Option<u8>) -> Result<(), CommandError> {
    match (start, end) {
        (None, None) => Ok(()),
        (Some(s), Some(e)) if s <= 23 && e <= 23 => Ok(()),
        _ => Err(CommandError::InvalidQuietHours { start, end }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_hours_requires_both_or_neither() {
        assert!(validate_quiet_hours(None, None).is_ok());
        assert!(validate_quiet_hours(Some(22), Some(6)).is_ok());
        assert!(validate_quiet_hours(Some(22), None).is_err());
    }

    #[test]
    fn wallet_validation_rejects_short_addresses() {
        assert!(validate_wallet("abc").is_err());
        assert!(validate_wallet("So11111111111111111111111111111111111111112").is_ok());
    }
}
