use super::portfolio::PortfolioSnapshot;
use crate::core::types::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// One notification sent to a subscriber, kept in a bounded ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentAlert {
    pub sig: String,
    pub summary: String,
    pub sent_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DailyStats {
    pub day: Option<Timestamp>,
    pub notifications_sent: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LifetimeStats {
    pub notifications_sent: u64,
}

/// A chat-bot subscriber: filter preferences, tracked wallets/pools/tokens,
/// and the last portfolio snapshot synced on their behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub chat_id: i64,
    pub created_at: Timestamp,
    pub last_active: Timestamp,
    pub enabled: bool,
    pub blocked: bool,
    pub onboarded: bool,
    pub snoozed_until: Timestamp,
    pub quiet_start: Option<u8>,
    pub quiet_end: Option<u8>,

    pub primary_buys: bool,
    pub primary_sells: bool,
    pub primary_lp_add: bool,
    pub primary_lp_remove: bool,
    pub track_other_pools: bool,
    pub other_buys: bool,
    pub other_sells: bool,
    pub other_lp_add: bool,
    pub other_lp_remove: bool,
    pub wallet_alerts: bool,
    pub daily_digest: bool,
    pub new_pool_alerts: bool,
    pub lock_alerts: bool,
    pub reward_alerts: bool,
    pub close_pool_alerts: bool,
    pub protocol_fee_alerts: bool,
    pub admin_alerts: bool,

    pub primary_trade_min: Decimal,
    pub other_trade_min: Decimal,
    pub other_lp_min: Decimal,

    pub wallet_subscriptions: HashSet<String>,
    pub watchlist: HashSet<String>,
    pub tracked_tokens: HashSet<String>,
    pub portfolio_wallets: Vec<String>,

    pub recent_alerts: VecDeque<RecentAlert>,
    pub max_recent_alerts: usize,

    pub portfolio_snapshot: Option<PortfolioSnapshot>,
    pub daily_stats: DailyStats,
    pub lifetime_stats: LifetimeStats,
}

impl Subscriber {
    pub fn new(chat_id: i64, now: Timestamp, max_recent_alerts: usize) -> Self {
        Self {
            chat_id,
            created_at: now,
            last_active: now,
            enabled: true,
            blocked: false,
            onboarded: false,
            snoozed_until: 0,
            quiet_start: None,
            quiet_end: None,
            primary_buys: true,
            primary_sells: true,
            primary_lp_add: true,
            primary_lp_remove: true,
            track_other_pools: false,
            other_buys: false,
            other_sells: false,
            other_lp_add: false,
            other_lp_remove: false,
            wallet_alerts: true,
            daily_digest: false,
            new_pool_alerts: false,
            lock_alerts: false,
            reward_alerts: false,
            close_pool_alerts: false,
            protocol_fee_alerts: false,
            admin_alerts: false,
            primary_trade_min: Decimal::ZERO,
            other_trade_min: Decimal::ZERO,
            other_lp_min: Decimal::ZERO,
            wallet_subscriptions: HashSet::new(),
            watchlist: HashSet::new(),
            tracked_tokens: HashSet::new(),
            portfolio_wallets: Vec::new(),
            recent_alerts: VecDeque::new(),
            max_recent_alerts,
            portfolio_snapshot: None,
            daily_stats: DailyStats::default(),
            lifetime_stats: LifetimeStats::default(),
        }
    }

    /// True if `now` falls within `[snoozed_until]` or the (possibly
    /// wrapping) quiet-hours interval for `utc_hour`.
    pub fn is_snoozed(&self, now: Timestamp, utc_hour: u8) -> bool {
        if now < self.snoozed_until {
            return true;
        }
        match (self.quiet_start, self.quiet_end) {
            (Some(start), Some(end)) => {
                if start <= end {
                    utc_hour >= start && utc_hour < end
                } else {
                    utc_hour >= start || utc_hour < end
                }
            }
            _ => false,
        }
    }

    pub fn push_recent_alert(&mut self, alert: RecentAlert) {
        self.recent_alerts.push_back(alert);
        while self.recent_alerts.len() > self.max_recent_alerts {
            self.recent_alerts.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub() -> Subscriber {
        Subscriber::new(1, 0, 50)
    }

    #[test]
    fn quiet_hours_wrap_midnight() {
        let mut s = sub();
        s.quiet_start = Some(22);
        s.quiet_end = Some(6);
        assert!(s.is_snoozed(0, 23));
        assert!(s.is_snoozed(0, 5));
        assert!(!s.is_snoozed(0, 7));
    }

    #[test]
    fn snooze_until_takes_precedence() {
        let mut s = sub();
        s.snoozed_until = 100;
        assert!(s.is_snoozed(50, 12));
        assert!(!s.is_snoozed(150, 12));
    }

    #[test]
    fn recent_alerts_ring_evicts_oldest() {
        let mut s = Subscriber::new(1, 0, 2);
        for i in 0..5 {
            s.push_recent_alert(RecentAlert {
                sig: i.to_string(),
                summary: String::new(),
                sent_at: i,
            });
        }
        assert_eq!(s.recent_alerts.len(), 2);
        assert_eq!(s.recent_alerts.front().unwrap().sig, "3");
    }
}
