//! Subscriber filter evaluation and rate-limited fan-out.

use crate::config::FanOutConfig;
use crate::core::types::now;
use crate::models::{RecentAlert, SemanticEvent, Subscriber, SwapDirection};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{info, warn};

/// Outbound interface to the chat platform. The core does not know how
/// messages are rendered; `action_hints` are realized by the front end.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, chat_id: i64, message: &str, action_hints: &[&str]) -> SendResult;
}

pub enum SendResult {
    SentOk,
    RateLimited(Duration),
    BlockedUser,
    TransientError,
}

/// Extra per-event routing facts the registry/dedup layers already know and
/// fan-out otherwise has no access to.
pub struct EventContext<'a> {
    pub pool_is_primary: bool,
    pub pool_in_watchlist: bool,
    pub token_in_tracked_tokens: bool,
    pub wallet_is_tracked: bool,
    pub sig: &'a str,
}

/// Decides whether `subscriber` should receive `event`, per the per-event
/// predicate table in the fan-out spec.
pub fn matches(subscriber: &Subscriber, event: &SemanticEvent, ctx: &EventContext, utc_hour: u8) -> bool {
    if !subscriber.enabled || subscriber.blocked || subscriber.is_snoozed(now(), utc_hour) {
        return false;
    }
    match event {
        SemanticEvent::Swap { direction, usd, .. } => {
            let is_buy = matches!(direction, Some(SwapDirection::Buy));
            if ctx.pool_is_primary {
                let toggle = if is_buy { subscriber.primary_buys } else { subscriber.primary_sells };
                toggle && *usd >= subscriber.primary_trade_min
            } else {
                let tracked = ctx.wallet_is_tracked || ctx.pool_in_watchlist || ctx.token_in_tracked_tokens;
                let side_toggle = if is_buy { subscriber.other_buys } else { subscriber.other_sells };
                subscriber.track_other_pools && tracked && side_toggle && *usd >= subscriber.other_trade_min
            }
        }
        SemanticEvent::LpAdd { usd, .. } => {
            if ctx.pool_is_primary {
                subscriber.primary_lp_add && *usd >= subscriber.primary_trade_min
            } else {
                subscriber.track_other_pools && subscriber.other_lp_add && *usd >= subscriber.other_lp_min
            }
        }
        SemanticEvent::LpRemove { usd, .. } => {
            if ctx.pool_is_primary {
                subscriber.primary_lp_remove && *usd >= subscriber.primary_trade_min
            } else {
                subscriber.track_other_pools && subscriber.other_lp_remove && *usd >= subscriber.other_lp_min
            }
        }
        SemanticEvent::PoolInit { .. } => subscriber.new_pool_alerts,
        SemanticEvent::LockLiquidity { .. } | SemanticEvent::UnlockLiquidity { .. } => subscriber.lock_alerts,
        SemanticEvent::ClaimRewards { .. } => subscriber.reward_alerts,
        SemanticEvent::ClosePool { .. } => subscriber.close_pool_alerts,
        SemanticEvent::ProtocolFees { .. } => subscriber.protocol_fee_alerts,
        SemanticEvent::Admin { .. } => subscriber.admin_alerts,
        SemanticEvent::FeesDistributed { .. } | SemanticEvent::SyncStake { .. } | SemanticEvent::Setup { .. } => false,
        SemanticEvent::Unknown => false,
    }
}

/// Whether a wallet-scoped (non-pool) transaction should alert `subscriber`.
pub fn matches_wallet_alert(subscriber: &Subscriber, wallet: &str) -> bool {
    subscriber.enabled
        && !subscriber.blocked
        && subscriber.wallet_alerts
        && subscriber.wallet_subscriptions.contains(wallet)
}

/// Drives the actual send loop: pauses `send_batch_pause_ms` every
/// `send_batch_size` completed sends to respect the chat platform's
/// per-second ceiling, retries rate-limited recipients, and flips
/// `blocked`/`enabled` on a permanent-block signal.
pub async fn send_to_recipients(
    sink: &dyn NotificationSink,
    recipients: &mut [&mut Subscriber],
    sig: &str,
    message: &str,
    action_hints: &[&str],
    config: &FanOutConfig,
) {
    let mut completed = 0usize;
    for subscriber in recipients.iter_mut() {
        loop {
            match sink.send(subscriber.chat_id, message, action_hints).await {
                SendResult::SentOk => {
                    record_success(subscriber, sig, message);
                    completed += 1;
                    break;
                }
                SendResult::RateLimited(retry_after) => {
                    warn!(chat_id = subscriber.chat_id, ?retry_after, "sink rate limited, retrying");
                    tokio::time::sleep(retry_after).await;
                }
                SendResult::BlockedUser => {
                    info!(chat_id = subscriber.chat_id, "subscriber blocked the bot");
                    subscriber.blocked = true;
                    subscriber.enabled = false;
                    completed += 1;
                    break;
                }
                SendResult::TransientError => {
                    warn!(chat_id = subscriber.chat_id, "transient sink error, dropping this send");
                    completed += 1;
                    break;
                }
            }
        }
        if completed > 0 && completed % config.send_batch_size == 0 {
            tokio::time::sleep(Duration::from_millis(config.send_batch_pause_ms)).await;
        }
    }
}

fn record_success(subscriber: &mut Subscriber, sig: &str, message: &str) {
    let ts = now();
    subscriber.push_recent_alert(RecentAlert {
        sig: sig.to_string(),
        summary: message.chars().take(120).collect(),
        sent_at: ts,
    });
    subscriber.daily_stats.notifications_sent += 1;
    subscriber.lifetime_stats.notifications_sent += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, SwapAmounts};

    fn sub() -> Subscriber {
        let mut s = Subscriber::new(1, 0, 50);
        s.primary_buys = true;
        s.primary_trade_min = Decimal::ZERO;
        s
    }

    fn swap_event(usd: i64) -> SemanticEvent {
        SemanticEvent::Swap {
            direction: Some(SwapDirection::Buy),
            pool_id: "P1".to_string(),
            usd: Decimal::from(usd),
            wallet: None,
            sig: "sig1".to_string(),
            amounts: SwapAmounts {
                amount_in: Decimal::ZERO,
                amount_out: Decimal::ZERO,
                mint_in: crate::core::types::Mint::from("a".to_string()),
                mint_out: crate::core::types::Mint::from("b".to_string()),
                decimals_in: 9,
                decimals_out: 9,
            },
            timestamp: 0,
            confidence: Confidence::High,
        }
    }

    fn primary_ctx() -> EventContext<'static> {
        EventContext {
            pool_is_primary: true,
            pool_in_watchlist: false,
            token_in_tracked_tokens: false,
            wallet_is_tracked: false,
            sig: "sig1",
        }
    }

    #[test]
    fn blocked_subscriber_never_matches() {
        let mut s = sub();
        s.blocked = true;
        assert!(!matches(&s, &swap_event(10), &primary_ctx(), 12));
    }

    #[test]
    fn unknown_event_never_matches() {
        let s = sub();
        assert!(!matches(&s, &SemanticEvent::Unknown, &primary_ctx(), 12));
    }

    #[test]
    fn primary_buy_respects_threshold() {
        let mut s = sub();
        s.primary_trade_min = Decimal::from(5);
        assert!(!matches(&s, &swap_event(1), &primary_ctx(), 12));
        assert!(matches(&s, &swap_event(10), &primary_ctx(), 12));
    }

    #[test]
    fn other_pool_swap_requires_tracking_and_toggle() {
        let mut s = sub();
        s.track_other_pools = true;
        s.other_buys = true;
        let mut ctx = primary_ctx();
        ctx.pool_is_primary = false;
        assert!(!matches(&s, &swap_event(10), &ctx, 12), "not tracked, should not match");
        ctx.pool_in_watchlist = true;
        assert!(matches(&s, &swap_event(10), &ctx, 12));
    }

    struct CountingSink {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl NotificationSink for CountingSink {
        async fn send(&self, _chat_id: i64, _message: &str, _action_hints: &[&str]) -> SendResult {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            SendResult::SentOk
        }
    }

    #[tokio::test]
    async fn batch_pause_counts_completed_sends_not_raw_index() {
        // A recipient that retries through a rate-limit before succeeding
        // must still only count once toward the pause threshold, so the
        // pause cadence tracks completed outcomes rather than loop index.
        let sink = CountingSink { calls: std::sync::atomic::AtomicUsize::new(0) };
        let config = FanOutConfig {
            max_watchlist_items: 100,
            max_recent_alerts: 100,
            max_wallets_per_user: 5,
            send_batch_size: 2,
            send_batch_pause_ms: 1,
        };
        let mut subs: Vec<Subscriber> = (0..5).map(|i| Subscriber::new(i, 0, 50)).collect();
        let mut refs: Vec<&mut Subscriber> = subs.iter_mut().collect();
        send_to_recipients(&sink, &mut refs, "sig1", "msg", &[], &config).await;
        assert_eq!(sink.calls.load(std::sync::atomic::Ordering::Relaxed), 5);
        for s in &subs {
            assert_eq!(s.daily_stats.notifications_sent, 1);
        }
    }
}
