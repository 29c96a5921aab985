//! Ties the decoder, valuation, and fan-out matcher together for one raw
//! frame already past the seen-tx dedup check. The actual chat-bot
//! delivery is out of scope; a match only needs to reach
//! `NotificationSink` once a concrete front end exists on the other side
//! of that trait, so this stage logs what *would* be sent.

use crate::core::types::now as unix_now;
use crate::decoder::{self, DecodeContext, RawEvent};
use crate::fanout::{self, EventContext};
use crate::feeds::RawFrame;
use crate::models::SemanticEvent;
use crate::valuation::{self, TradeValuationInputs};
use crate::Core;
use chrono::{Timelike, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

fn extract_pool_id(value: &serde_json::Value) -> Option<String> {
    ["pool_id", "poolId", "pool", "market"]
        .iter()
        .find_map(|k| value.get(*k))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn extract_decimal(value: &serde_json::Value, aliases: &[&str]) -> Option<Decimal> {
    aliases.iter().find_map(|k| value.get(*k)).and_then(|v| {
        if let Some(s) = v.as_str() {
            s.parse().ok()
        } else {
            v.as_f64().and_then(|f| Decimal::try_from(f).ok())
        }
    })
}

/// Classifies, values, and evaluates fan-out matches for one frame.
/// Wallet-origin frames that don't resolve to a known pool are still
/// matched against `wallet_alerts`; everything else follows the
/// pool-scoped predicate table.
pub fn process_frame(core: &Arc<Core>, frame: RawFrame) {
    let pool_id = extract_pool_id(&frame.value);
    let pool = pool_id.as_deref().and_then(|id| core.pools.get(id));

    let ctx = DecodeContext {
        primary_token: &core.primary_token,
        pool_base: pool.as_ref().map(|p| &p.base),
        pool_quote: pool.as_ref().map(|p| &p.quote),
        pool_id: pool_id.clone().unwrap_or_default(),
        sig: frame.sig.clone(),
        now: unix_now(),
    };

    let mut event = decoder::decode(&RawEvent::Message(frame.value.clone()), &ctx);
    revalue(core, &mut event, &frame.value, pool.as_ref().map(|p| (&p.base, &p.quote)));

    if event.is_unknown() {
        debug!(sig = %frame.sig, "frame classified as unknown, dropping");
        return;
    }

    let pool_is_primary = pool.as_ref().map(|p| p.is_primary).unwrap_or(false);
    let utc_hour = Utc::now().hour() as u8;

    for mut entry in core.subscribers.iter_mut() {
        let subscriber = entry.value_mut();
        let wallet = event_wallet(&event);
        let wallet_is_tracked = wallet.map(|w| subscriber.wallet_subscriptions.contains(w)).unwrap_or(false);
        let pool_in_watchlist = pool_id.as_deref().map(|id| subscriber.watchlist.contains(id)).unwrap_or(false);
        let token_in_tracked = pool
            .as_ref()
            .map(|p| subscriber.tracked_tokens.contains(p.base.as_str()) || subscriber.tracked_tokens.contains(p.quote.as_str()))
            .unwrap_or(false);

        let event_ctx = EventContext {
            pool_is_primary,
            pool_in_watchlist,
            token_in_tracked_tokens: token_in_tracked,
            wallet_is_tracked,
            sig: &frame.sig,
        };

        if fanout::matches(subscriber, &event, &event_ctx, utc_hour) {
            info!(
                chat_id = subscriber.chat_id,
                sig = %frame.sig,
                pool_id = pool_id.as_deref().unwrap_or(""),
                "subscriber matched event"
            );
        }

        if let Some(w) = wallet {
            if wallet_is_tracked && fanout::matches_wallet_alert(subscriber, w) {
                info!(chat_id = subscriber.chat_id, sig = %frame.sig, wallet = w, "wallet alert matched");
            }
        }
    }
}

/// Assembles and logs the C11 daily digest for every `daily_digest`-enabled
/// subscriber, then rolls their daily counters over. Delivery through a
/// concrete `NotificationSink` is the chat front end's job, same as every
/// other alert this core classifies; this stage logs what the digest would
/// contain.
pub async fn broadcast_daily_digest(core: &Arc<Core>) {
    let today = unix_now();
    let mut digested = 0usize;
    for mut entry in core.subscribers.iter_mut() {
        let subscriber = entry.value_mut();
        if !subscriber.daily_digest || !subscriber.enabled || subscriber.blocked {
            continue;
        }
        let portfolio_value_usd = subscriber
            .portfolio_snapshot
            .as_ref()
            .map(|p| p.total_value_usd.to_string());
        info!(
            chat_id = subscriber.chat_id,
            notifications_sent = subscriber.daily_stats.notifications_sent,
            lifetime_notifications_sent = subscriber.lifetime_stats.notifications_sent,
            portfolio_value_usd = portfolio_value_usd.as_deref().unwrap_or("n/a"),
            "daily digest assembled"
        );
        subscriber.daily_stats.day = Some(today);
        subscriber.daily_stats.notifications_sent = 0;
        digested += 1;
    }
    debug!(count = digested, "daily digest broadcast complete");
}

fn event_wallet(event: &SemanticEvent) -> Option<&str> {
    match event {
        SemanticEvent::Swap { wallet, .. }
        | SemanticEvent::LpAdd { wallet, .. }
        | SemanticEvent::LpRemove { wallet, .. }
        | SemanticEvent::ClaimRewards { wallet, .. }
        | SemanticEvent::LockLiquidity { wallet, .. }
        | SemanticEvent::UnlockLiquidity { wallet, .. } => wallet.as_deref(),
        _ => None,
    }
}

/// Replaces the decoder's provisional (often zero) `usd` field with a
/// resolver-backed valuation when the explicit field was absent. LP events
/// carry no parsed amounts in the decoded event, so the raw frame is
/// re-consulted for deposit/withdrawal sizes.
fn revalue(
    core: &Arc<Core>,
    event: &mut SemanticEvent,
    raw: &serde_json::Value,
    pool_mints: Option<(&crate::core::types::Mint, &crate::core::types::Mint)>,
) {
    let Some((base, quote)) = pool_mints else { return };
    let base_price = core.resolver.get_price(base);
    let quote_price = core.resolver.get_price(quote);

    match event {
        SemanticEvent::Swap { usd, amounts, .. } if *usd == Decimal::ZERO => {
            let inputs = TradeValuationInputs {
                explicit_usd: None,
                quote_amount: Some(amounts.amount_out),
                quote_decimals: amounts.decimals_out,
                quote_price_usd: quote_price,
                base_amount: Some(amounts.amount_in),
                base_decimals: amounts.decimals_in,
                base_price_usd: base_price,
                pool_spot_price_usd: base_price,
            };
            if let Some(resolved) = valuation::trade_usd(&inputs) {
                *usd = resolved;
            }
        }
        SemanticEvent::LpAdd { usd, .. } | SemanticEvent::LpRemove { usd, .. } if *usd == Decimal::ZERO => {
            let inputs = valuation::LpValuationInputs {
                explicit_usd: None,
                quote_amount: extract_decimal(raw, &["quoteAmount", "quote_amount"]),
                quote_decimals: 9,
                quote_price_usd: quote_price,
                base_amount: extract_decimal(raw, &["baseAmount", "base_amount"]),
                base_decimals: 9,
                base_price_usd: base_price,
            };
            if let Some(resolved) = valuation::lp_usd(&inputs) {
                *usd = resolved;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pool_id_extraction_checks_known_aliases() {
        assert_eq!(extract_pool_id(&json!({"pool_id": "P1"})), Some("P1".to_string()));
        assert_eq!(extract_pool_id(&json!({"pool": "P2"})), Some("P2".to_string()));
        assert_eq!(extract_pool_id(&json!({})), None);
    }
}
