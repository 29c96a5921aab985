//! Cross-component scenarios: decode -> valuation -> fan-out match, dedup
//! isolation between the two feeds, and the backup poller's failure mode.

use dex_activity_tracker::core::types::Mint;
use dex_activity_tracker::decoder::{decode, DecodeContext, RawEvent};
use dex_activity_tracker::dedup::SeenTransactionStore;
use dex_activity_tracker::fanout::{matches, EventContext};
use dex_activity_tracker::models::{SemanticEvent, Subscriber};
use dex_activity_tracker::pools::{refresh_or_keep_previous, PoolRegistry};
use rust_decimal::Decimal;
use serde_json::json;

fn mint(s: &str) -> Mint {
    Mint::from(s.to_string())
}

fn primary_ctx<'a>(primary: &'a Mint, pool_id: &str, sig: &'a str) -> DecodeContext<'a> {
    DecodeContext {
        primary_token: primary,
        pool_base: None,
        pool_quote: None,
        pool_id: pool_id.to_string(),
        sig: sig.to_string(),
        now: 1_700_000_000,
    }
}

#[test]
fn explicit_label_swap_classifies_and_matches_primary_buy_subscriber() {
    let primary = mint("So11111111111111111111111111111111111111112");
    let ctx = primary_ctx(&primary, "P1", "sig-swap-1");

    let raw = RawEvent::Message(json!({
        "type": "swap",
        "mintIn": "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
        "mintOut": "So11111111111111111111111111111111111111112",
        "amountIn": "1000000",
        "amountOut": "500000000",
        "usdValue": "42.50",
        "wallet": "Wallet1111111111111111111111111111111111",
    }));

    let event = decode(&raw, &ctx);
    let usd = match &event {
        SemanticEvent::Swap { usd, direction, .. } => {
            assert_eq!(*direction, Some(dex_activity_tracker::models::SwapDirection::Buy));
            *usd
        }
        other => panic!("expected Swap, got {other:?}"),
    };
    assert_eq!(usd, Decimal::new(4250, 2));

    let mut sub = Subscriber::new(1, 0, 50);
    sub.primary_buys = true;
    sub.primary_trade_min = Decimal::from(10);

    let event_ctx = EventContext {
        pool_is_primary: true,
        pool_in_watchlist: false,
        token_in_tracked_tokens: false,
        wallet_is_tracked: false,
        sig: "sig-swap-1",
    };
    assert!(matches(&sub, &event, &event_ctx, 12));
}

#[test]
fn event_log_discriminator_falls_back_to_program_data_scan() {
    // lp_add event discriminator from EVENT_DISCRIMINATORS.
    let bytes: [u8; 8] = [31, 94, 57, 102, 97, 239, 122, 246];
    use base64::Engine;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    let logs = vec![
        "Program log: instruction: deposit".to_string(),
        format!("Program data: {encoded}"),
    ];

    let primary = mint("So11111111111111111111111111111111111111112");
    let ctx = primary_ctx(&primary, "P1", "sig-log-1");
    let event = decode(&RawEvent::Logs(logs), &ctx);
    assert!(matches!(event, SemanticEvent::LpAdd { .. }));
}

#[test]
fn unrecognized_frame_decodes_to_unknown_and_never_matches() {
    let primary = mint("So11111111111111111111111111111111111111112");
    let ctx = primary_ctx(&primary, "P1", "sig-unk-1");
    let event = decode(&RawEvent::Message(json!({"foo": "bar"})), &ctx);
    assert!(event.is_unknown());

    let sub = Subscriber::new(1, 0, 50);
    let event_ctx = EventContext {
        pool_is_primary: true,
        pool_in_watchlist: false,
        token_in_tracked_tokens: false,
        wallet_is_tracked: false,
        sig: "sig-unk-1",
    };
    assert!(!matches(&sub, &event, &event_ctx, 12));
}

#[test]
fn same_signature_on_both_feeds_is_deduped_independently() {
    let store = SeenTransactionStore::new(1000);
    assert!(store.dex.insert_if_new("shared-sig", 0));
    assert!(!store.dex.insert_if_new("shared-sig", 1));
    // The wallet feed set is disjoint: same signature still alerts once there.
    assert!(store.wallet.insert_if_new("shared-sig", 0));
    assert!(!store.wallet.insert_if_new("shared-sig", 1));
}

#[tokio::test]
async fn backup_poller_keeps_previous_snapshot_on_fetch_failure() {
    let primary = mint("So11111111111111111111111111111111111111112");
    let registry = PoolRegistry::new("DexProg111111111111111111111111111111111".to_string(), primary.clone());
    registry.publish(vec![(
        "P1".to_string(),
        primary.clone(),
        mint("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"),
    )]);

    refresh_or_keep_previous(&registry, || async { Err(anyhow::anyhow!("rpc timeout")) }).await;

    assert!(registry.get("P1").is_some(), "failed refresh must not clear the live snapshot");
}
