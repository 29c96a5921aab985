//! Event decoder: turns a raw feed payload into a classified `SemanticEvent`.
//!
//! Input is modeled as an opaque `RawEvent` rather than a vendor-specific
//! struct, matching the alias-tolerant JSON reading the teacher's
//! `streaming_client.rs` does ad hoc (`update.data.get("pubkey")` and
//! friends) — generalized here into one alias-resolution helper instead of
//! one-off `.get()` calls scattered through the decoder.

use crate::core::types::{Mint, Timestamp};
use crate::models::{Confidence, SemanticEvent, SwapAmounts, SwapDirection};
use rust_decimal::Decimal;
use serde_json::Value;

pub enum RawEvent {
    Message(Value),
    InstructionBlob(Vec<u8>),
    Logs(Vec<String>),
}

/// Field-alias groups: the first alias present wins. Mirrors the
/// camelCase/snake_case/abbreviation tolerance the upstream APIs require.
fn lookup<'a>(obj: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|a| obj.get(*a))
}

fn as_str_field<'a>(obj: &'a Value, aliases: &[&str]) -> Option<&'a str> {
    lookup(obj, aliases).and_then(Value::as_str)
}

fn as_decimal_field(obj: &Value, aliases: &[&str]) -> Option<Decimal> {
    let v = lookup(obj, aliases)?;
    if let Some(s) = v.as_str() {
        s.parse().ok()
    } else if let Some(f) = v.as_f64() {
        Decimal::try_from(f).ok()
    } else {
        None
    }
}

/// Explicit-field label table: `(normalized label, variant constructor tag)`.
/// Matching is exact against this set after lowercasing and trimming — never
/// substring — so `"unlock_liquidity"` is never mistaken for `"lock_liquidity"`.
const EXPLICIT_LABELS: &[(&str, &str)] = &[
    ("swap", "swap"),
    ("trade", "swap"),
    ("add_liquidity", "lp_add"),
    ("addliquidity", "lp_add"),
    ("deposit_liquidity", "lp_add"),
    ("remove_liquidity", "lp_remove"),
    ("removeliquidity", "lp_remove"),
    ("withdraw_liquidity", "lp_remove"),
    ("pool_init", "pool_init"),
    ("init_pool", "pool_init"),
    ("close_pool", "close_pool"),
    ("fees_distributed", "fees_distributed"),
    ("distribute_fees", "fees_distributed"),
    ("claim_rewards", "claim_rewards"),
    ("claim_holder_rewards", "claim_rewards"),
    ("claim_nft_rewards", "claim_rewards"),
    ("lock_liquidity", "lock_liquidity"),
    ("unlock_liquidity", "unlock_liquidity"),
    ("sync_stake", "sync_stake"),
    ("sync_holder_stake", "sync_stake"),
    ("protocol_fees", "protocol_fees"),
    ("claim_protocol_fees", "protocol_fees"),
    ("transfer_protocol_fees", "protocol_fees"),
];

const ADMIN_LABELS: &[&str] = &[
    "update_admin",
    "update_authorities",
    "update_fee_config",
    "set_pause",
    "set_pause_bits",
    "unpause_override",
];

const SETUP_LABELS: &[&str] = &[
    "create_bin_array",
    "init_oracle",
    "init_position_bin",
    "view_farming_position",
];

fn is_setup_label(label: &str) -> bool {
    SETUP_LABELS.contains(&label)
        || label.starts_with("init_")
            && (label.contains("global_state") || label.contains("user_") || label.contains("farming"))
}

/// 8-byte instruction discriminator -> variant tag.
const INSTRUCTION_DISCRIMINATORS: &[([u8; 8], &str)] = &[
    ([248, 198, 158, 145, 225, 117, 135, 200], "swap"),
    ([242, 35, 198, 137, 82, 225, 242, 182], "lp_add"),
    ([201, 4, 10, 180, 64, 155, 126, 159], "lp_add"),
    ([183, 18, 70, 156, 148, 109, 161, 34], "lp_remove"),
    ([95, 135, 192, 196, 242, 129, 230, 68], "lp_remove"),
    ([171, 61, 222, 109, 48, 116, 210, 30], "close_pool_position"),
    ([157, 231, 90, 216, 193, 2, 113, 97], "lock_liquidity"),
    ([148, 117, 141, 78, 77, 211, 189, 75], "unlock_liquidity"),
    ([95, 180, 10, 172, 84, 174, 232, 40], "pool_init"),
    ([139, 189, 247, 85, 191, 187, 48, 211], "close_pool"),
    ([219, 192, 234, 71, 190, 191, 102, 40], "lp_add"),
    ([77, 83, 33, 219, 55, 122, 227, 198], "protocol_fees"),
    ([94, 21, 173, 195, 162, 212, 156, 231], "protocol_fees"),
    ([44, 150, 194, 242, 40, 64, 213, 193], "claim_rewards"),
    ([98, 177, 159, 225, 186, 111, 17, 121], "claim_rewards"),
    ([57, 186, 253, 203, 13, 153, 94, 96], "sync_stake"),
    ([161, 87, 136, 62, 44, 48, 110, 49], "admin"),
    ([72, 35, 217, 107, 243, 54, 124, 237], "admin"),
    ([202, 92, 243, 222, 134, 8, 197, 31], "admin"),
    ([5, 223, 200, 113, 120, 90, 38, 60], "admin"),
    ([103, 6, 61, 66, 43, 44, 223, 172], "admin"),
    ([55, 144, 94, 100, 46, 67, 216, 193], "admin"),
    ([125, 116, 6, 226, 124, 246, 23, 219], "setup"),
    ([193, 132, 12, 135, 18, 164, 21, 88], "setup"),
    ([118, 103, 150, 36, 174, 245, 233, 21], "setup"),
];

/// 8-byte event (program-data log) discriminator -> variant tag.
const EVENT_DISCRIMINATORS: &[([u8; 8], &str)] = &[
    ([64, 198, 205, 232, 38, 8, 113, 226], "swap"),
    ([31, 94, 57, 102, 97, 239, 122, 246], "lp_add"),
    ([99, 41, 59, 8, 107, 233, 45, 163], "lp_remove"),
    ([160, 232, 103, 131, 79, 189, 120, 164], "lp_remove"),
    ([44, 215, 27, 15, 185, 205, 1, 233], "pool_init"),
    ([189, 164, 47, 106, 235, 134, 123, 16], "fees_distributed"),
    ([113, 98, 239, 208, 158, 22, 185, 28], "lock_liquidity"),
    ([228, 158, 90, 221, 135, 13, 201, 43], "claim_rewards"),
    ([240, 19, 84, 241, 96, 63, 218, 97], "sync_stake"),
    ([41, 231, 109, 200, 14, 13, 67, 122], "admin"),
    ([190, 72, 218, 9, 198, 33, 150, 213], "admin"),
    ([209, 57, 47, 184, 221, 61, 161, 2], "admin"),
    ([251, 9, 196, 174, 253, 187, 1, 84], "admin"),
    ([94, 196, 109, 162, 212, 165, 41, 209], "setup"),
    ([198, 214, 152, 33, 18, 9, 65, 35], "setup"),
    ([21, 97, 176, 171, 196, 212, 33, 87], "setup"),
];

fn lookup_discriminator(table: &[([u8; 8], &str)], prefix: &[u8]) -> Option<&'static str> {
    if prefix.len() < 8 {
        return None;
    }
    let mut key = [0u8; 8];
    key.copy_from_slice(&prefix[..8]);
    table.iter().find(|(d, _)| *d == key).map(|(_, tag)| *tag)
}

fn program_data_prefix(log: &str) -> Option<Vec<u8>> {
    let payload = log.strip_prefix("Program data: ")?;
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, payload.trim()).ok()
}

fn direction_from_mints(
    mint_in: &Mint,
    mint_out: &Mint,
    base: Option<&Mint>,
    quote: Option<&Mint>,
    primary_token: &Mint,
) -> Option<SwapDirection> {
    if let (Some(base), Some(quote)) = (base, quote) {
        if mint_in == quote && mint_out == base {
            return Some(SwapDirection::Buy);
        }
        if mint_in == base && mint_out == quote {
            return Some(SwapDirection::Sell);
        }
    }
    if mint_out == primary_token {
        return Some(SwapDirection::Buy);
    }
    if mint_in == primary_token {
        return Some(SwapDirection::Sell);
    }
    None
}

fn tag_to_event(
    tag: &str,
    obj: &Value,
    pool_id: String,
    sig: String,
    now: Timestamp,
    confidence: Confidence,
    primary_token: &Mint,
    pool_base: Option<&Mint>,
    pool_quote: Option<&Mint>,
) -> SemanticEvent {
    let wallet = as_str_field(obj, &["wallet", "owner", "user", "trader"]).map(str::to_string);
    let usd = as_decimal_field(obj, &["usdValue", "valueUsd", "value", "usd"]).unwrap_or(Decimal::ZERO);
    match tag {
        "swap" => {
            let mint_in = as_str_field(obj, &["mintIn", "inputMint", "in_mint"])
                .and_then(|s| Mint::parse(s).ok());
            let mint_out = as_str_field(obj, &["mintOut", "outputMint", "out_mint"])
                .and_then(|s| Mint::parse(s).ok());
            let amount_in = as_decimal_field(obj, &["amountIn", "amount_in"]).unwrap_or_default();
            let amount_out = as_decimal_field(obj, &["amountOut", "amount_out"]).unwrap_or_default();
            let decimals_in = as_decimal_field(obj, &["decimalsIn", "decimals_in"])
                .and_then(|d| d.try_into().ok())
                .unwrap_or(9u8);
            let decimals_out = as_decimal_field(obj, &["decimalsOut", "decimals_out"])
                .and_then(|d| d.try_into().ok())
                .unwrap_or(9u8);
            let direction = as_str_field(obj, &["side", "tradeType"])
                .and_then(|s| match s.to_lowercase().as_str() {
                    "buy" => Some(SwapDirection::Buy),
                    "sell" => Some(SwapDirection::Sell),
                    _ => None,
                })
                .or_else(|| match (&mint_in, &mint_out) {
                    (Some(i), Some(o)) => {
                        direction_from_mints(i, o, pool_base, pool_quote, primary_token)
                    }
                    _ => None,
                });
            SemanticEvent::Swap {
                direction,
                pool_id,
                usd,
                wallet,
                sig,
                amounts: SwapAmounts {
                    amount_in,
                    amount_out,
                    mint_in: mint_in.unwrap_or_else(|| primary_token.clone()),
                    mint_out: mint_out.unwrap_or_else(|| primary_token.clone()),
                    decimals_in,
                    decimals_out,
                },
                timestamp: now,
                confidence,
            }
        }
        "lp_add" => SemanticEvent::LpAdd {
            pool_id,
            usd,
            wallet,
            sig,
            timestamp: now,
            confidence,
        },
        "lp_remove" => SemanticEvent::LpRemove {
            pool_id,
            usd,
            wallet,
            sig,
            timestamp: now,
            confidence,
        },
        "pool_init" => SemanticEvent::PoolInit {
            pool_id,
            sig,
            timestamp: now,
            confidence,
        },
        "close_pool" | "close_pool_position" => SemanticEvent::ClosePool {
            pool_id,
            sig,
            timestamp: now,
            confidence,
        },
        "fees_distributed" => SemanticEvent::FeesDistributed {
            pool_id: Some(pool_id),
            sig,
            timestamp: now,
            confidence,
        },
        "claim_rewards" => SemanticEvent::ClaimRewards {
            pool_id: Some(pool_id),
            wallet,
            sig,
            timestamp: now,
            confidence,
        },
        "lock_liquidity" => SemanticEvent::LockLiquidity {
            pool_id,
            wallet,
            sig,
            timestamp: now,
            confidence,
        },
        "unlock_liquidity" => SemanticEvent::UnlockLiquidity {
            pool_id,
            wallet,
            sig,
            timestamp: now,
            confidence,
        },
        "sync_stake" => SemanticEvent::SyncStake {
            sig,
            timestamp: now,
            confidence,
        },
        "protocol_fees" => SemanticEvent::ProtocolFees {
            pool_id: Some(pool_id),
            sig,
            timestamp: now,
            confidence,
        },
        "admin" => SemanticEvent::Admin {
            pool_id: Some(pool_id),
            event_name: as_str_field(obj, &["type", "event_name", "action", "instruction_name"])
                .unwrap_or("unknown")
                .to_string(),
            sig,
            timestamp: now,
            confidence,
        },
        "setup" => SemanticEvent::Setup {
            sig,
            timestamp: now,
            confidence,
        },
        _ => SemanticEvent::Unknown,
    }
}

pub struct DecodeContext<'a> {
    pub primary_token: &'a Mint,
    pub pool_base: Option<&'a Mint>,
    pub pool_quote: Option<&'a Mint>,
    pub pool_id: String,
    pub sig: String,
    pub now: Timestamp,
}

/// Classifies a raw event via the five-stage cascade: explicit label,
/// instruction discriminator, event-log discriminator, field heuristics,
/// trade-side tag.
pub fn decode(raw: &RawEvent, ctx: &DecodeContext) -> SemanticEvent {
    match raw {
        RawEvent::Message(obj) => decode_message(obj, ctx),
        RawEvent::InstructionBlob(bytes) => {
            match lookup_discriminator(INSTRUCTION_DISCRIMINATORS, bytes) {
                Some(tag) => tag_to_event(
                    tag,
                    &Value::Null,
                    ctx.pool_id.clone(),
                    ctx.sig.clone(),
                    ctx.now,
                    Confidence::High,
                    ctx.primary_token,
                    ctx.pool_base,
                    ctx.pool_quote,
                ),
                None => SemanticEvent::Unknown,
            }
        }
        RawEvent::Logs(lines) => {
            for line in lines {
                if let Some(bytes) = program_data_prefix(line) {
                    if let Some(tag) = lookup_discriminator(EVENT_DISCRIMINATORS, &bytes) {
                        return tag_to_event(
                            tag,
                            &Value::Null,
                            ctx.pool_id.clone(),
                            ctx.sig.clone(),
                            ctx.now,
                            Confidence::High,
                            ctx.primary_token,
                            ctx.pool_base,
                            ctx.pool_quote,
                        );
                    }
                }
            }
            SemanticEvent::Unknown
        }
    }
}

fn decode_message(obj: &Value, ctx: &DecodeContext) -> SemanticEvent {
    // Stage 1: explicit label, exact match only.
    if let Some(label) = as_str_field(obj, &["type", "event_name", "action", "instruction_name"]) {
        let normalized = label.trim().to_lowercase();
        if let Some((_, tag)) = EXPLICIT_LABELS.iter().find(|(l, _)| *l == normalized) {
            return tag_to_event(
                tag,
                obj,
                ctx.pool_id.clone(),
                ctx.sig.clone(),
                ctx.now,
                Confidence::High,
                ctx.primary_token,
                ctx.pool_base,
                ctx.pool_quote,
            );
        }
        if ADMIN_LABELS.contains(&normalized.as_str()) {
            return tag_to_event(
                "admin",
                obj,
                ctx.pool_id.clone(),
                ctx.sig.clone(),
                ctx.now,
                Confidence::High,
                ctx.primary_token,
                ctx.pool_base,
                ctx.pool_quote,
            );
        }
        if is_setup_label(&normalized) {
            return tag_to_event(
                "setup",
                obj,
                ctx.pool_id.clone(),
                ctx.sig.clone(),
                ctx.now,
                Confidence::High,
                ctx.primary_token,
                ctx.pool_base,
                ctx.pool_quote,
            );
        }
    }

    // Stage 2: instruction discriminator.
    if let Some(data) = as_str_field(obj, &["instructionData", "instruction_data", "data"]) {
        if let Ok(bytes) = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data)
            .or_else(|_| bs58::decode(data).into_vec())
        {
            if let Some(tag) = lookup_discriminator(INSTRUCTION_DISCRIMINATORS, &bytes) {
                return tag_to_event(
                    tag,
                    obj,
                    ctx.pool_id.clone(),
                    ctx.sig.clone(),
                    ctx.now,
                    Confidence::High,
                    ctx.primary_token,
                    ctx.pool_base,
                    ctx.pool_quote,
                );
            }
        }
    }

    // Stage 3: event-log discriminator.
    if let Some(Value::Array(lines)) = lookup(obj, &["logs", "logMessages"]) {
        for line in lines.iter().filter_map(Value::as_str) {
            if let Some(bytes) = program_data_prefix(line) {
                if let Some(tag) = lookup_discriminator(EVENT_DISCRIMINATORS, &bytes) {
                    return tag_to_event(
                        tag,
                        obj,
                        ctx.pool_id.clone(),
                        ctx.sig.clone(),
                        ctx.now,
                        Confidence::High,
                        ctx.primary_token,
                        ctx.pool_base,
                        ctx.pool_quote,
                    );
                }
            }
        }
    }

    // Stage 4: heuristics.
    if as_decimal_field(obj, &["sharesMinted", "shares_minted"]).is_some() {
        return tag_to_event(
            "lp_add",
            obj,
            ctx.pool_id.clone(),
            ctx.sig.clone(),
            ctx.now,
            Confidence::Medium,
            ctx.primary_token,
            ctx.pool_base,
            ctx.pool_quote,
        );
    }
    if as_decimal_field(obj, &["sharesBurned", "shares_burned"]).is_some() {
        return tag_to_event(
            "lp_remove",
            obj,
            ctx.pool_id.clone(),
            ctx.sig.clone(),
            ctx.now,
            Confidence::Medium,
            ctx.primary_token,
            ctx.pool_base,
            ctx.pool_quote,
        );
    }
    let has_swap_amounts = as_decimal_field(obj, &["amountIn", "amount_in"]).is_some()
        && as_decimal_field(obj, &["amountOut", "amount_out"]).is_some();
    let distinct_mints = match (
        as_str_field(obj, &["mintIn", "inputMint", "in_mint"]),
        as_str_field(obj, &["mintOut", "outputMint", "out_mint"]),
    ) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    };
    if has_swap_amounts && distinct_mints {
        return tag_to_event(
            "swap",
            obj,
            ctx.pool_id.clone(),
            ctx.sig.clone(),
            ctx.now,
            Confidence::Medium,
            ctx.primary_token,
            ctx.pool_base,
            ctx.pool_quote,
        );
    }
    let has_base_and_quote = as_decimal_field(obj, &["baseAmount", "base_amount"]).is_some()
        && as_decimal_field(obj, &["quoteAmount", "quote_amount"]).is_some();
    if has_base_and_quote {
        let outflow = lookup(obj, &["isWithdrawal", "outflow", "is_remove"])
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let tag = if outflow { "lp_remove" } else { "lp_add" };
        return tag_to_event(
            tag,
            obj,
            ctx.pool_id.clone(),
            ctx.sig.clone(),
            ctx.now,
            Confidence::Medium,
            ctx.primary_token,
            ctx.pool_base,
            ctx.pool_quote,
        );
    }

    // Stage 5: trade-side tag only.
    if let Some(side) = as_str_field(obj, &["side", "tradeType"]) {
        if matches!(side.to_lowercase().as_str(), "buy" | "sell") {
            return tag_to_event(
                "swap",
                obj,
                ctx.pool_id.clone(),
                ctx.sig.clone(),
                ctx.now,
                Confidence::Low,
                ctx.primary_token,
                ctx.pool_base,
                ctx.pool_quote,
            );
        }
    }

    SemanticEvent::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn primary() -> Mint {
        Mint::from("So11111111111111111111111111111111111111112".to_string())
    }

    fn ctx<'a>(primary: &'a Mint) -> DecodeContext<'a> {
        DecodeContext {
            primary_token: primary,
            pool_base: None,
            pool_quote: None,
            pool_id: "P1".to_string(),
            sig: "sig1".to_string(),
            now: 1000,
        }
    }

    #[test]
    fn explicit_label_is_exact_match_not_substring() {
        let primary = primary();
        let c = ctx(&primary);
        let payload = json!({"type": "unlock_liquidity"});
        let event = decode_message(&payload, &c);
        assert!(matches!(event, SemanticEvent::UnlockLiquidity { .. }));
    }

    #[test]
    fn instruction_discriminator_classifies_swap() {
        let primary = primary();
        let c = ctx(&primary);
        let bytes = vec![248u8, 198, 158, 145, 225, 117, 135, 200, 0, 0];
        let event = decode(&RawEvent::InstructionBlob(bytes), &c);
        assert!(matches!(event, SemanticEvent::Swap { confidence: Confidence::High, .. }));
    }

    #[test]
    fn unknown_discriminator_yields_unknown() {
        let primary = primary();
        let c = ctx(&primary);
        let bytes = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let event = decode(&RawEvent::InstructionBlob(bytes), &c);
        assert!(event.is_unknown());
    }

    #[test]
    fn shares_minted_heuristic_is_medium_confidence_lp_add() {
        let primary = primary();
        let c = ctx(&primary);
        let payload = json!({"sharesMinted": "100"});
        let event = decode_message(&payload, &c);
        match event {
            SemanticEvent::LpAdd { confidence, .. } => assert_eq!(confidence, Confidence::Medium),
            other => panic!("expected LpAdd, got {other:?}"),
        }
    }

    #[test]
    fn trade_side_only_is_low_confidence() {
        let primary = primary();
        let c = ctx(&primary);
        let payload = json!({"side": "buy"});
        let event = decode_message(&payload, &c);
        match event {
            SemanticEvent::Swap { confidence, direction, .. } => {
                assert_eq!(confidence, Confidence::Low);
                assert_eq!(direction, Some(SwapDirection::Buy));
            }
            other => panic!("expected Swap, got {other:?}"),
        }
    }
}
