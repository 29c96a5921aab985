use crate::core::types::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub sig: String,
    pub pool_id: String,
    pub timestamp: Timestamp,
    pub is_buy: bool,
    pub usd: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LpPosition {
    pub pool_id: String,
    pub mint: String,
    pub balance: Decimal,
    pub value_usd: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakedPosition {
    pub mint: String,
    pub amount: Decimal,
    pub value_usd: Decimal,
    pub original_stake_usd: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenHolding {
    pub mint: String,
    pub symbol: String,
    pub balance: Decimal,
    pub value_usd: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WalletBreakdown {
    pub sol_value_usd: Decimal,
    pub token_value_usd: Decimal,
    pub lp_value_usd: Decimal,
    pub staked_value_usd: Decimal,
    pub wallet_value_usd: Decimal,
    pub realized_pnl_usd: Decimal,
    pub unrealized_pnl_usd: Decimal,
    pub buy_count: u32,
    pub sell_count: u32,
}

/// A subscriber's portfolio, aggregated across up to 5 tracked wallets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub wallet_count: usize,
    pub sol_balance: Decimal,
    pub sol_value_usd: Decimal,
    pub token_value_usd: Decimal,
    pub lp_value_usd: Decimal,
    pub staked_value_usd: Decimal,
    pub total_value_usd: Decimal,
    pub tokens: Vec<TokenHolding>,
    pub lp_positions: Vec<LpPosition>,
    pub staked_positions: Vec<StakedPosition>,
    pub trades: Vec<TradeRecord>,
    pub trade_count: u32,
    pub buy_count: u32,
    pub sell_count: u32,
    pub total_volume_usd: Decimal,
    pub realized_pnl_usd: Decimal,
    pub unrealized_pnl_usd: Decimal,
    pub per_wallet: HashMap<String, WalletBreakdown>,
    pub last_sync: Timestamp,
}

impl PortfolioSnapshot {
    pub fn empty(now: Timestamp) -> Self {
        Self {
            wallet_count: 0,
            sol_balance: Decimal::ZERO,
            sol_value_usd: Decimal::ZERO,
            token_value_usd: Decimal::ZERO,
            lp_value_usd: Decimal::ZERO,
            staked_value_usd: Decimal::ZERO,
            total_value_usd: Decimal::ZERO,
            tokens: Vec::new(),
            lp_positions: Vec::new(),
            staked_positions: Vec::new(),
            trades: Vec::new(),
            trade_count: 0,
            buy_count: 0,
            sell_count: 0,
            total_volume_usd: Decimal::ZERO,
            realized_pnl_usd: Decimal::ZERO,
            unrealized_pnl_usd: Decimal::ZERO,
            per_wallet: HashMap::new(),
            last_sync: now,
        }
    }
}
