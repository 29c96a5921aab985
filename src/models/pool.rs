use crate::core::types::{Mint, Timestamp};
use serde::{Deserialize, Serialize};

/// A DEX pool as published by the pool registry. Pools are never mutated in
/// place; a replacement snapshot is published atomically on refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub base: Mint,
    pub quote: Mint,
    pub pair_name: String,
    pub is_primary: bool,
    pub created_at: Option<Timestamp>,
    pub tvl: Option<f64>,
    pub volume_usd_24h: Option<f64>,
    pub fee_bps: Option<u32>,
    pub protocol_fee_bps: Option<u32>,
    /// The mint representing a liquidity share of this pool, when the
    /// upstream pool record exposes one.
    pub lp_mint: Option<Mint>,
}

impl Pool {
    pub fn new(id: String, base: Mint, quote: Mint, primary_token: &Mint) -> Self {
        let pair_name = format!("{}/{}", base.short(), quote.short());
        let is_primary = &base == primary_token || &quote == primary_token;
        Self {
            id,
            base,
            quote,
            pair_name,
            is_primary,
            created_at: None,
            tvl: None,
            volume_usd_24h: None,
            fee_bps: None,
            protocol_fee_bps: None,
            lp_mint: None,
        }
    }

    pub fn contains_mint(&self, mint: &Mint) -> bool {
        &self.base == mint || &self.quote == mint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_primary_when_either_side_matches() {
        let primary = Mint::from("So11111111111111111111111111111111111111112".to_string());
        let other = Mint::from("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB".to_string());
        let pool = Pool::new("P1".to_string(), primary.clone(), other, &primary);
        assert!(pool.is_primary);
    }

    #[test]
    fn contains_mint_checks_both_sides() {
        let base = Mint::from("So11111111111111111111111111111111111111112".to_string());
        let quote = Mint::from("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB".to_string());
        let other = Mint::from("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string());
        let pool = Pool::new("P1".to_string(), base.clone(), quote.clone(), &base);
        assert!(pool.contains_mint(&base));
        assert!(pool.contains_mint(&quote));
        assert!(!pool.contains_mint(&other));
    }
}
