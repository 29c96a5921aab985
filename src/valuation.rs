//! USD valuation for trades, LP events, and wallet transactions, with
//! fallback chains per source.

use rust_decimal::Decimal;

const SANITY_CAP_USD: i64 = 100_000_000;

fn pow10(decimals: u8) -> Decimal {
    let mut d = Decimal::ONE;
    for _ in 0..decimals {
        d *= Decimal::from(10);
    }
    d
}

fn sane(usd: Decimal) -> bool {
    usd >= Decimal::ZERO && usd <= Decimal::from(SANITY_CAP_USD)
}

pub struct TradeValuationInputs {
    pub explicit_usd: Option<Decimal>,
    pub quote_amount: Option<Decimal>,
    pub quote_decimals: u8,
    pub quote_price_usd: Option<Decimal>,
    pub base_amount: Option<Decimal>,
    pub base_decimals: u8,
    pub base_price_usd: Option<Decimal>,
    pub pool_spot_price_usd: Option<Decimal>,
}

/// (a) explicit field, (b) quote-side, (c) base-side, (d) pool spot price.
/// Any computed value over the sanity cap falls through to the next tier.
pub fn trade_usd(inputs: &TradeValuationInputs) -> Option<Decimal> {
    if let Some(explicit) = inputs.explicit_usd {
        if sane(explicit) {
            return Some(explicit);
        }
    }
    if let (Some(amount), Some(price)) = (inputs.quote_amount, inputs.quote_price_usd) {
        let usd = (amount / pow10(inputs.quote_decimals)) * price;
        if sane(usd) {
            return Some(usd);
        }
    }
    if let (Some(amount), Some(price)) = (inputs.base_amount, inputs.base_price_usd) {
        let usd = (amount / pow10(inputs.base_decimals)) * price;
        if sane(usd) {
            return Some(usd);
        }
    }
    if let (Some(amount), Some(spot)) = (inputs.base_amount, inputs.pool_spot_price_usd) {
        let usd = (amount / pow10(inputs.base_decimals)) * spot;
        if sane(usd) {
            return Some(usd);
        }
    }
    None
}

pub struct LpValuationInputs {
    pub explicit_usd: Option<Decimal>,
    pub quote_amount: Option<Decimal>,
    pub quote_decimals: u8,
    pub quote_price_usd: Option<Decimal>,
    pub base_amount: Option<Decimal>,
    pub base_decimals: u8,
    pub base_price_usd: Option<Decimal>,
}

/// Explicit value if present; otherwise sums both sides when both are
/// known. Single-sided deposits are legal and valued on whichever side is
/// known — never blindly doubled.
pub fn lp_usd(inputs: &LpValuationInputs) -> Option<Decimal> {
    if let Some(explicit) = inputs.explicit_usd {
        if sane(explicit) {
            return Some(explicit);
        }
    }
    let quote_usd = match (inputs.quote_amount, inputs.quote_price_usd) {
        (Some(a), Some(p)) => Some((a / pow10(inputs.quote_decimals)) * p),
        _ => None,
    };
    let base_usd = match (inputs.base_amount, inputs.base_price_usd) {
        (Some(a), Some(p)) => Some((a / pow10(inputs.base_decimals)) * p),
        _ => None,
    };
    match (quote_usd, base_usd) {
        (Some(q), Some(b)) => Some(q + b),
        (Some(q), None) => Some(q),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// A wallet transfer, classified before valuation: a transfer that is one
/// side of a swap (both an outflow and an inflow observed for the same
/// signature) has its summed USD halved to approximate a single side; a
/// one-sided transfer (airdrop, plain transfer, fee payment) is valued at
/// its full summed USD.
pub fn wallet_tx_usd(summed_usd: Decimal, is_swap_side: bool) -> Decimal {
    if is_swap_side {
        summed_usd / Decimal::from(2)
    } else {
        summed_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_field_wins_when_sane() {
        let inputs = TradeValuationInputs {
            explicit_usd: Some(Decimal::from(50)),
            quote_amount: None,
            quote_decimals: 6,
            quote_price_usd: None,
            base_amount: None,
            base_decimals: 9,
            base_price_usd: None,
            pool_spot_price_usd: None,
        };
        assert_eq!(trade_usd(&inputs), Some(Decimal::from(50)));
    }

    #[test]
    fn falls_through_to_quote_side_when_explicit_insane() {
        let inputs = TradeValuationInputs {
            explicit_usd: Some(Decimal::from(999_999_999_i64)),
            quote_amount: Some(Decimal::from(1_000_000)),
            quote_decimals: 6,
            quote_price_usd: Some(Decimal::ONE),
            base_amount: None,
            base_decimals: 9,
            base_price_usd: None,
            pool_spot_price_usd: None,
        };
        assert_eq!(trade_usd(&inputs), Some(Decimal::ONE));
    }

    #[test]
    fn lp_single_sided_deposit_is_not_doubled() {
        let inputs = LpValuationInputs {
            explicit_usd: None,
            quote_amount: Some(Decimal::from(1_000_000)),
            quote_decimals: 6,
            quote_price_usd: Some(Decimal::ONE),
            base_amount: None,
            base_decimals: 9,
            base_price_usd: None,
        };
        assert_eq!(lp_usd(&inputs), Some(Decimal::ONE));
    }

    #[test]
    fn wallet_swap_side_is_halved() {
        assert_eq!(wallet_tx_usd(Decimal::from(100), true), Decimal::from(50));
        assert_eq!(wallet_tx_usd(Decimal::from(100), false), Decimal::from(100));
    }
}
