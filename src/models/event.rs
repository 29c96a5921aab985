use crate::core::types::{Mint, Signature, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapAmounts {
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    pub mint_in: Mint,
    pub mint_out: Mint,
    pub decimals_in: u8,
    pub decimals_out: u8,
}

/// A classified on-chain event. `Unknown` carries no payload and matches no
/// subscriber predicate — it is dropped by fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SemanticEvent {
    Swap {
        direction: Option<SwapDirection>,
        pool_id: String,
        usd: Decimal,
        wallet: Option<String>,
        sig: Signature,
        amounts: SwapAmounts,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    LpAdd {
        pool_id: String,
        usd: Decimal,
        wallet: Option<String>,
        sig: Signature,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    LpRemove {
        pool_id: String,
        usd: Decimal,
        wallet: Option<String>,
        sig: Signature,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    PoolInit {
        pool_id: String,
        sig: Signature,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    FeesDistributed {
        pool_id: Option<String>,
        sig: Signature,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    ClaimRewards {
        pool_id: Option<String>,
        wallet: Option<String>,
        sig: Signature,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    LockLiquidity {
        pool_id: String,
        wallet: Option<String>,
        sig: Signature,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    UnlockLiquidity {
        pool_id: String,
        wallet: Option<String>,
        sig: Signature,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    SyncStake {
        sig: Signature,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    ClosePool {
        pool_id: String,
        sig: Signature,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    ProtocolFees {
        pool_id: Option<String>,
        sig: Signature,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    Admin {
        pool_id: Option<String>,
        event_name: String,
        sig: Signature,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    Setup {
        sig: Signature,
        timestamp: Timestamp,
        confidence: Confidence,
    },
    Unknown,
}

impl SemanticEvent {
    pub fn sig(&self) -> Option<&str> {
        match self {
            SemanticEvent::Swap { sig, .. }
            | SemanticEvent::LpAdd { sig, .. }
            | SemanticEvent::LpRemove { sig, .. }
            | SemanticEvent::PoolInit { sig, .. }
            | SemanticEvent::FeesDistributed { sig, .. }
            | SemanticEvent::ClaimRewards { sig, .. }
            | SemanticEvent::LockLiquidity { sig, .. }
            | SemanticEvent::UnlockLiquidity { sig, .. }
            | SemanticEvent::SyncStake { sig, .. }
            | SemanticEvent::ClosePool { sig, .. }
            | SemanticEvent::ProtocolFees { sig, .. }
            | SemanticEvent::Admin { sig, .. }
            | SemanticEvent::Setup { sig, .. } => Some(sig),
            SemanticEvent::Unknown => None,
        }
    }

    pub fn pool_id(&self) -> Option<&str> {
        match self {
            SemanticEvent::Swap { pool_id, .. }
            | SemanticEvent::LpAdd { pool_id, .. }
            | SemanticEvent::LpRemove { pool_id, .. }
            | SemanticEvent::PoolInit { pool_id, .. }
            | SemanticEvent::LockLiquidity { pool_id, .. }
            | SemanticEvent::UnlockLiquidity { pool_id, .. }
            | SemanticEvent::ClosePool { pool_id, .. } => Some(pool_id),
            SemanticEvent::FeesDistributed { pool_id, .. }
            | SemanticEvent::ClaimRewards { pool_id, .. }
            | SemanticEvent::ProtocolFees { pool_id, .. }
            | SemanticEvent::Admin { pool_id, .. } => pool_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, SemanticEvent::Unknown)
    }
}
