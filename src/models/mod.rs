//! Domain data model: pools, token metadata, prices, semantic events,
//! subscribers and portfolio snapshots.

mod event;
mod pool;
mod portfolio;
mod subscriber;
mod token;

pub use event::{Confidence, SemanticEvent, SwapAmounts, SwapDirection};
pub use pool::Pool;
pub use portfolio::{LpPosition, PortfolioSnapshot, StakedPosition, TradeRecord, WalletBreakdown};
pub use subscriber::Subscriber;
pub use token::{ApiHealth, ApiStatus, PriceEntry, TokenMeta, TokenMetaSource};
