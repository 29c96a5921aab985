//! Portfolio aggregation engine: assembles a subscriber's portfolio across
//! up to 5 wallets, coalescing concurrent sync requests per `chat_id`.

use crate::cache::BoundedCache;
use crate::config::PortfolioConfig;
use crate::core::types::now;
use crate::models::{
    LpPosition, PortfolioSnapshot, StakedPosition, TokenHolding, TradeRecord, WalletBreakdown,
};
use dashmap::DashMap;
use futures::future::Shared;
use futures::FutureExt;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// One wallet's raw sub-fetch results, gathered in parallel by whatever
/// upstream client implements `WalletDataSource`.
pub struct WalletData {
    pub sol_balance: Decimal,
    pub sol_value_usd: Decimal,
    pub tokens: Vec<TokenHolding>,
    pub trades: Vec<TradeRecord>,
    pub lp_positions: Vec<LpPosition>,
    pub staked_positions: Vec<StakedPosition>,
    pub aggregator_realized_pnl_usd: Option<Decimal>,
    pub aggregator_unrealized_pnl_usd: Option<Decimal>,
}

#[async_trait::async_trait]
pub trait WalletDataSource: Send + Sync {
    async fn fetch_balances(&self, wallet: &str) -> anyhow::Result<(Decimal, Decimal, Vec<TokenHolding>)>;
    async fn fetch_trades(&self, wallet: &str) -> anyhow::Result<Vec<TradeRecord>>;
    async fn fetch_lp_positions(&self, wallet: &str) -> anyhow::Result<Vec<LpPosition>>;
    async fn fetch_aggregator_pnl(&self, wallet: &str) -> anyhow::Result<(Option<Decimal>, Option<Decimal>)>;
    async fn fetch_staked_positions(&self, wallet: &str) -> anyhow::Result<Vec<StakedPosition>>;
}

type SharedSnapshot = Shared<Pin<Box<dyn std::future::Future<Output = Option<Arc<PortfolioSnapshot>>> + Send>>>;

/// Assembles and caches portfolio snapshots, deduplicating concurrent
/// `sync` calls for the same `chat_id` via an in-flight future map.
pub struct PortfolioEngine {
    config: PortfolioConfig,
    balance_cache: BoundedCache<String, (Decimal, Decimal, Vec<TokenHolding>)>,
    staked_cache: BoundedCache<String, Vec<StakedPosition>>,
    in_flight: DashMap<i64, SharedSnapshot>,
}

impl PortfolioEngine {
    pub fn new(config: PortfolioConfig) -> Self {
        let balance_cache = BoundedCache::new(10_000, Duration::from_secs(config.balance_cache_secs));
        let staked_cache = BoundedCache::new(10_000, Duration::from_secs(config.staked_cache_secs));
        Self {
            config,
            balance_cache,
            staked_cache,
            in_flight: DashMap::new(),
        }
    }

    /// Runs (or joins an in-progress) sync for `chat_id` across `wallets`.
    /// Returns `None` if the wallet set is empty.
    #[instrument(skip(self, source, wallets))]
    pub async fn sync(
        self: &Arc<Self>,
        chat_id: i64,
        wallets: Vec<String>,
        source: Arc<dyn WalletDataSource>,
    ) -> Option<Arc<PortfolioSnapshot>> {
        if wallets.is_empty() {
            return None;
        }
        if let Some(existing) = self.in_flight.get(&chat_id) {
            return existing.clone().await;
        }

        let fut: Pin<Box<dyn std::future::Future<Output = Option<Arc<PortfolioSnapshot>>> + Send>> = {
            let wallets = wallets.clone();
            let max_wallets = self.config.max_portfolio_wallets;
            let engine = Arc::clone(self);
            Box::pin(async move {
                let wallets: Vec<String> = wallets.into_iter().take(max_wallets).collect();
                let per_wallet = futures::future::join_all(
                    wallets.iter().map(|w| engine.assemble_wallet(source.as_ref(), w)),
                )
                .await;
                Some(Arc::new(Self::aggregate(per_wallet)))
            })
        };
        let shared = fut.shared();
        self.in_flight.insert(chat_id, shared.clone());
        let result = shared.await;
        self.in_flight.remove(&chat_id);
        result
    }

    /// Gathers the five per-wallet sub-fetches in parallel; staked
    /// positions are consulted from the 10-min cache first since they
    /// change far less often than balances or trades.
    async fn assemble_wallet(&self, source: &dyn WalletDataSource, wallet: &str) -> (String, WalletData) {
        let (balances, trades, lp_positions, pnl, staked_positions) = futures::join!(
            source.fetch_balances(wallet),
            source.fetch_trades(wallet),
            source.fetch_lp_positions(wallet),
            source.fetch_aggregator_pnl(wallet),
            self.fetch_staked(source, wallet),
        );
        let (sol_balance, sol_value_usd, tokens) = balances.unwrap_or((Decimal::ZERO, Decimal::ZERO, Vec::new()));
        let trades = trades.unwrap_or_default();
        let lp_positions = lp_positions.unwrap_or_default();
        let (realized, unrealized) = pnl.unwrap_or((None, None));
        (
            wallet.to_string(),
            WalletData {
                sol_balance,
                sol_value_usd,
                tokens,
                trades,
                lp_positions,
                staked_positions,
                aggregator_realized_pnl_usd: realized,
                aggregator_unrealized_pnl_usd: unrealized,
            },
        )
    }

    /// Cached per-wallet staked-position lookup. A fetch failure yields an
    /// empty set rather than stale data, matching the other sub-fetches.
    async fn fetch_staked(&self, source: &dyn WalletDataSource, wallet: &str) -> Vec<StakedPosition> {
        if let Some(cached) = self.cached_staked(wallet) {
            return cached;
        }
        let positions = source.fetch_staked_positions(wallet).await.unwrap_or_default();
        self.cache_staked(wallet, positions.clone());
        positions
    }

    fn aggregate(per_wallet: Vec<(String, WalletData)>) -> PortfolioSnapshot {
        let mut snapshot = PortfolioSnapshot::empty(now());
        snapshot.wallet_count = per_wallet.len();
        let mut token_totals: HashMap<String, TokenHolding> = HashMap::new();
        let mut all_trades: Vec<TradeRecord> = Vec::new();
        let mut per_wallet_map = HashMap::new();

        for (wallet, data) in per_wallet {
            let token_value_usd: Decimal = data.tokens.iter().map(|t| t.value_usd).sum();
            let lp_value_usd: Decimal = data.lp_positions.iter().map(|p| p.value_usd).sum();
            let staked_value_usd: Decimal = data.staked_positions.iter().map(|p| p.value_usd).sum();
            let wallet_value_usd = data.sol_value_usd + token_value_usd + lp_value_usd + staked_value_usd;

            let (realized, buy_count, sell_count) = match data.aggregator_realized_pnl_usd {
                Some(pnl) => (pnl, count_buys(&data.trades), count_sells(&data.trades)),
                None => realized_pnl_cost_basis(&data.trades),
            };
            let unrealized = data.aggregator_unrealized_pnl_usd.unwrap_or(Decimal::ZERO);

            snapshot.sol_balance += data.sol_balance;
            snapshot.sol_value_usd += data.sol_value_usd;
            snapshot.token_value_usd += token_value_usd;
            snapshot.lp_value_usd += lp_value_usd;
            snapshot.staked_value_usd += staked_value_usd;
            snapshot.realized_pnl_usd += realized;
            snapshot.unrealized_pnl_usd += unrealized;
            snapshot.buy_count += buy_count;
            snapshot.sell_count += sell_count;
            snapshot.total_volume_usd += data.trades.iter().map(|t| t.usd).sum::<Decimal>();
            snapshot.lp_positions.extend(data.lp_positions);
            snapshot.staked_positions.extend(data.staked_positions);

            for token in &data.tokens {
                token_totals
                    .entry(token.mint.clone())
                    .and_modify(|t| {
                        t.balance += token.balance;
                        t.value_usd += token.value_usd;
                    })
                    .or_insert_with(|| token.clone());
            }

            per_wallet_map.insert(
                wallet,
                WalletBreakdown {
                    sol_value_usd: data.sol_value_usd,
                    token_value_usd,
                    lp_value_usd,
                    staked_value_usd,
                    wallet_value_usd,
                    realized_pnl_usd: realized,
                    unrealized_pnl_usd: unrealized,
                    buy_count,
                    sell_count,
                },
            );

            all_trades.extend(data.trades);
        }

        all_trades.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        snapshot.trade_count = all_trades.len() as u32;
        all_trades.truncate(100);
        snapshot.trades = all_trades;

        let mut tokens: Vec<TokenHolding> = token_totals.into_values().collect();
        tokens.sort_by(|a, b| b.value_usd.cmp(&a.value_usd));
        tokens.truncate(20);
        snapshot.tokens = tokens;

        snapshot.per_wallet = per_wallet_map;
        snapshot.total_value_usd =
            snapshot.sol_value_usd + snapshot.token_value_usd + snapshot.lp_value_usd + snapshot.staked_value_usd;
        snapshot
    }

    /// True if this subscriber is due for the scheduler's portfolio
    /// auto-sync job: active within the active window and stale past the
    /// configured interval.
    pub fn due_for_auto_sync(&self, last_active: i64, last_sync: i64) -> bool {
        let n = now();
        let active_recently = n - last_active < (self.config.active_window_ms / 1000) as i64;
        let stale = n - last_sync > (self.config.auto_sync_interval_ms / 1000) as i64;
        active_recently && stale
    }

    pub fn cached_balances(&self, wallet: &str) -> Option<(Decimal, Decimal, Vec<TokenHolding>)> {
        self.balance_cache.get(&wallet.to_string())
    }

    pub fn cache_balances(&self, wallet: &str, value: (Decimal, Decimal, Vec<TokenHolding>)) {
        self.balance_cache.insert(wallet.to_string(), value);
    }

    pub fn cached_staked(&self, wallet: &str) -> Option<Vec<StakedPosition>> {
        self.staked_cache.get(&wallet.to_string())
    }

    pub fn cache_staked(&self, wallet: &str, value: Vec<StakedPosition>) {
        self.staked_cache.insert(wallet.to_string(), value);
    }

    /// Sweeps expired entries from both per-wallet caches; driven by the
    /// scheduler's cache-pruning job.
    pub fn prune_caches(&self) {
        self.balance_cache.prune();
        self.staked_cache.prune();
    }
}

fn count_buys(trades: &[TradeRecord]) -> u32 {
    trades.iter().filter(|t| t.is_buy).count() as u32
}

fn count_sells(trades: &[TradeRecord]) -> u32 {
    trades.iter().filter(|t| !t.is_buy).count() as u32
}

/// Cost-basis realized PnL: trades are processed ascending by timestamp,
/// maintaining a per-pool cost basis that shrinks proportionally on partial
/// sells.
fn realized_pnl_cost_basis(trades: &[TradeRecord]) -> (Decimal, u32, u32) {
    let mut sorted: Vec<&TradeRecord> = trades.iter().collect();
    sorted.sort_by_key(|t| t.timestamp);

    struct PoolBasis {
        cost_basis: Decimal,
    }
    let mut by_pool: HashMap<String, PoolBasis> = HashMap::new();
    let mut realized = Decimal::ZERO;
    let mut buy_count = 0u32;
    let mut sell_count = 0u32;

    for trade in sorted {
        let entry = by_pool.entry(trade.pool_id.clone()).or_insert(PoolBasis {
            cost_basis: Decimal::ZERO,
        });
        if trade.is_buy {
            entry.cost_basis += trade.usd;
            buy_count += 1;
        } else {
            sell_count += 1;
            if entry.cost_basis > Decimal::ZERO {
                let p = (trade.usd / entry.cost_basis).min(Decimal::ONE);
                realized += trade.usd - entry.cost_basis * p;
                entry.cost_basis -= entry.cost_basis * p;
            } else {
                realized += trade.usd;
            }
        }
    }
    (realized, buy_count, sell_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(pool: &str, ts: i64, is_buy: bool, usd: i64) -> TradeRecord {
        TradeRecord {
            sig: format!("sig{ts}"),
            pool_id: pool.to_string(),
            timestamp: ts,
            is_buy,
            usd: Decimal::from(usd),
        }
    }

    #[test]
    fn pnl_cost_basis_pins_exact_number() {
        // Two buys of 100 build a 200 cost basis. The 150 sell doesn't
        // exceed the basis so it realizes nothing and leaves a 50 basis;
        // the 100 sell exceeds that remaining basis by 50, which is the
        // only profit realized across both sells.
        let trades = vec![
            trade("P1", 1, true, 100),
            trade("P1", 2, true, 100),
            trade("P1", 3, false, 150),
            trade("P1", 4, false, 100),
        ];
        let (realized, buys, sells) = realized_pnl_cost_basis(&trades);
        assert_eq!(buys, 2);
        assert_eq!(sells, 2);
        assert_eq!(realized, Decimal::from(50));
    }

    #[test]
    fn sell_with_zero_cost_basis_is_pure_profit() {
        let trades = vec![trade("P1", 1, false, 50)];
        let (realized, _, _) = realized_pnl_cost_basis(&trades);
        assert_eq!(realized, Decimal::from(50));
    }

    struct FakeSource;

    #[async_trait::async_trait]
    impl WalletDataSource for FakeSource {
        async fn fetch_balances(&self, _wallet: &str) -> anyhow::Result<(Decimal, Decimal, Vec<TokenHolding>)> {
            Ok((Decimal::ZERO, Decimal::from(10), Vec::new()))
        }
        async fn fetch_trades(&self, _wallet: &str) -> anyhow::Result<Vec<TradeRecord>> {
            Ok(Vec::new())
        }
        async fn fetch_lp_positions(&self, _wallet: &str) -> anyhow::Result<Vec<LpPosition>> {
            Ok(Vec::new())
        }
        async fn fetch_aggregator_pnl(&self, _wallet: &str) -> anyhow::Result<(Option<Decimal>, Option<Decimal>)> {
            Ok((None, None))
        }
        async fn fetch_staked_positions(&self, _wallet: &str) -> anyhow::Result<Vec<StakedPosition>> {
            Ok(vec![StakedPosition {
                mint: "StakeMint".to_string(),
                amount: Decimal::from(5),
                value_usd: Decimal::from(25),
                original_stake_usd: None,
            }])
        }
    }

    fn test_config() -> PortfolioConfig {
        PortfolioConfig {
            max_portfolio_wallets: 5,
            auto_sync_interval_ms: 60_000,
            active_window_ms: 3_600_000,
            balance_cache_secs: 600,
            staked_cache_secs: 600,
            top_tokens: 20,
            top_trades: 100,
        }
    }

    #[tokio::test]
    async fn sync_folds_staked_value_into_total() {
        let engine = Arc::new(PortfolioEngine::new(test_config()));
        let snapshot = engine
            .sync(1, vec!["wallet1".to_string()], Arc::new(FakeSource))
            .await
            .expect("non-empty wallet set returns a snapshot");
        assert_eq!(snapshot.staked_value_usd, Decimal::from(25));
        assert_eq!(snapshot.total_value_usd, Decimal::from(35));
        assert_eq!(snapshot.staked_positions.len(), 1);
    }

    #[tokio::test]
    async fn sync_returns_none_for_empty_wallet_set() {
        let engine = Arc::new(PortfolioEngine::new(test_config()));
        assert!(engine.sync(1, Vec::new(), Arc::new(FakeSource)).await.is_none());
    }
}
