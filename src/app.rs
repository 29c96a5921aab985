//! Composition root. `Core::new` is the single place that constructs every
//! cache, registry, resolver, feed client, and scheduler handle and hands
//! out `Arc`s — no other module reaches for global mutable state.

use crate::config::TrackerConfig;
use crate::core::types::Mint;
use crate::dedup::SeenTransactionStore;
use crate::models::Subscriber;
use crate::portfolio::PortfolioEngine;
use crate::pools::PoolRegistry;
use crate::rate_limit::RateLimiters;
use crate::resolver::{self, PriceResolver};
use crate::store::{PostgresSubscriberStore, SubscriberStore};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

pub struct Core {
    pub config: TrackerConfig,
    pub primary_token: Mint,
    pub http: reqwest::Client,
    pub pools: Arc<PoolRegistry>,
    pub resolver: Arc<PriceResolver>,
    pub dedup: Arc<SeenTransactionStore>,
    pub portfolio: Arc<PortfolioEngine>,
    pub store: Arc<dyn SubscriberStore>,
    pub subscribers: DashMap<i64, Subscriber>,
}

impl Core {
    pub async fn new(config: TrackerConfig) -> anyhow::Result<Arc<Self>> {
        let primary_token = Mint::parse(&config.chain.primary_token_mint)?;
        let stable_mints = config
            .chain
            .stable_mints
            .iter()
            .map(|s| Mint::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        let http = reqwest::Client::builder().timeout(std::time::Duration::from_secs(15)).build()?;

        let limiters = Arc::new(RateLimiters::new());
        limiters.register(resolver::PROVIDER_SOLSCAN, 10);

        let pools = Arc::new(PoolRegistry::new(config.chain.dex_program_id.clone(), primary_token.clone()));

        let resolver = Arc::new(PriceResolver::new(
            config.resolver.clone(),
            stable_mints,
            primary_token.clone(),
            http.clone(),
            limiters.clone(),
        ));

        let dedup = Arc::new(SeenTransactionStore::new(config.resolver.max_cache_size));

        let portfolio = Arc::new(PortfolioEngine::new(config.portfolio.clone()));

        let store = PostgresSubscriberStore::new(&config.store.database_url, config.store.max_connections).await?;
        store.ensure_schema().await?;
        let store: Arc<dyn SubscriberStore> = Arc::new(store);

        let subscribers = DashMap::new();
        for sub in store.load_all().await? {
            subscribers.insert(sub.chat_id, sub);
        }
        info!(count = subscribers.len(), "loaded subscribers from durable store");

        Ok(Arc::new(Self {
            config,
            primary_token,
            http,
            pools,
            resolver,
            dedup,
            portfolio,
            store,
            subscribers,
        }))
    }

    pub fn tracked_wallets(&self) -> std::collections::HashSet<String> {
        self.subscribers
            .iter()
            .flat_map(|s| s.wallet_subscriptions.iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    pub fn pool_ids(&self) -> Vec<String> {
        self.pools.snapshot().by_id.keys().cloned().collect()
    }
}
