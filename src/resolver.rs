//! Multi-source token metadata & price resolution with provider-chain
//! failover and per-provider health tracking.

use crate::cache::BoundedCache;
use crate::config::ResolverConfig;
use crate::core::types::{now, Mint, Timestamp};
use crate::models::{ApiHealth, ApiStatus, PriceEntry, TokenMeta, TokenMetaSource};
use crate::rate_limit::{fetch_with_retry, FetchOptions, RateLimiters};
use dashmap::{DashMap, DashSet};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const PROVIDER_AGGREGATOR_A: &str = "aggregator_a";
pub const PROVIDER_AGGREGATOR_B: &str = "aggregator_b";
pub const PROVIDER_DEXSCREENER: &str = "dexscreener";
pub const PROVIDER_COINGECKO: &str = "coingecko";
pub const PROVIDER_SOLSCAN: &str = "solscan";
pub const PROVIDER_PROTOCOL_API: &str = "protocol_api";
pub const PROVIDER_ONCHAIN_METADATA: &str = "onchain_metadata";

#[derive(Deserialize)]
struct SimplePriceResponse {
    price_usd: Option<Decimal>,
}

/// Escapes a symbol for the chat platform's limited markdown dialect.
pub fn escape_markdown(symbol: &str) -> String {
    let mut out = String::with_capacity(symbol.len());
    for c in symbol.chars() {
        if matches!(c, '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|' | '{' | '}' | '.' | '!') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub struct PriceResolver {
    config: ResolverConfig,
    stable_mints: Vec<Mint>,
    primary_token: Mint,
    client: reqwest::Client,
    limiters: Arc<RateLimiters>,
    prices: BoundedCache<String, PriceEntry>,
    token_meta: BoundedCache<String, TokenMeta>,
    health: DashMap<String, ApiHealth>,
    in_flight_symbol_lookups: DashSet<String>,
}

impl PriceResolver {
    pub fn new(
        config: ResolverConfig,
        stable_mints: Vec<Mint>,
        primary_token: Mint,
        client: reqwest::Client,
        limiters: Arc<RateLimiters>,
    ) -> Self {
        limiters.register(PROVIDER_AGGREGATOR_A, config.aggregator_a_rate_per_sec);
        limiters.register(PROVIDER_AGGREGATOR_B, config.aggregator_b_rate_per_sec);
        limiters.register(PROVIDER_DEXSCREENER, config.aggregator_c_rate_per_sec);
        let cache_size = config.max_cache_size;
        Self {
            config,
            stable_mints,
            primary_token,
            client,
            limiters,
            prices: BoundedCache::new(cache_size, Duration::from_secs(3600)),
            token_meta: BoundedCache::new(cache_size, Duration::from_secs(u64::MAX / 2)),
            health: DashMap::new(),
            in_flight_symbol_lookups: DashSet::new(),
        }
    }

    fn is_stable(&self, mint: &Mint) -> bool {
        self.stable_mints.contains(mint)
    }

    pub fn get_price(&self, mint: &Mint) -> Option<Decimal> {
        if self.is_stable(mint) {
            return Some(Decimal::ONE);
        }
        let entry = self.prices.get(&mint.as_str().to_string())?;
        if entry.is_usable(now(), (self.config.price_refresh_ms / 1000) as i64) {
            Some(entry.price_usd)
        } else {
            None
        }
    }

    pub fn get_primary_token_price(&self) -> Option<Decimal> {
        self.get_price(&self.primary_token)
    }

    fn record_health(&self, provider: &str, ok: bool) {
        let mut entry = self.health.entry(provider.to_string()).or_insert_with(ApiHealth::default);
        if ok {
            entry.record_success(now());
        } else {
            entry.record_failure(now());
        }
    }

    pub fn health_snapshot(&self) -> Vec<(String, ApiHealth)> {
        self.health.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }

    /// Sweeps expired entries from both caches; driven by the scheduler's
    /// cache-pruning job. Capacity (including the token-meta cap) is
    /// already enforced on insert by `BoundedCache`, so this only reclaims
    /// entries past their TTL.
    pub fn prune_caches(&self) {
        self.prices.prune();
        self.token_meta.prune();
    }

    /// Bulk refresh cycle: aggregator A (batched) first, then per-mint
    /// fallbacks for anything it missed. Stops at first success per mint.
    pub async fn refresh_prices(&self, mints: Vec<Mint>) {
        let mut remaining: Vec<Mint> = mints.into_iter().filter(|m| !self.is_stable(m)).collect();

        self.limiters.acquire(PROVIDER_AGGREGATOR_A).await;
        match self.fetch_aggregator_a_batch(&remaining).await {
            Ok(found) => {
                self.record_health(PROVIDER_AGGREGATOR_A, true);
                for (mint, price) in found {
                    self.store_price(&mint, price, PROVIDER_AGGREGATOR_A);
                    remaining.retain(|m| m != &mint);
                }
            }
            Err(e) => {
                self.record_health(PROVIDER_AGGREGATOR_A, false);
                debug!(error = %e, "aggregator A batch refresh failed");
            }
        }

        for mint in remaining {
            if self.resolve_single_price(&mint).await.is_none() {
                warn!(mint = %mint, "no provider returned a usable price");
            }
        }
    }

    async fn resolve_single_price(&self, mint: &Mint) -> Option<Decimal> {
        for provider in [PROVIDER_DEXSCREENER, PROVIDER_AGGREGATOR_B, PROVIDER_COINGECKO] {
            self.limiters.acquire(provider).await;
            let result = self.fetch_single_price(provider, mint).await;
            match result {
                Ok(Some(price)) => {
                    self.record_health(provider, true);
                    self.store_price(mint, price, provider);
                    return Some(price);
                }
                Ok(None) => self.record_health(provider, true),
                Err(e) => {
                    self.record_health(provider, false);
                    debug!(provider, mint = %mint, error = %e, "price lookup failed");
                }
            }
        }
        None
    }

    fn store_price(&self, mint: &Mint, price: Decimal, source: &str) {
        self.prices.insert(
            mint.as_str().to_string(),
            PriceEntry {
                mint: mint.clone(),
                price_usd: price,
                updated_at: now(),
                source: source.to_string(),
            },
        );
    }

    async fn fetch_aggregator_a_batch(&self, mints: &[Mint]) -> anyhow::Result<Vec<(Mint, Decimal)>> {
        if mints.is_empty() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for chunk in mints.chunks(50) {
            let joined = chunk.iter().map(Mint::as_str).collect::<Vec<_>>().join(",");
            let url = format!("{}/prices?ids={}", self.config.aggregator_a_base, joined);
            let resp: std::collections::HashMap<String, SimplePriceResponse> =
                fetch_with_retry(&self.client, &url, &FetchOptions::default()).await?;
            for (mint_str, price_resp) in resp {
                if let (Ok(mint), Some(price)) = (Mint::parse(&mint_str), price_resp.price_usd) {
                    out.push((mint, price));
                }
            }
        }
        Ok(out)
    }

    async fn fetch_single_price(&self, provider: &str, mint: &Mint) -> anyhow::Result<Option<Decimal>> {
        let url = match provider {
            PROVIDER_DEXSCREENER => format!("{}/dex/tokens/{}", self.config.dexscreener_base, mint),
            PROVIDER_AGGREGATOR_B => {
                let key = self
                    .config
                    .aggregator_b_api_key
                    .as_deref()
                    .map(|k| format!("&api_key={k}"))
                    .unwrap_or_default();
                format!("{}/price?address={}{}", self.config.aggregator_b_base, mint, key)
            }
            PROVIDER_COINGECKO => format!(
                "{}/simple/price?ids=wrapped-solana&vs_currencies=usd",
                self.config.coingecko_base
            ),
            _ => return Ok(None),
        };
        let resp: SimplePriceResponse = fetch_with_retry(&self.client, &url, &FetchOptions::default()).await?;
        Ok(resp.price_usd)
    }

    /// Synchronously returns the cached symbol, or a short-form placeholder
    /// while scheduling an async lookup. Concurrent lookups for the same
    /// mint coalesce via `in_flight_symbol_lookups`.
    pub fn get_symbol(self: &Arc<Self>, mint: &Mint) -> String {
        if let Some(meta) = self.token_meta.get(&mint.as_str().to_string()) {
            return meta.symbol;
        }
        let key = mint.as_str().to_string();
        if self.in_flight_symbol_lookups.insert(key.clone()) {
            let resolver = Arc::clone(self);
            let mint = mint.clone();
            tokio::spawn(async move {
                resolver.resolve_symbol(&mint).await;
                resolver.in_flight_symbol_lookups.remove(mint.as_str());
            });
        }
        mint.short()
    }

    async fn resolve_symbol(&self, mint: &Mint) {
        for provider in [
            PROVIDER_PROTOCOL_API,
            PROVIDER_SOLSCAN,
            PROVIDER_DEXSCREENER,
            PROVIDER_ONCHAIN_METADATA,
        ] {
            if let Ok(Some(meta)) = self.fetch_symbol(provider, mint).await {
                if !meta.symbol.is_empty() {
                    self.token_meta.insert(mint.as_str().to_string(), meta);
                    return;
                }
            }
        }
    }

    async fn fetch_symbol(&self, provider: &str, mint: &Mint) -> anyhow::Result<Option<TokenMeta>> {
        #[derive(Deserialize)]
        struct MetaResponse {
            symbol: Option<String>,
            name: Option<String>,
            decimals: Option<u8>,
        }
        let url = match provider {
            PROVIDER_PROTOCOL_API => format!("{}/token/{}", self.config.protocol_api_base, mint),
            PROVIDER_SOLSCAN => format!("{}/token/meta?tokenAddress={}", self.config.solscan_base, mint),
            PROVIDER_DEXSCREENER => format!("{}/dex/tokens/{}", self.config.dexscreener_base, mint),
            PROVIDER_ONCHAIN_METADATA => format!("{}/metadata?mint={}", self.config.aggregator_a_base, mint),
            _ => return Ok(None),
        };
        let resp: MetaResponse = fetch_with_retry(&self.client, &url, &FetchOptions::default()).await?;
        let source = match provider {
            PROVIDER_PROTOCOL_API => TokenMetaSource::ProtocolApi,
            PROVIDER_SOLSCAN => TokenMetaSource::Aggregator,
            PROVIDER_DEXSCREENER => TokenMetaSource::DexScreener,
            PROVIDER_ONCHAIN_METADATA => TokenMetaSource::OnchainMetadata,
            _ => TokenMetaSource::Default,
        };
        Ok(resp.symbol.map(|symbol| TokenMeta {
            symbol,
            decimals: resp.decimals.unwrap_or(9),
            name: resp.name,
            source,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_mint_always_prices_at_one() {
        let stable = Mint::from("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string());
        let primary = Mint::from("So11111111111111111111111111111111111111112".to_string());
        let resolver = PriceResolver::new(
            ResolverConfig {
                price_refresh_ms: 300_000,
                protocol_api_base: String::new(),
                aggregator_a_base: String::new(),
                aggregator_b_base: String::new(),
                aggregator_b_api_key: None,
                dexscreener_base: String::new(),
                coingecko_base: String::new(),
                solscan_base: String::new(),
                aggregator_a_rate_per_sec: 50,
                aggregator_b_rate_per_sec: 30,
                aggregator_c_rate_per_sec: 10,
                max_cache_size: 100,
            },
            vec![stable.clone()],
            primary,
            reqwest::Client::new(),
            Arc::new(RateLimiters::new()),
        );
        assert_eq!(resolver.get_price(&stable), Some(Decimal::ONE));
    }

    #[test]
    fn markdown_escape_escapes_reserved_chars() {
        assert_eq!(escape_markdown("a_b*c"), "a\\_b\\*c");
    }
}
