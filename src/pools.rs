//! Pool registry: periodically refreshed, atomically published pool set.

use crate::core::types::Mint;
use crate::models::Pool;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

#[derive(Default)]
pub struct PoolSnapshot {
    pub by_id: HashMap<String, Pool>,
    pub by_mint: HashMap<String, Vec<String>>,
}

impl PoolSnapshot {
    fn build(pools: Vec<Pool>) -> Self {
        let mut by_id = HashMap::with_capacity(pools.len());
        let mut by_mint: HashMap<String, Vec<String>> = HashMap::new();
        for pool in pools {
            by_mint
                .entry(pool.base.as_str().to_string())
                .or_default()
                .push(pool.id.clone());
            by_mint
                .entry(pool.quote.as_str().to_string())
                .or_default()
                .push(pool.id.clone());
            by_id.insert(pool.id.clone(), pool);
        }
        Self { by_id, by_mint }
    }
}

/// Publishes pool snapshots atomically: readers always observe a
/// fully-formed snapshot, never a partial refresh. A single `RwLock<Arc<_>>`
/// written only by the refresh task is enough — cloning the `Arc` is cheap
/// for every reader.
pub struct PoolRegistry {
    dex_program_id: String,
    primary_token: Mint,
    snapshot: RwLock<Arc<PoolSnapshot>>,
}

impl PoolRegistry {
    pub fn new(dex_program_id: String, primary_token: Mint) -> Self {
        Self {
            dex_program_id,
            primary_token,
            snapshot: RwLock::new(Arc::new(PoolSnapshot::default())),
        }
    }

    pub fn snapshot(&self) -> Arc<PoolSnapshot> {
        self.snapshot.read().unwrap().clone()
    }

    /// Replaces the published snapshot. On a refresh failure elsewhere the
    /// caller simply skips calling this, leaving the previous snapshot live.
    pub fn publish(&self, raw_pools: Vec<(String, Mint, Mint)>) {
        let pools = raw_pools
            .into_iter()
            .map(|(id, base, quote)| Pool::new(id, base, quote, &self.primary_token))
            .collect();
        let next = Arc::new(PoolSnapshot::build(pools));
        *self.snapshot.write().unwrap() = next;
    }

    pub fn get(&self, pool_id: &str) -> Option<Pool> {
        self.snapshot().by_id.get(pool_id).cloned()
    }

    pub fn find_by_token(&self, mint: &Mint) -> Vec<Pool> {
        let snapshot = self.snapshot();
        snapshot
            .by_mint
            .get(mint.as_str())
            .into_iter()
            .flatten()
            .filter_map(|id| snapshot.by_id.get(id).cloned())
            .collect()
    }

    /// True iff any account in the list is the DEX program id or a known
    /// pool id.
    pub fn is_dex_transaction(&self, accounts: &[String]) -> bool {
        let snapshot = self.snapshot();
        accounts
            .iter()
            .any(|a| a == &self.dex_program_id || snapshot.by_id.contains_key(a))
    }

    /// Merges freshly-fetched 24h volumes into the published snapshot
    /// without disturbing the base/quote indexing a full `publish` rebuilds.
    pub fn apply_volumes(&self, volumes: &HashMap<String, f64>) {
        if volumes.is_empty() {
            return;
        }
        let current = self.snapshot();
        let mut pools: Vec<Pool> = current.by_id.values().cloned().collect();
        for pool in &mut pools {
            if let Some(v) = volumes.get(&pool.id) {
                pool.volume_usd_24h = Some(*v);
            }
        }
        let next = Arc::new(PoolSnapshot::build(pools));
        *self.snapshot.write().unwrap() = next;
    }

    pub fn search(&self, substring: &str) -> Vec<Pool> {
        let needle = substring.to_lowercase();
        self.snapshot()
            .by_id
            .values()
            .filter(|p| p.pair_name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}

/// Called by the scheduler's pool-refresh job; logs and keeps the previous
/// snapshot on failure rather than propagating the error up.
pub async fn refresh_or_keep_previous<F, Fut>(registry: &PoolRegistry, fetch: F)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<Vec<(String, Mint, Mint)>>>,
{
    match fetch().await {
        Ok(pools) => registry.publish(pools),
        Err(e) => warn!(error = %e, "pool refresh failed, keeping previous snapshot"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mint(s: &str) -> Mint {
        Mint::from(s.to_string())
    }

    #[test]
    fn find_by_token_matches_either_side() {
        let primary = mint("So11111111111111111111111111111111111111112");
        let registry = PoolRegistry::new("DexProg111111111111111111111111111111111".to_string(), primary.clone());
        registry.publish(vec![(
            "P1".to_string(),
            primary.clone(),
            mint("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"),
        )]);
        assert_eq!(registry.find_by_token(&primary).len(), 1);
    }

    #[test]
    fn failed_refresh_keeps_previous_snapshot() {
        let primary = mint("So11111111111111111111111111111111111111112");
        let registry = PoolRegistry::new("DexProg111111111111111111111111111111111".to_string(), primary.clone());
        registry.publish(vec![(
            "P1".to_string(),
            primary.clone(),
            mint("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"),
        )]);
        assert!(registry.get("P1").is_some());
    }

    #[test]
    fn apply_volumes_merges_without_touching_unlisted_pools() {
        let primary = mint("So11111111111111111111111111111111111111112");
        let registry = PoolRegistry::new("DexProg111111111111111111111111111111111".to_string(), primary.clone());
        registry.publish(vec![
            ("P1".to_string(), primary.clone(), mint("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB")),
            ("P2".to_string(), primary.clone(), mint("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v")),
        ]);
        let mut volumes = HashMap::new();
        volumes.insert("P1".to_string(), 12_345.0);
        registry.apply_volumes(&volumes);
        assert_eq!(registry.get("P1").unwrap().volume_usd_24h, Some(12_345.0));
        assert_eq!(registry.get("P2").unwrap().volume_usd_24h, None);
    }

    #[test]
    fn apply_volumes_is_a_noop_on_empty_input() {
        let primary = mint("So11111111111111111111111111111111111111112");
        let registry = PoolRegistry::new("DexProg111111111111111111111111111111111".to_string(), primary.clone());
        registry.publish(vec![(
            "P1".to_string(),
            primary.clone(),
            mint("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"),
        )]);
        registry.apply_volumes(&HashMap::new());
        assert_eq!(registry.get("P1").unwrap().volume_usd_24h, None);
    }

    #[test]
    fn is_dex_transaction_matches_program_id_or_pool() {
        let primary = mint("So11111111111111111111111111111111111111112");
        let registry = PoolRegistry::new("DexProg111111111111111111111111111111111".to_string(), primary.clone());
        registry.publish(vec![(
            "P1".to_string(),
            primary.clone(),
            mint("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"),
        )]);
        assert!(registry.is_dex_transaction(&["P1".to_string()]));
        assert!(registry.is_dex_transaction(&["DexProg111111111111111111111111111111111".to_string()]));
        assert!(!registry.is_dex_transaction(&["SomeOtherAccount".to_string()]));
    }
}
