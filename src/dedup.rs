//! Seen-transaction dedup: two disjoint in-memory sets (DEX vs wallet feed)
//! mirrored to a durable table so a restart does not re-alert for the last
//! 24 hours.

use crate::core::types::{Signature, Timestamp};
use dashmap::DashMap;

/// One disjoint seen-signature set, capped in memory. On overflow the most
/// recently added half is retained — the precise half kept does not matter
/// for correctness, only that the set stays bounded.
pub struct SeenSet {
    seen: DashMap<Signature, Timestamp>,
    cap: usize,
}

impl SeenSet {
    pub fn new(cap: usize) -> Self {
        Self {
            seen: DashMap::new(),
            cap,
        }
    }

    /// Inserts `sig` if absent and returns true iff this call was the first
    /// to see it. Dedup must be happens-before fan-out: callers insert
    /// before doing anything else with the event.
    pub fn insert_if_new(&self, sig: &str, now: Timestamp) -> bool {
        if self.seen.contains_key(sig) {
            return false;
        }
        let first = self.seen.insert(sig.to_string(), now).is_none();
        if self.seen.len() > self.cap {
            self.evict_oldest_half();
        }
        first
    }

    fn evict_oldest_half(&self) {
        let mut entries: Vec<(Signature, Timestamp)> = self
            .seen
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        entries.sort_by_key(|(_, ts)| *ts);
        let drop_count = entries.len() / 2;
        for (sig, _) in entries.into_iter().take(drop_count) {
            self.seen.remove(&sig);
        }
    }

    pub fn contains(&self, sig: &str) -> bool {
        self.seen.contains_key(sig)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Removes entries older than `horizon_secs`; mirrors the durable
    /// `seen_txs` table's daily prune job.
    pub fn prune_older_than(&self, now: Timestamp, horizon_secs: i64) {
        self.seen.retain(|_, ts| now - *ts < horizon_secs);
    }
}

/// The two feeds' dedup sets. Kept disjoint so a signature relevant as both
/// a pool trade and a wallet movement can alert on both.
pub struct SeenTransactionStore {
    pub dex: SeenSet,
    pub wallet: SeenSet,
}

impl SeenTransactionStore {
    pub fn new(cap_per_set: usize) -> Self {
        Self {
            dex: SeenSet::new(cap_per_set),
            wallet: SeenSet::new(cap_per_set),
        }
    }

    pub fn prune_all(&self, now: Timestamp) {
        const HORIZON_SECS: i64 = 24 * 3600;
        self.dex.prune_older_than(now, HORIZON_SECS);
        self.wallet.prune_older_than(now, HORIZON_SECS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_insert_of_same_sig_returns_false() {
        let set = SeenSet::new(100);
        assert!(set.insert_if_new("sig1", 0));
        assert!(!set.insert_if_new("sig1", 1));
    }

    #[test]
    fn dex_and_wallet_sets_are_disjoint() {
        let store = SeenTransactionStore::new(100);
        assert!(store.dex.insert_if_new("sig1", 0));
        assert!(store.wallet.insert_if_new("sig1", 0));
    }

    #[test]
    fn overflow_retains_newest_half() {
        let set = SeenSet::new(4);
        for i in 0..8 {
            set.insert_if_new(&i.to_string(), i);
        }
        assert!(set.len() <= 4);
        assert!(set.contains("7"));
    }

    #[test]
    fn prune_removes_entries_past_horizon() {
        let set = SeenSet::new(100);
        set.insert_if_new("old", 0);
        set.insert_if_new("new", 100_000);
        set.prune_older_than(100_000, 24 * 3600);
        assert!(!set.contains("old"));
        assert!(set.contains("new"));
    }
}
