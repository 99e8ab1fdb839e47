//! In-memory store for tests and dry runs

use crate::error::Result;
use crate::storage::MarketHistoryStore;
use crate::types::{MarketSnapshot, Trade};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Store backed by process memory, mirroring the SQLite read contract
#[derive(Default)]
pub struct MemoryStore {
    snapshots: RwLock<HashMap<String, Vec<MarketSnapshot>>>,
    trades: RwLock<HashMap<String, Vec<Trade>>>,
    smart_wallets: RwLock<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a snapshot, keeping the later write on a timestamp collision
    pub fn push_snapshot(&self, snapshot: MarketSnapshot) {
        let mut snapshots = self.snapshots.write();
        let entries = snapshots.entry(snapshot.market_id.clone()).or_default();
        entries.retain(|s| s.timestamp != snapshot.timestamp);
        entries.push(snapshot);
        entries.sort_by_key(|s| s.timestamp);
    }

    pub fn push_trade(&self, trade: Trade) {
        self.trades
            .write()
            .entry(trade.market_id.clone())
            .or_default()
            .push(trade);
    }

    pub fn add_smart_wallet(&self, address: &str) {
        self.smart_wallets.write().push(address.to_string());
    }
}

#[async_trait]
impl MarketHistoryStore for MemoryStore {
    async fn get_market_history(
        &self,
        market_id: &str,
        hours: i64,
        limit: i64,
    ) -> Result<Vec<MarketSnapshot>> {
        let since = Utc::now() - Duration::hours(hours);
        let snapshots = self.snapshots.read();
        let mut result: Vec<MarketSnapshot> = snapshots
            .get(market_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|s| s.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Newest first, like the SQLite store
        result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        result.truncate(limit as usize);
        Ok(result)
    }

    async fn get_market_trades(
        &self,
        market_id: &str,
        hours: i64,
        limit: i64,
    ) -> Result<Vec<Trade>> {
        let since = Utc::now() - Duration::hours(hours);
        let trades = self.trades.read();
        let mut result: Vec<Trade> = trades
            .get(market_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|t| t.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        result.truncate(limit as usize);
        Ok(result)
    }

    async fn get_smart_wallets(&self, _min_win_rate: f64, _min_trades: i64) -> Result<Vec<String>> {
        Ok(self.smart_wallets.read().clone())
    }
}
