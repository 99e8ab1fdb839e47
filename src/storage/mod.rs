//! Snapshot and trade storage
//!
//! The scoring engines consume history through the [`MarketHistoryStore`]
//! trait; ingestion writes through [`Database`]. Missing history is an empty
//! result, never an error.

pub mod memory;


use crate::error::Result;
use crate::types::{MarketSnapshot, Side, Trade};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Read contract the scoring engines depend on.
///
/// History is returned newest-first; engines sort before computing, so
/// implementations may use either ordering.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketHistoryStore: Send + Sync {
    /// Snapshot history for a market within the lookback window. Empty when
    /// no history exists.
    async fn get_market_history(
        &self,
        market_id: &str,
        hours: i64,
        limit: i64,
    ) -> Result<Vec<MarketSnapshot>>;

    /// Recorded trades for a market within the lookback window
    async fn get_market_trades(
        &self,
        market_id: &str,
        hours: i64,
        limit: i64,
    ) -> Result<Vec<Trade>>;

    /// Wallets whose tracked win rate and activity clear the given floors
    async fn get_smart_wallets(&self, min_win_rate: f64, min_trades: i64) -> Result<Vec<String>>;
}

/// SQLite-backed store for snapshots, trades and wallet stats
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite database (creates if not exists)
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// In-memory database for tests and dry runs. Single connection so every
    /// query sees the same memory store.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS market_snapshots (
                market_id TEXT NOT NULL,
                market_slug TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                probability REAL NOT NULL,
                volume_24h REAL NOT NULL DEFAULT 0,
                liquidity REAL NOT NULL DEFAULT 0,
                best_bid REAL NOT NULL DEFAULT 0,
                best_ask REAL NOT NULL DEFAULT 0,
                spread REAL NOT NULL DEFAULT 0,
                timestamp TEXT NOT NULL,
                UNIQUE(market_id, timestamp)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_snapshots_market_time
            ON market_snapshots(market_id, timestamp DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                market_id TEXT NOT NULL,
                event_slug TEXT NOT NULL DEFAULT '',
                market_slug TEXT NOT NULL DEFAULT '',
                wallet TEXT NOT NULL,
                side TEXT NOT NULL,
                outcome TEXT NOT NULL DEFAULT '',
                price REAL NOT NULL,
                size REAL NOT NULL,
                timestamp TEXT NOT NULL,
                tx_hash TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_trades_market_time
            ON trades(market_id, timestamp DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallets (
                address TEXT PRIMARY KEY,
                first_seen TEXT NOT NULL,
                total_trades INTEGER NOT NULL DEFAULT 0,
                total_volume REAL NOT NULL DEFAULT 0,
                win_rate REAL NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Save a snapshot. Snapshots are unique per (market, timestamp); a
    /// collision keeps the later write.
    pub async fn save_snapshot(&self, snapshot: &MarketSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO market_snapshots
            (market_id, market_slug, title, probability, volume_24h, liquidity,
             best_bid, best_ask, spread, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snapshot.market_id)
        .bind(&snapshot.market_slug)
        .bind(&snapshot.title)
        .bind(snapshot.probability)
        .bind(snapshot.volume_24h)
        .bind(snapshot.liquidity)
        .bind(snapshot.best_bid)
        .bind(snapshot.best_ask)
        .bind(snapshot.spread)
        .bind(snapshot.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Save a trade and roll its notional into the wallet's stats
    pub async fn save_trade(&self, trade: &Trade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades
            (market_id, event_slug, market_slug, wallet, side, outcome,
             price, size, timestamp, tx_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&trade.market_id)
        .bind(&trade.event_slug)
        .bind(&trade.market_slug)
        .bind(&trade.wallet)
        .bind(match trade.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        })
        .bind(&trade.outcome)
        .bind(trade.price)
        .bind(trade.size)
        .bind(trade.timestamp.to_rfc3339())
        .bind(&trade.tx_hash)
        .execute(&self.pool)
        .await?;

        if !trade.wallet.is_empty() {
            let now = Utc::now().to_rfc3339();
            sqlx::query(
                r#"
                INSERT INTO wallets (address, first_seen, total_trades, total_volume, updated_at)
                VALUES (?, ?, 1, ?, ?)
                ON CONFLICT(address) DO UPDATE SET
                    total_trades = total_trades + 1,
                    total_volume = total_volume + excluded.total_volume,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&trade.wallet)
            .bind(&now)
            .bind(trade.notional())
            .bind(&now)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Record a wallet's reconciled win rate (maintained by an external
    /// reconciliation job)
    pub async fn set_wallet_win_rate(&self, address: &str, win_rate: f64) -> Result<()> {
        sqlx::query("UPDATE wallets SET win_rate = ?, updated_at = ? WHERE address = ?")
            .bind(win_rate)
            .bind(Utc::now().to_rfc3339())
            .bind(address)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Latest snapshot for a market, if any
    pub async fn get_latest_snapshot(&self, market_id: &str) -> Result<Option<MarketSnapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT market_id, market_slug, title, probability, volume_24h,
                   liquidity, best_bid, best_ask, spread, timestamp
            FROM market_snapshots
            WHERE market_id = ?
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(market_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| r.try_into().ok()))
    }
}

#[async_trait]
impl MarketHistoryStore for Database {
    async fn get_market_history(
        &self,
        market_id: &str,
        hours: i64,
        limit: i64,
    ) -> Result<Vec<MarketSnapshot>> {
        let since = (Utc::now() - Duration::hours(hours)).to_rfc3339();
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT market_id, market_slug, title, probability, volume_24h,
                   liquidity, best_bid, best_ask, spread, timestamp
            FROM market_snapshots
            WHERE market_id = ? AND timestamp >= ?
            ORDER BY timestamp DESC
            LIMIT ?
            "#,
        )
        .bind(market_id)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(|r| r.try_into().ok()).collect())
    }

    async fn get_market_trades(
        &self,
        market_id: &str,
        hours: i64,
        limit: i64,
    ) -> Result<Vec<Trade>> {
        let since = (Utc::now() - Duration::hours(hours)).to_rfc3339();
        let rows = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT market_id, event_slug, market_slug, wallet, side, outcome,
                   price, size, timestamp, tx_hash
            FROM trades
            WHERE market_id = ? AND timestamp >= ?
            ORDER BY timestamp DESC
            LIMIT ?
            "#,
        )
        .bind(market_id)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(|r| r.try_into().ok()).collect())
    }

    async fn get_smart_wallets(&self, min_win_rate: f64, min_trades: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT address FROM wallets WHERE win_rate >= ? AND total_trades >= ?",
        )
        .bind(min_win_rate)
        .bind(min_trades)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(address,)| address).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    market_id: String,
    market_slug: String,
    title: String,
    probability: f64,
    volume_24h: f64,
    liquidity: f64,
    best_bid: f64,
    best_ask: f64,
    spread: f64,
    timestamp: String,
}

impl TryFrom<SnapshotRow> for MarketSnapshot {
    type Error = anyhow::Error;

    fn try_from(row: SnapshotRow) -> std::result::Result<Self, Self::Error> {
        Ok(MarketSnapshot {
            market_id: row.market_id,
            market_slug: row.market_slug,
            title: row.title,
            probability: row.probability,
            volume_24h: row.volume_24h,
            liquidity: row.liquidity,
            best_bid: row.best_bid,
            best_ask: row.best_ask,
            spread: row.spread,
            timestamp: row.timestamp.parse()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TradeRow {
    market_id: String,
    event_slug: String,
    market_slug: String,
    wallet: String,
    side: String,
    outcome: String,
    price: f64,
    size: f64,
    timestamp: String,
    tx_hash: String,
}

impl TryFrom<TradeRow> for Trade {
    type Error = anyhow::Error;

    fn try_from(row: TradeRow) -> std::result::Result<Self, Self::Error> {
        Ok(Trade {
            market_id: row.market_id,
            event_slug: row.event_slug,
            market_slug: row.market_slug,
            wallet: row.wallet,
            side: if row.side == "SELL" {
                Side::Sell
            } else {
                Side::Buy
            },
            outcome: row.outcome,
            price: row.price,
            size: row.size,
            timestamp: row.timestamp.parse()?,
            tx_hash: row.tx_hash,
        })
    }
}
