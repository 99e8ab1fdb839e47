//! Core data types shared across the monitor

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

/// Market outcome with current price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub token_id: String,
    pub outcome: String,
    pub price: Decimal,
}

/// Market data from the markets API.
///
/// Money-like fields stay `Decimal` here because the venue serializes them
/// as strings; the analytics layer works in f64 (see [`MarketSnapshot`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    #[serde(default)]
    pub slug: String,
    pub question: String,
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub resolution_source: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
    pub volume: Decimal,
    #[serde(default)]
    pub volume_24h: Decimal,
    pub liquidity: Decimal,
    #[serde(default)]
    pub best_bid: Option<Decimal>,
    #[serde(default)]
    pub best_ask: Option<Decimal>,
    #[serde(default)]
    pub spread: Option<Decimal>,
    #[serde(default)]
    pub one_day_price_change: Option<f64>,
    #[serde(default)]
    pub one_week_price_change: Option<f64>,
    #[serde(default)]
    pub one_month_price_change: Option<f64>,
    pub outcomes: Vec<Outcome>,
    pub active: bool,
    pub closed: bool,
}

impl Market {
    /// Price of the "Yes" outcome, if present
    pub fn yes_price(&self) -> Option<Decimal> {
        self.outcomes
            .iter()
            .find(|o| o.outcome.eq_ignore_ascii_case("yes"))
            .map(|o| o.price)
    }

    /// Price of the "No" outcome, if present
    pub fn no_price(&self) -> Option<Decimal> {
        self.outcomes
            .iter()
            .find(|o| o.outcome.eq_ignore_ascii_case("no"))
            .map(|o| o.price)
    }

    /// Implied probability of the "Yes" outcome (first outcome as fallback)
    pub fn probability(&self) -> f64 {
        self.yes_price()
            .or_else(|| self.outcomes.first().map(|o| o.price))
            .and_then(|p| p.to_f64())
            .unwrap_or(0.0)
    }

    /// Capture the market's current state as a point-in-time snapshot
    pub fn to_snapshot(&self, at: DateTime<Utc>) -> MarketSnapshot {
        let best_bid = self.best_bid.and_then(|d| d.to_f64()).unwrap_or(0.0);
        let best_ask = self.best_ask.and_then(|d| d.to_f64()).unwrap_or(0.0);
        let spread = self
            .spread
            .and_then(|d| d.to_f64())
            .unwrap_or_else(|| (best_ask - best_bid).max(0.0));

        MarketSnapshot {
            market_id: self.id.clone(),
            market_slug: self.slug.clone(),
            title: self.question.clone(),
            probability: self.probability(),
            volume_24h: self.volume_24h.to_f64().unwrap_or(0.0),
            liquidity: self.liquidity.to_f64().unwrap_or(0.0),
            best_bid,
            best_ask,
            spread,
            timestamp: at,
        }
    }
}

/// Immutable point-in-time record of a market's state.
///
/// No two snapshots for the same market share a timestamp; the store keeps
/// the later write on collision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market_id: String,
    #[serde(default)]
    pub market_slug: String,
    #[serde(default)]
    pub title: String,
    /// Implied probability of the "Yes" outcome, 0.0..=1.0
    pub probability: f64,
    pub volume_24h: f64,
    pub liquidity: f64,
    pub best_bid: f64,
    pub best_ask: f64,
    pub spread: f64,
    pub timestamp: DateTime<Utc>,
}

/// A single executed trade, as delivered by the live feed.
///
/// Created only by the ingestion layer; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub market_id: String,
    #[serde(default)]
    pub event_slug: String,
    #[serde(default)]
    pub market_slug: String,
    pub wallet: String,
    pub side: Side,
    #[serde(default)]
    pub outcome: String,
    pub price: f64,
    pub size: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tx_hash: String,
}

impl Trade {
    /// Notional value in collateral units
    pub fn notional(&self) -> f64 {
        self.price * self.size
    }

    /// Whether this trade's notional meets the whale threshold
    pub fn is_whale(&self, threshold: f64) -> bool {
        self.notional() >= threshold
    }

    /// A buy of "Yes" or a sell of "No" expresses a bullish view on the
    /// market resolving yes; the converse is bearish.
    pub fn is_bullish(&self) -> bool {
        let yes = self.outcome.eq_ignore_ascii_case("yes");
        match self.side {
            Side::Buy => yes,
            Side::Sell => !yes,
        }
    }
}
