//! Prediction engine
//!
//! Combines up to six sub-signals into a weighted directional forecast.
//! Absent signals omit their term without renormalizing the remaining
//! weights, so sparse markets produce lower-confidence predictions rather
//! than differently-scaled ones.

use crate::client::clob::OrderBook;
use crate::error::Result;
use crate::storage::MarketHistoryStore;
use crate::types::{Market, MarketSnapshot, Trade};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Both the predicted and realized change must sit inside this band
/// (percentage points) to count as a correct "no move" call.
const NEUTRAL_BAND_PP: f64 = 0.5;

/// A full-strength composite signal predicts a move of this many
/// percentage points over the horizon.
const FULL_STRENGTH_MOVE_PP: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Momentum,
    Volume,
    Whale,
    SmartMoney,
    Technical,
    OrderBook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    fn sign(&self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
            Direction::Neutral => 0.0,
        }
    }
}

/// One sub-signal's contribution to a scoring pass. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,
    pub direction: Direction,
    /// 0.0..=1.0
    pub strength: f64,
    pub description: String,
}

/// Composite forecast for one market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub market_id: String,
    /// Estimated probability change over the horizon, percentage points
    pub probability_change: f64,
    pub direction: Direction,
    /// 0.0..=1.0; scales with data completeness and signal agreement
    pub confidence: f64,
    pub signals: Vec<Signal>,
    pub horizon_hours: u32,
    pub generated_at: DateTime<Utc>,
}

/// One reconciled prediction outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub market_id: String,
    pub predicted: f64,
    pub actual: f64,
    pub correct: bool,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccuracySummary {
    pub total: usize,
    pub correct: usize,
    pub hit_rate: f64,
}

/// Tuning for the prediction engine
#[derive(Debug, Clone)]
pub struct PredictionConfig {
    /// Per-signal weights; sum to 1.0
    pub weights: HashMap<SignalType, f64>,
    pub horizon_hours: u32,
    /// Minimum notional for a trade to count as whale flow
    pub whale_notional: f64,
    pub smart_money_min_win_rate: f64,
    pub smart_money_min_trades: i64,
    /// Snapshot lookback window
    pub history_hours: i64,
    pub history_limit: i64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        let mut weights = HashMap::new();
        weights.insert(SignalType::Momentum, 0.30);
        weights.insert(SignalType::Volume, 0.20);
        weights.insert(SignalType::Whale, 0.15);
        weights.insert(SignalType::SmartMoney, 0.15);
        weights.insert(SignalType::Technical, 0.10);
        weights.insert(SignalType::OrderBook, 0.10);

        Self {
            weights,
            horizon_hours: 24,
            whale_notional: 10_000.0,
            smart_money_min_win_rate: 0.6,
            smart_money_min_trades: 10,
            history_hours: 168,
            history_limit: 1000,
        }
    }
}

/// Multi-signal prediction engine over stored market history
pub struct PredictionEngine {
    store: Arc<dyn MarketHistoryStore>,
    config: PredictionConfig,
    accuracy_history: Mutex<Vec<OutcomeRecord>>,
}

impl PredictionEngine {
    pub fn new(store: Arc<dyn MarketHistoryStore>, config: PredictionConfig) -> Self {
        Self {
            store,
            config,
            accuracy_history: Mutex::new(Vec::new()),
        }
    }

    /// Score a market from stored history alone
    pub async fn score(&self, market_id: &str) -> Result<Option<Prediction>> {
        self.score_with(market_id, None, None).await
    }

    /// Score a market, optionally enriched with a current quote (for the
    /// venue's own price-change figures) and an order book. Returns `None`
    /// when no sub-signal has data.
    pub async fn score_with(
        &self,
        market_id: &str,
        market: Option<&Market>,
        book: Option<&OrderBook>,
    ) -> Result<Option<Prediction>> {
        let mut snapshots = self
            .store
            .get_market_history(market_id, self.config.history_hours, self.config.history_limit)
            .await?;
        snapshots.sort_by_key(|s| s.timestamp);

        let trades = self.store.get_market_trades(market_id, 24, 1000).await?;

        let mut signals = Vec::new();

        match momentum_signal(&snapshots) {
            Some(signal) => signals.push(signal),
            None => {
                // Quote-based fallback when stored history is too thin
                if let Some(market) = market {
                    if let Some(signal) = momentum_signal_from_quote(
                        market.one_day_price_change,
                        market.one_week_price_change,
                        market.one_month_price_change,
                    ) {
                        signals.push(signal);
                    }
                }
            }
        }

        if let Some(signal) = volume_signal(&snapshots) {
            signals.push(signal);
        }
        if let Some(signal) = whale_signal(&trades, self.config.whale_notional) {
            signals.push(signal);
        }
        if !trades.is_empty() {
            let smart: HashSet<String> = self
                .store
                .get_smart_wallets(
                    self.config.smart_money_min_win_rate,
                    self.config.smart_money_min_trades,
                )
                .await?
                .into_iter()
                .collect();
            if let Some(signal) = smart_money_signal(&trades, &smart) {
                signals.push(signal);
            }
        }
        if let Some(signal) = technical_signal(&snapshots) {
            signals.push(signal);
        }
        if let Some(book) = book {
            if let Some(signal) = orderbook_signal(book) {
                signals.push(signal);
            }
        }

        if signals.is_empty() {
            debug!("no signal data for {}", market_id);
            return Ok(None);
        }

        Ok(Some(self.combine(market_id, signals)))
    }

    fn combine(&self, market_id: &str, signals: Vec<Signal>) -> Prediction {
        let mut net = 0.0;
        let mut gross = 0.0;
        let mut covered_weight = 0.0;

        for signal in &signals {
            let weight = self
                .config
                .weights
                .get(&signal.signal_type)
                .copied()
                .unwrap_or(0.0);
            net += weight * signal.direction.sign() * signal.strength;
            gross += weight * signal.strength;
            covered_weight += weight;
        }

        let probability_change = net * FULL_STRENGTH_MOVE_PP;
        let direction = if probability_change >= NEUTRAL_BAND_PP {
            Direction::Bullish
        } else if probability_change <= -NEUTRAL_BAND_PP {
            Direction::Bearish
        } else {
            Direction::Neutral
        };

        let agreement = if gross > 0.0 { net.abs() / gross } else { 0.0 };
        let confidence = (covered_weight * (0.5 + 0.5 * agreement)).clamp(0.0, 1.0);

        Prediction {
            market_id: market_id.to_string(),
            probability_change,
            direction,
            confidence,
            signals,
            horizon_hours: self.config.horizon_hours,
            generated_at: Utc::now(),
        }
    }

    /// Reconcile a prediction against the realized probability change
    /// (percentage points). Both inside the +/-0.5pp band counts as a
    /// correct no-move call; anything larger must match the realized sign.
    pub fn record_outcome(&self, prediction: &Prediction, actual_change: f64) {
        let predicted = prediction.probability_change;
        let correct = if predicted.abs() < NEUTRAL_BAND_PP && actual_change.abs() < NEUTRAL_BAND_PP
        {
            true
        } else {
            (predicted > 0.0) == (actual_change > 0.0)
        };

        self.accuracy_history.lock().push(OutcomeRecord {
            market_id: prediction.market_id.clone(),
            predicted,
            actual: actual_change,
            correct,
            recorded_at: Utc::now(),
        });
    }

    pub fn accuracy_history(&self) -> Vec<OutcomeRecord> {
        self.accuracy_history.lock().clone()
    }

    pub fn accuracy_summary(&self) -> AccuracySummary {
        let history = self.accuracy_history.lock();
        let total = history.len();
        let correct = history.iter().filter(|r| r.correct).count();
        AccuracySummary {
            total,
            correct,
            hit_rate: if total > 0 {
                correct as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

/// Momentum over the stored probability series.
///
/// The recent window is `max(2, len/4)`: a window of 1 would compare the
/// latest price to itself and always report zero change, so the floor of 2
/// is unconditional.
pub fn momentum_signal(snapshots: &[MarketSnapshot]) -> Option<Signal> {
    if snapshots.len() < 2 {
        return None;
    }

    let prices: Vec<f64> = snapshots.iter().map(|s| s.probability).collect();
    let recent_count = (prices.len() / 4).max(2).min(prices.len());

    let last = prices[prices.len() - 1];
    let short_term = last - prices[prices.len() - recent_count];
    let long_term = last - prices[0];
    let combined = 0.6 * short_term + 0.4 * long_term;

    let direction = if combined > 0.005 {
        Direction::Bullish
    } else if combined < -0.005 {
        Direction::Bearish
    } else {
        Direction::Neutral
    };

    Some(Signal {
        signal_type: SignalType::Momentum,
        direction,
        strength: (combined.abs() * 10.0).min(1.0),
        description: format!(
            "Short-term {:+.1}pp, overall {:+.1}pp across {} snapshots",
            short_term * 100.0,
            long_term * 100.0,
            prices.len()
        ),
    })
}

/// Momentum from the venue's own 1d/1w/1m price-change figures. A present
/// value of exactly 0.0 still renders in the description; only missing
/// fields are skipped.
pub fn momentum_signal_from_quote(
    day: Option<f64>,
    week: Option<f64>,
    month: Option<f64>,
) -> Option<Signal> {
    if day.is_none() && week.is_none() && month.is_none() {
        return None;
    }

    let combined = day.unwrap_or(0.0) * 0.5 + week.unwrap_or(0.0) * 0.3 + month.unwrap_or(0.0) * 0.2;

    let mut parts = Vec::new();
    if let Some(change) = day {
        parts.push(format!("1d: {:+.1}pp", change * 100.0));
    }
    if let Some(change) = week {
        parts.push(format!("1w: {:+.1}pp", change * 100.0));
    }
    if let Some(change) = month {
        parts.push(format!("1m: {:+.1}pp", change * 100.0));
    }

    let direction = if combined > 0.005 {
        Direction::Bullish
    } else if combined < -0.005 {
        Direction::Bearish
    } else {
        Direction::Neutral
    };

    Some(Signal {
        signal_type: SignalType::Momentum,
        direction,
        strength: (combined.abs() * 10.0).min(1.0),
        description: format!("Quoted price change {}", parts.join(", ")),
    })
}

/// Volume trend: surging 24h volume reinforces the concurrent price
/// direction, fading volume reads as neutral.
pub fn volume_signal(snapshots: &[MarketSnapshot]) -> Option<Signal> {
    if snapshots.len() < 4 {
        return None;
    }

    let recent_count = (snapshots.len() / 4).max(2);
    let (older, recent) = snapshots.split_at(snapshots.len() - recent_count);

    let recent_avg = recent.iter().map(|s| s.volume_24h).sum::<f64>() / recent.len() as f64;
    let older_avg = older.iter().map(|s| s.volume_24h).sum::<f64>() / older.len() as f64;
    if older_avg <= 0.0 {
        return None;
    }

    let ratio = recent_avg / older_avg;
    let price_change = recent[recent.len() - 1].probability - recent[0].probability;

    let (direction, strength) = if ratio >= 1.5 {
        let direction = if price_change > 0.0 {
            Direction::Bullish
        } else if price_change < 0.0 {
            Direction::Bearish
        } else {
            Direction::Neutral
        };
        (direction, ((ratio - 1.0) / 2.0).min(1.0))
    } else if ratio <= 0.5 {
        (Direction::Neutral, 0.3)
    } else {
        (Direction::Neutral, 0.1)
    };

    Some(Signal {
        signal_type: SignalType::Volume,
        direction,
        strength,
        description: format!("24h volume at {:.1}x its earlier average", ratio),
    })
}

/// Net direction of large trades (notional at or above the threshold)
pub fn whale_signal(trades: &[Trade], whale_notional: f64) -> Option<Signal> {
    let whales: Vec<&Trade> = trades.iter().filter(|t| t.is_whale(whale_notional)).collect();
    if whales.is_empty() {
        return None;
    }

    flow_signal(
        &whales,
        SignalType::Whale,
        &format!("{} whale trades", whales.len()),
    )
}

/// Net direction of trades placed by tracked high-win-rate wallets
pub fn smart_money_signal(trades: &[Trade], smart_wallets: &HashSet<String>) -> Option<Signal> {
    if smart_wallets.is_empty() {
        return None;
    }
    let smart: Vec<&Trade> = trades
        .iter()
        .filter(|t| smart_wallets.contains(&t.wallet))
        .collect();
    if smart.is_empty() {
        return None;
    }

    flow_signal(
        &smart,
        SignalType::SmartMoney,
        &format!("{} trades from tracked wallets", smart.len()),
    )
}

fn flow_signal(trades: &[&Trade], signal_type: SignalType, label: &str) -> Option<Signal> {
    let gross: f64 = trades.iter().map(|t| t.notional()).sum();
    if gross <= 0.0 {
        return None;
    }
    let net: f64 = trades
        .iter()
        .map(|t| {
            if t.is_bullish() {
                t.notional()
            } else {
                -t.notional()
            }
        })
        .sum();

    let imbalance = net / gross;
    let direction = if imbalance > 0.1 {
        Direction::Bullish
    } else if imbalance < -0.1 {
        Direction::Bearish
    } else {
        Direction::Neutral
    };

    Some(Signal {
        signal_type,
        direction,
        strength: imbalance.abs().min(1.0),
        description: format!("{}, net flow {:+.0}% of gross", label, imbalance * 100.0),
    })
}

/// RSI over the probability series: overbought reads bearish, oversold
/// bullish.
pub fn technical_signal(snapshots: &[MarketSnapshot]) -> Option<Signal> {
    if snapshots.len() < 5 {
        return None;
    }

    let prices: Vec<f64> = snapshots.iter().map(|s| s.probability).collect();
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in prices.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }

    let rsi = if gains + losses > 0.0 {
        100.0 * gains / (gains + losses)
    } else {
        50.0
    };

    let direction = if rsi > 70.0 {
        Direction::Bearish
    } else if rsi < 30.0 {
        Direction::Bullish
    } else {
        Direction::Neutral
    };

    Some(Signal {
        signal_type: SignalType::Technical,
        direction,
        strength: ((rsi - 50.0).abs() / 50.0).min(1.0),
        description: format!("RSI {:.0}", rsi),
    })
}

/// Depth imbalance between the bid and ask sides of the book
pub fn orderbook_signal(book: &OrderBook) -> Option<Signal> {
    let bid_depth = book.bid_depth();
    let ask_depth = book.ask_depth();
    let total = bid_depth + ask_depth;
    if total <= 0.0 {
        return None;
    }

    let imbalance = (bid_depth - ask_depth) / total;
    let direction = if imbalance > 0.1 {
        Direction::Bullish
    } else if imbalance < -0.1 {
        Direction::Bearish
    } else {
        Direction::Neutral
    };

    Some(Signal {
        signal_type: SignalType::OrderBook,
        direction,
        strength: imbalance.abs().min(1.0),
        description: format!(
            "Book depth {:.0} bid / {:.0} ask ({:+.0}% imbalance)",
            bid_depth,
            ask_depth,
            imbalance * 100.0
        ),
    })
}
