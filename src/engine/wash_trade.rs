//! Wash trading detection
//!
//! Flags suspicious activity from aggregate trading metrics. Indicators are
//! scored only when their inputs are supplied; with no indicator data at all
//! the overall score defaults to mid-range uncertainty, because "no data"
//! and "verified clean" are different risk postures.

use crate::types::Trade;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall score when no indicator has data
const UNCERTAIN_DEFAULT_SCORE: f64 = 40.0;

/// Discrete suspicion level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WashTradeRisk {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl WashTradeRisk {
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            WashTradeRisk::Low
        } else if score < 50.0 {
            WashTradeRisk::Medium
        } else if score < 75.0 {
            WashTradeRisk::High
        } else {
            WashTradeRisk::VeryHigh
        }
    }

    pub const ALL: [WashTradeRisk; 4] = [
        WashTradeRisk::Low,
        WashTradeRisk::Medium,
        WashTradeRisk::High,
        WashTradeRisk::VeryHigh,
    ];
}

/// One flagged indicator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WashTradeIndicator {
    pub indicator_type: String,
    /// 0-100, higher = more suspicious
    pub score: f64,
    pub description: String,
}

/// Immutable analysis result for one market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WashTradeAnalysis {
    pub market_id: String,
    pub market_title: String,
    pub indicators: Vec<WashTradeIndicator>,
    /// 0-100, higher = more suspicious
    pub overall_score: f64,
    pub risk_level: WashTradeRisk,
    pub analyzed_at: DateTime<Utc>,
}

/// Inputs for one analysis pass. Unset fields leave their indicator
/// unscored rather than scoring it clean.
#[derive(Debug, Clone, Default)]
pub struct WashTradeInput {
    pub market_id: String,
    pub title: String,
    pub volume_24h: Option<f64>,
    pub liquidity: Option<f64>,
    pub trade_count_24h: Option<u64>,
    pub unique_traders_24h: Option<u64>,
    pub avg_trade_size: Option<f64>,
    pub median_trade_size: Option<f64>,
    pub yes_volume: Option<f64>,
    pub no_volume: Option<f64>,
}

impl WashTradeInput {
    pub fn new(market_id: &str, title: &str) -> Self {
        Self {
            market_id: market_id.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    /// Derive the trade-level metrics from a recorded trade window
    pub fn from_trades(
        market_id: &str,
        title: &str,
        volume_24h: Option<f64>,
        liquidity: Option<f64>,
        trades: &[Trade],
    ) -> Self {
        let mut input = Self::new(market_id, title);
        input.volume_24h = volume_24h;
        input.liquidity = liquidity;

        if trades.is_empty() {
            return input;
        }

        let mut sizes: Vec<f64> = trades.iter().map(|t| t.size).collect();
        sizes.sort_by(|a, b| a.total_cmp(b));
        let mid = sizes.len() / 2;
        let median = if sizes.len() % 2 == 0 {
            (sizes[mid - 1] + sizes[mid]) / 2.0
        } else {
            sizes[mid]
        };
        let avg = sizes.iter().sum::<f64>() / sizes.len() as f64;

        let unique: std::collections::HashSet<&str> = trades
            .iter()
            .map(|t| t.wallet.as_str())
            .filter(|w| !w.is_empty())
            .collect();

        let yes: f64 = trades
            .iter()
            .filter(|t| t.outcome.eq_ignore_ascii_case("yes"))
            .map(|t| t.notional())
            .sum();
        let no: f64 = trades
            .iter()
            .filter(|t| t.outcome.eq_ignore_ascii_case("no"))
            .map(|t| t.notional())
            .sum();

        input.trade_count_24h = Some(trades.len() as u64);
        input.unique_traders_24h = Some(unique.len() as u64);
        input.avg_trade_size = Some(avg);
        input.median_trade_size = Some(median);
        input.yes_volume = Some(yes);
        input.no_volume = Some(no);
        input
    }
}

/// Indicator-based wash trading detector
#[derive(Debug, Clone, Default)]
pub struct WashTradeDetector;

impl WashTradeDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze_market(&self, input: &WashTradeInput) -> WashTradeAnalysis {
        let mut indicators = Vec::new();

        if let (Some(volume), Some(liquidity)) = (input.volume_24h, input.liquidity) {
            indicators.push(volume_liquidity_indicator(volume, liquidity));
        }
        if let (Some(count), Some(unique)) = (input.trade_count_24h, input.unique_traders_24h) {
            if unique > 0 {
                indicators.push(concentration_indicator(count, unique));
            }
        }
        if let (Some(avg), Some(median)) = (input.avg_trade_size, input.median_trade_size) {
            if avg > 0.0 {
                indicators.push(uniformity_indicator(avg, median));
            }
        }
        if let (Some(yes), Some(no)) = (input.yes_volume, input.no_volume) {
            if yes + no > 0.0 {
                indicators.push(side_balance_indicator(yes, no));
            }
        }

        let overall_score = if indicators.is_empty() {
            UNCERTAIN_DEFAULT_SCORE
        } else {
            indicators.iter().map(|i| i.score).sum::<f64>() / indicators.len() as f64
        };

        WashTradeAnalysis {
            market_id: input.market_id.clone(),
            market_title: input.title.clone(),
            indicators,
            overall_score,
            risk_level: WashTradeRisk::from_score(overall_score),
            analyzed_at: Utc::now(),
        }
    }

    pub fn get_risk_description(&self, level: WashTradeRisk) -> String {
        match level {
            WashTradeRisk::Low => "No meaningful wash trading indicators",
            WashTradeRisk::Medium => "Some indicators elevated or data incomplete",
            WashTradeRisk::High => "Multiple indicators point to artificial activity",
            WashTradeRisk::VeryHigh => "Trading pattern is consistent with wash trading",
        }
        .to_string()
    }

    pub fn get_risk_color(&self, level: WashTradeRisk) -> String {
        match level {
            WashTradeRisk::Low => "green",
            WashTradeRisk::Medium => "yellow",
            WashTradeRisk::High => "dark_orange",
            WashTradeRisk::VeryHigh => "red",
        }
        .to_string()
    }
}

fn volume_liquidity_indicator(volume_24h: f64, liquidity: f64) -> WashTradeIndicator {
    let (score, ratio) = if liquidity <= 0.0 {
        if volume_24h > 0.0 {
            (90.0, f64::INFINITY)
        } else {
            (10.0, 0.0)
        }
    } else {
        let ratio = volume_24h / liquidity;
        let score = if ratio >= 20.0 {
            85.0
        } else if ratio >= 10.0 {
            70.0
        } else if ratio >= 5.0 {
            55.0
        } else if ratio >= 3.0 {
            45.0
        } else if ratio >= 1.0 {
            30.0
        } else {
            10.0
        };
        (score, ratio)
    };

    WashTradeIndicator {
        indicator_type: "volume_liquidity".to_string(),
        score,
        description: if ratio.is_finite() {
            format!("24h volume at {:.1}x liquidity", ratio)
        } else {
            "reported volume with no liquidity".to_string()
        },
    }
}

fn concentration_indicator(trade_count: u64, unique_traders: u64) -> WashTradeIndicator {
    let per_trader = trade_count as f64 / unique_traders as f64;
    let score = if per_trader >= 100.0 {
        90.0
    } else if per_trader >= 50.0 {
        75.0
    } else if per_trader >= 20.0 {
        60.0
    } else if per_trader >= 10.0 {
        45.0
    } else if per_trader >= 5.0 {
        30.0
    } else {
        10.0
    };

    WashTradeIndicator {
        indicator_type: "trader_concentration".to_string(),
        score,
        description: format!(
            "{} trades across {} traders ({:.1} per trader)",
            trade_count, unique_traders, per_trader
        ),
    }
}

fn uniformity_indicator(avg: f64, median: f64) -> WashTradeIndicator {
    let deviation = (avg - median).abs() / avg;
    let score = if deviation <= 0.02 {
        80.0
    } else if deviation <= 0.05 {
        60.0
    } else if deviation <= 0.15 {
        35.0
    } else {
        10.0
    };

    WashTradeIndicator {
        indicator_type: "size_uniformity".to_string(),
        score,
        description: format!(
            "avg {:.0} vs median {:.0} ({:.0}% apart)",
            avg,
            median,
            deviation * 100.0
        ),
    }
}

fn side_balance_indicator(yes_volume: f64, no_volume: f64) -> WashTradeIndicator {
    let total = yes_volume + no_volume;
    let imbalance = (yes_volume - no_volume).abs() / total;
    let score = if imbalance <= 0.02 {
        75.0
    } else if imbalance <= 0.05 {
        55.0
    } else if imbalance <= 0.10 {
        40.0
    } else {
        10.0
    };

    WashTradeIndicator {
        indicator_type: "side_balance".to_string(),
        score,
        description: format!(
            "yes/no volume split {:.0}/{:.0}",
            yes_volume / total * 100.0,
            no_volume / total * 100.0
        ),
    }
}

/// Fast volume/liquidity-only score for list screens
pub fn quick_wash_trade_score(volume_24h: f64, liquidity: f64) -> (u8, String) {
    if volume_24h <= 0.0 {
        return (10, "No recent volume".to_string());
    }
    if liquidity <= 0.0 {
        return (80, "Reported volume with no liquidity".to_string());
    }

    let ratio = volume_24h / liquidity;
    let (score, label) = if ratio >= 20.0 {
        (85, "Extreme volume/liquidity ratio")
    } else if ratio >= 10.0 {
        (70, "Very high volume/liquidity ratio")
    } else if ratio >= 5.0 {
        (55, "Elevated volume/liquidity ratio")
    } else if ratio >= 1.0 {
        (35, "Volume slightly above liquidity")
    } else {
        (15, "Volume in proportion to liquidity")
    };

    (score, format!("{} ({:.1}x)", label, ratio))
}
