//! Structural market risk scoring
//!
//! Grades a market's definition, liquidity and timing into a 0-100 score
//! (lower = safer) and an A-F letter grade. Missing inputs degrade the
//! affected factor toward "uncertain" instead of aborting the assessment.

use crate::types::Market;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Phrasing that tends to precede resolution disputes
const SUBJECTIVE_KEYWORDS: &[&str] = &[
    "best",
    "worst",
    "significant",
    "major",
    "maybe",
    "soon",
    "eventually",
    "interesting",
];

/// One factor's contribution to the assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorScore {
    /// 0-100, higher = riskier
    pub score: f64,
    pub weight: f64,
    pub detail: String,
}

/// Immutable risk assessment for one market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub market_id: String,
    pub market_title: String,
    pub factors: HashMap<String, FactorScore>,
    /// 0-100, lower = safer
    pub overall_score: f64,
    /// "A" through "F"
    pub overall_grade: String,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub assessed_at: DateTime<Utc>,
}

/// Inputs for one scoring pass; construct with `new` and set what is known
#[derive(Debug, Clone, Default)]
pub struct RiskInput {
    pub market_id: String,
    pub title: String,
    pub description: String,
    pub end_date: Option<DateTime<Utc>>,
    pub volume_24h: f64,
    pub liquidity: f64,
    pub spread: f64,
    pub category: String,
    pub resolution_source: String,
}

impl RiskInput {
    pub fn new(market_id: &str, title: &str) -> Self {
        Self {
            market_id: market_id.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn from_market(market: &Market) -> Self {
        Self {
            market_id: market.id.clone(),
            title: market.question.clone(),
            description: market.description.clone().unwrap_or_default(),
            end_date: market.end_date,
            volume_24h: market.volume_24h.to_f64().unwrap_or(0.0),
            liquidity: market.liquidity.to_f64().unwrap_or(0.0),
            spread: market.spread.and_then(|s| s.to_f64()).unwrap_or(0.0),
            category: market.category.clone().unwrap_or_default(),
            resolution_source: market.resolution_source.clone().unwrap_or_default(),
        }
    }
}

/// Factor weights; sum to 1.0
#[derive(Debug, Clone)]
pub struct RiskWeights {
    pub resolution: f64,
    pub liquidity: f64,
    pub time: f64,
    pub volume_quality: f64,
    pub spread: f64,
    pub category: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            resolution: 0.25,
            liquidity: 0.20,
            time: 0.15,
            volume_quality: 0.15,
            spread: 0.10,
            category: 0.15,
        }
    }
}

/// Structural risk scorer
#[derive(Debug, Clone, Default)]
pub struct MarketRiskScorer {
    weights: RiskWeights,
}

impl MarketRiskScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score_market(&self, input: &RiskInput) -> RiskAssessment {
        let now = Utc::now();
        let w = &self.weights;

        let mut factors = HashMap::new();
        factors.insert(
            "resolution_clarity".to_string(),
            resolution_factor(input, w.resolution),
        );
        factors.insert(
            "liquidity".to_string(),
            liquidity_factor(input.liquidity, w.liquidity),
        );
        factors.insert(
            "time_risk".to_string(),
            time_factor(input.end_date, now, w.time),
        );
        factors.insert(
            "volume_quality".to_string(),
            volume_quality_factor(input.volume_24h, input.liquidity, w.volume_quality),
        );
        factors.insert("spread".to_string(), spread_factor(input.spread, w.spread));
        factors.insert(
            "category_risk".to_string(),
            category_factor(&input.category, w.category),
        );

        let overall_score = factors
            .values()
            .map(|f| f.score * f.weight)
            .sum::<f64>()
            .round()
            .clamp(0.0, 100.0);
        let overall_grade = grade_for_score(overall_score).to_string();

        let warnings = build_warnings(&factors);
        let recommendations = build_recommendations(&overall_grade);

        RiskAssessment {
            market_id: input.market_id.clone(),
            market_title: input.title.clone(),
            factors,
            overall_score,
            overall_grade,
            warnings,
            recommendations,
            assessed_at: now,
        }
    }

    pub fn get_grade_description(&self, grade: &str) -> String {
        match grade {
            "A" => "Well-defined market with solid liquidity",
            "B" => "Minor structural concerns",
            "C" => "Moderate risk; check resolution terms before sizing up",
            "D" => "Significant structural risk",
            "F" => "Avoid: poorly defined or illiquid",
            _ => "Unknown grade",
        }
        .to_string()
    }

    pub fn get_grade_color(&self, grade: &str) -> String {
        match grade {
            "A" => "green",
            "B" => "cyan",
            "C" => "yellow",
            "D" => "dark_orange",
            "F" => "red",
            _ => "white",
        }
        .to_string()
    }
}

/// Grade buckets on the rounded score: A [0,20], B [21,35], C [36,50],
/// D [51,70], F [71,100].
pub fn grade_for_score(score: f64) -> &'static str {
    let score = score.round();
    if score <= 20.0 {
        "A"
    } else if score <= 35.0 {
        "B"
    } else if score <= 50.0 {
        "C"
    } else if score <= 70.0 {
        "D"
    } else {
        "F"
    }
}

fn resolution_factor(input: &RiskInput, weight: f64) -> FactorScore {
    let mut score: f64 = 50.0;
    let mut notes = Vec::new();

    if input.resolution_source.trim().is_empty() {
        score += 15.0;
        notes.push("no resolution source".to_string());
    } else {
        score -= 30.0;
        notes.push(format!("resolves via {}", input.resolution_source.trim()));
    }

    let text = format!("{} {}", input.title, input.description).to_lowercase();
    let mut subjective: f64 = 0.0;
    for keyword in SUBJECTIVE_KEYWORDS {
        if text.contains(keyword) {
            subjective += 10.0;
        }
    }
    if subjective > 0.0 {
        score += subjective.min(30.0);
        notes.push("subjective phrasing".to_string());
    }

    if input.description.trim().is_empty() {
        score += 10.0;
        notes.push("no description".to_string());
    }

    FactorScore {
        score: score.clamp(0.0, 100.0),
        weight,
        detail: notes.join(", "),
    }
}

fn liquidity_factor(liquidity: f64, weight: f64) -> FactorScore {
    let score = if liquidity >= 1_000_000.0 {
        10.0
    } else if liquidity >= 500_000.0 {
        20.0
    } else if liquidity >= 100_000.0 {
        30.0
    } else if liquidity >= 50_000.0 {
        40.0
    } else if liquidity >= 10_000.0 {
        55.0
    } else if liquidity >= 1_000.0 {
        65.0
    } else if liquidity > 0.0 {
        75.0
    } else {
        85.0
    };

    FactorScore {
        score,
        weight,
        detail: format!("${:.0} liquidity", liquidity),
    }
}

fn time_factor(end_date: Option<DateTime<Utc>>, now: DateTime<Utc>, weight: f64) -> FactorScore {
    let (score, detail) = match end_date {
        // No end date is maximal uncertainty, not "no information"
        None => (70.0, "no end date".to_string()),
        Some(end) => {
            let days = (end - now).num_days();
            let score = if days <= 2 {
                10.0
            } else if days <= 7 {
                15.0
            } else if days <= 30 {
                30.0
            } else if days <= 90 {
                40.0
            } else if days <= 180 {
                50.0
            } else {
                65.0
            };
            (score, format!("resolves in {} days", days.max(0)))
        }
    };

    FactorScore { score, weight, detail }
}

fn volume_quality_factor(volume_24h: f64, liquidity: f64, weight: f64) -> FactorScore {
    if liquidity <= 0.0 {
        let score = if volume_24h > 0.0 { 75.0 } else { 55.0 };
        return FactorScore {
            score,
            weight,
            detail: "no liquidity to compare against".to_string(),
        };
    }

    let ratio = volume_24h / liquidity;
    let score = if ratio > 10.0 {
        80.0
    } else if ratio > 5.0 {
        60.0
    } else if ratio > 2.0 {
        40.0
    } else if ratio >= 0.05 {
        20.0
    } else {
        // Near-dead volume relative to the pool
        55.0
    };

    FactorScore {
        score,
        weight,
        detail: format!("24h volume at {:.2}x liquidity", ratio),
    }
}

fn spread_factor(spread: f64, weight: f64) -> FactorScore {
    let score = if spread <= 0.02 {
        15.0
    } else if spread <= 0.05 {
        30.0
    } else if spread <= 0.10 {
        45.0
    } else if spread <= 0.15 {
        60.0
    } else {
        75.0
    };

    FactorScore {
        score,
        weight,
        detail: format!("{:.1}pp bid/ask spread", spread * 100.0),
    }
}

fn category_factor(category: &str, weight: f64) -> FactorScore {
    // Priors from historical dispute rates per category
    let score = match category.to_lowercase().as_str() {
        "sports" => 15.0,
        "crypto" => 25.0,
        "science" => 30.0,
        "entertainment" => 35.0,
        "economics" => 40.0,
        "politics" => 55.0,
        _ => 45.0,
    };

    FactorScore {
        score,
        weight,
        detail: if category.is_empty() {
            "uncategorized".to_string()
        } else {
            category.to_string()
        },
    }
}

fn build_warnings(factors: &HashMap<String, FactorScore>) -> Vec<String> {
    let mut warnings = Vec::new();
    let score_of = |key: &str| factors.get(key).map(|f| f.score).unwrap_or(0.0);

    if score_of("liquidity") >= 70.0 {
        warnings.push("Very low liquidity; exits may be difficult".to_string());
    }
    if score_of("resolution_clarity") >= 70.0 {
        warnings.push("Resolution criteria look vague or subjective".to_string());
    }
    if score_of("time_risk") >= 60.0 {
        warnings.push("Long or unknown time to resolution".to_string());
    }
    if score_of("spread") >= 60.0 {
        warnings.push("Wide bid/ask spread".to_string());
    }
    if score_of("volume_quality") >= 60.0 {
        warnings.push("Volume out of proportion to liquidity".to_string());
    }

    warnings
}

fn build_recommendations(grade: &str) -> Vec<String> {
    match grade {
        "A" | "B" => vec!["Structure looks sound; monitor as usual".to_string()],
        "C" => vec![
            "Read the resolution terms before sizing up".to_string(),
            "Prefer limit orders given the structure".to_string(),
        ],
        _ => vec![
            "Treat as speculative; structural risk is high".to_string(),
            "Verify the resolution source independently".to_string(),
        ],
    }
}
