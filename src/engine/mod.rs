//! Scoring engines
//!
//! Deterministic, side-effect-free scoring over ingested market data:
//! - prediction: weighted multi-signal probability forecasts
//! - risk_score: structural/definitional risk grading
//! - wash_trade: wash trading suspicion scoring

pub mod prediction;
pub mod risk_score;
pub mod wash_trade;


pub use prediction::{
    Direction, Prediction, PredictionConfig, PredictionEngine, Signal, SignalType,
};
pub use risk_score::{MarketRiskScorer, RiskAssessment, RiskInput};
pub use wash_trade::{
    quick_wash_trade_score, WashTradeAnalysis, WashTradeDetector, WashTradeInput, WashTradeRisk,
};
