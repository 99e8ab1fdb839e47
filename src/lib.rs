//! Polymarket Monitoring and Scoring
//!
//! Ingests live and historical Polymarket data and turns it into actionable
//! signals: momentum-based probability predictions, structural risk grades,
//! and wash-trading suspicion scores.
//!
//! ## Architecture
//!
//! ```text
//! Markets API / Order-book API / Live feed → Store (snapshots, trades)
//!                                               ↓
//!                  Prediction / Risk / Wash-trade engines → alerting, display
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod storage;
pub mod types;
