//! Configuration management

use crate::engine::prediction::{PredictionConfig, SignalType};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Markets API endpoint
    pub gamma_url: String,
    /// Order-book API endpoint
    pub clob_url: String,
    /// Live trade-feed endpoint
    pub ws_url: String,
    /// Bearer token for the markets API, if issued
    pub api_key: Option<String>,
    /// Request budget for the markets API
    pub requests_per_minute: u32,
    /// Feed reconnect attempts before giving up
    pub max_reconnects: u32,
    /// Feed connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            gamma_url: "https://gamma-api.polymarket.com".to_string(),
            clob_url: "https://clob.polymarket.com".to_string(),
            ws_url: "wss://ws-live-data.polymarket.com".to_string(),
            api_key: None,
            requests_per_minute: 60,
            max_reconnects: 5,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Signal weights; should sum to 1.0
    pub momentum_weight: f64,
    pub volume_weight: f64,
    pub whale_weight: f64,
    pub smart_money_weight: f64,
    pub technical_weight: f64,
    pub orderbook_weight: f64,
    /// Prediction horizon in hours
    pub horizon_hours: u32,
    /// Minimum notional for whale flow
    pub whale_notional: f64,
    /// Win-rate floor for smart-money wallets
    pub smart_money_min_win_rate: f64,
    pub smart_money_min_trades: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            momentum_weight: 0.30,
            volume_weight: 0.20,
            whale_weight: 0.15,
            smart_money_weight: 0.15,
            technical_weight: 0.10,
            orderbook_weight: 0.10,
            horizon_hours: 24,
            whale_notional: 10_000.0,
            smart_money_min_win_rate: 0.6,
            smart_money_min_trades: 10,
        }
    }
}

impl EngineConfig {
    pub fn to_prediction_config(&self) -> PredictionConfig {
        let mut config = PredictionConfig::default();
        config.weights.insert(SignalType::Momentum, self.momentum_weight);
        config.weights.insert(SignalType::Volume, self.volume_weight);
        config.weights.insert(SignalType::Whale, self.whale_weight);
        config
            .weights
            .insert(SignalType::SmartMoney, self.smart_money_weight);
        config
            .weights
            .insert(SignalType::Technical, self.technical_weight);
        config
            .weights
            .insert(SignalType::OrderBook, self.orderbook_weight);
        config.horizon_hours = self.horizon_hours;
        config.whale_notional = self.whale_notional;
        config.smart_money_min_win_rate = self.smart_money_min_win_rate;
        config.smart_money_min_trades = self.smart_money_min_trades;
        config
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between polling passes
    pub poll_interval_secs: u64,
    /// Markets per polling pass
    pub markets_per_poll: u32,
    /// Skip markets below this 24h volume
    pub min_volume: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            markets_per_poll: 20,
            min_volume: 0.01,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.polymarket-monitor/data.db".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, with environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path.as_ref().to_str().unwrap()))
            .add_source(config::Environment::with_prefix("POLYMON").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    /// Load from default locations, falling back to built-in defaults
    pub fn load_default() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let paths = [
            "config.toml",
            "~/.config/polymarket-monitor/config.toml",
        ];

        for path in paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::load(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    /// Database path with `~` expanded
    pub fn database_path(&self) -> String {
        shellexpand::tilde(&self.database.path).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.requests_per_minute, 60);
        assert_eq!(config.api.max_reconnects, 5);
        assert_eq!(config.monitor.poll_interval_secs, 60);
        assert!(config.api.api_key.is_none());
    }

    #[test]
    fn test_weights_sum_to_one() {
        let engine = EngineConfig::default();
        let total = engine.momentum_weight
            + engine.volume_weight
            + engine.whale_weight
            + engine.smart_money_weight
            + engine.technical_weight
            + engine.orderbook_weight;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_config_mapping() {
        let mut engine = EngineConfig::default();
        engine.momentum_weight = 0.5;
        engine.horizon_hours = 48;

        let config = engine.to_prediction_config();
        assert_eq!(config.weights[&SignalType::Momentum], 0.5);
        assert_eq!(config.horizon_hours, 48);
    }

    #[test]
    fn test_partial_toml_deserializes_with_defaults() {
        let toml_str = r#"
            [api]
            requests_per_minute = 30

            [monitor]
            poll_interval_secs = 120
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api.requests_per_minute, 30);
        assert_eq!(config.api.max_reconnects, 5);
        assert_eq!(config.monitor.poll_interval_secs, 120);
        assert_eq!(config.engine.horizon_hours, 24);
    }
}
