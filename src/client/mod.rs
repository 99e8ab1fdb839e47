//! Polymarket API clients
//!
//! This module provides the ingestion layer:
//! - Markets API: market data, prices, and metadata (rate limited)
//! - Order-book API: books, trades, current-markets sampling
//! - Live trade feed: self-healing WebSocket for trade activity

pub mod clob;
pub mod feed;
pub mod gamma;
pub mod rate_limit;
pub mod rest;
#[cfg(test)]
mod tests;

pub use clob::{BookLevel, ClobClient, OrderBook};
pub use feed::{FeedConfig, FeedState, RouteKey, TradeCallback, TradeFeed};
pub use gamma::GammaClient;
pub use rate_limit::RateLimiter;
pub use rest::RestClient;

use crate::config::ApiConfig;
use crate::error::Result;

/// Unified venue client: both REST endpoint families plus the feed config.
pub struct VenueClient {
    pub gamma: GammaClient,
    pub clob: ClobClient,
    feed_config: FeedConfig,
}

impl VenueClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let gamma = GammaClient::new(
            &config.gamma_url,
            config.api_key.as_deref(),
            config.requests_per_minute,
        )?;
        let clob = ClobClient::new(&config.clob_url)?;
        let feed_config = FeedConfig {
            url: config.ws_url.clone(),
            max_reconnects: config.max_reconnects,
            connect_timeout_secs: config.connect_timeout_secs,
        };

        Ok(Self {
            gamma,
            clob,
            feed_config,
        })
    }

    /// Build a live trade feed for this venue
    pub fn trade_feed(&self) -> TradeFeed {
        TradeFeed::new(self.feed_config.clone())
    }
}
