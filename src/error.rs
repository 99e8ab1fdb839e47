//! Error types for the monitor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    /// Transient failure (timeout, connection error, 5xx, 429) that
    /// survived every retry attempt.
    #[error("{operation} failed after {attempts} attempts")]
    RequestFailed {
        operation: String,
        attempts: u32,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Non-retryable HTTP failure (4xx other than 429).
    #[error("{operation} rejected with status {status}: {body}")]
    ClientError {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("feed transport error: {0}")]
    Feed(String),

    /// The live feed exhausted its reconnect budget. All subscriptions have
    /// been cleared; the owner must re-subscribe after restarting the feed.
    #[error("feed permanently failed after {reconnects} reconnect attempts")]
    FeedPermanentlyFailed { reconnects: u32 },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("market not found: {0}")]
    MarketNotFound(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
