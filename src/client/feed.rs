//! Live trade feed with auto-reconnect
//!
//! One subscription message covers all trade activity; filtering happens
//! client-side against a routing table. Per-market server subscriptions were
//! observed to drop data, so completeness wins over subscription
//! granularity.
//!
//! Callbacks are awaited inline: a slow callback backpressures the feed into
//! the transport instead of queueing messages in application memory.

use crate::error::{MonitorError, Result};
use crate::types::{Side, Trade};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

const BACKOFF_CAP_SECS: u64 = 30;

/// Feed connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FeedState {
    Disconnected = 0,
    Connecting = 1,
    Subscribed = 2,
    Streaming = 3,
    PermanentlyFailed = 4,
}

impl From<u8> for FeedState {
    fn from(val: u8) -> Self {
        match val {
            1 => FeedState::Connecting,
            2 => FeedState::Subscribed,
            3 => FeedState::Streaming,
            4 => FeedState::PermanentlyFailed,
            _ => FeedState::Disconnected,
        }
    }
}

/// Configuration for the live trade feed
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket endpoint
    pub url: String,
    /// Reconnect attempts before giving up
    pub max_reconnects: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "wss://ws-live-data.polymarket.com".to_string(),
            max_reconnects: 5,
            connect_timeout_secs: 10,
        }
    }
}

/// Routing key, resolved in priority order: event slug, market slug,
/// wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteKey {
    Event(String),
    Market(String),
    All,
}

pub type TradeCallback =
    Arc<dyn Fn(Trade) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Default)]
struct RouteTable {
    routes: HashMap<RouteKey, TradeCallback>,
}

impl RouteTable {
    fn insert(&mut self, key: RouteKey, callback: TradeCallback) {
        self.routes.insert(key, callback);
    }

    /// First match wins: event slug, then market slug, then wildcard.
    fn resolve(&self, event_slug: &str, market_slug: &str) -> Option<TradeCallback> {
        if !event_slug.is_empty() {
            if let Some(cb) = self.routes.get(&RouteKey::Event(event_slug.to_string())) {
                return Some(Arc::clone(cb));
            }
        }
        if !market_slug.is_empty() {
            if let Some(cb) = self.routes.get(&RouteKey::Market(market_slug.to_string())) {
                return Some(Arc::clone(cb));
            }
        }
        self.routes.get(&RouteKey::All).map(Arc::clone)
    }

    fn clear(&mut self) {
        self.routes.clear();
    }

    fn len(&self) -> usize {
        self.routes.len()
    }
}

/// What to do with an inbound text frame
#[derive(Debug)]
pub(crate) enum FrameAction {
    /// Keep-alive; reply with the pong token
    Pong,
    /// Blank, unparseable, payload-less or off-topic frame
    Ignore,
    /// A trade to route
    Deliver {
        event_slug: String,
        market_slug: String,
        trade: Trade,
    },
}

pub(crate) fn classify_frame(text: &str) -> FrameAction {
    if text == "PING" {
        return FrameAction::Pong;
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return FrameAction::Ignore;
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return FrameAction::Ignore,
    };

    // Envelopes without a payload carry no trade data
    let Some(payload) = value.get("payload") else {
        return FrameAction::Ignore;
    };
    if value.get("topic").and_then(|v| v.as_str()) != Some("activity")
        || value.get("type").and_then(|v| v.as_str()) != Some("trades")
    {
        return FrameAction::Ignore;
    }

    let event_slug = json_str(payload, "eventSlug");
    let market_slug = json_str(payload, "slug");
    FrameAction::Deliver {
        trade: trade_from_payload(payload),
        event_slug,
        market_slug,
    }
}

fn json_str(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn json_f64(value: &serde_json::Value, key: &str) -> f64 {
    match value.get(key) {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn trade_from_payload(payload: &serde_json::Value) -> Trade {
    let side = match payload.get("side").and_then(|v| v.as_str()) {
        Some(s) if s.eq_ignore_ascii_case("sell") => Side::Sell,
        _ => Side::Buy,
    };

    let mut ts = json_f64(payload, "timestamp");
    if ts > 1e12 {
        ts /= 1000.0; // milliseconds
    }
    let timestamp = DateTime::<Utc>::from_timestamp(ts as i64, 0).unwrap_or_else(Utc::now);

    Trade {
        market_id: json_str(payload, "conditionId"),
        event_slug: json_str(payload, "eventSlug"),
        market_slug: json_str(payload, "slug"),
        wallet: json_str(payload, "proxyWallet"),
        side,
        outcome: json_str(payload, "outcome"),
        price: json_f64(payload, "price"),
        size: json_f64(payload, "size"),
        timestamp,
        tx_hash: json_str(payload, "transactionHash"),
    }
}

enum StreamEnd {
    Shutdown,
    Closed { received_any: bool },
}

/// Self-healing trade feed. One `run` task owns the transport; subscriptions
/// survive transient reconnects and are cleared on permanent failure.
pub struct TradeFeed {
    config: FeedConfig,
    routes: RwLock<RouteTable>,
    state: AtomicU8,
    reconnect_count: AtomicU32,
}

impl TradeFeed {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            routes: RwLock::new(RouteTable::default()),
            state: AtomicU8::new(FeedState::Disconnected as u8),
            reconnect_count: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> FeedState {
        FeedState::from(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: FeedState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    /// Register a callback for an event slug, market slug, or the wildcard.
    /// Re-subscribing a key replaces its callback.
    pub fn subscribe(&self, key: RouteKey, callback: TradeCallback) {
        self.routes.write().insert(key, callback);
    }

    /// Register a callback for all trades
    pub fn subscribe_all(&self, callback: TradeCallback) {
        self.subscribe(RouteKey::All, callback);
    }

    pub fn subscription_count(&self) -> usize {
        self.routes.read().len()
    }

    fn subscribe_message() -> String {
        serde_json::json!({
            "action": "subscribe",
            "subscriptions": [
                {"topic": "activity", "type": "trades"}
            ]
        })
        .to_string()
    }

    /// Drive the feed until shutdown or permanent failure.
    ///
    /// Errors immediately only when the very first connection cannot be
    /// established. After reconnects are exhausted the routing table is
    /// cleared (callers re-subscribe from scratch) and
    /// `FeedPermanentlyFailed` is returned.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let mut attempts: u32 = 0;
        let mut ever_connected = false;

        loop {
            if shutdown.try_recv().is_ok() {
                self.set_state(FeedState::Disconnected);
                return Ok(());
            }

            self.set_state(FeedState::Connecting);
            match self.stream_once(&mut shutdown).await {
                Ok(StreamEnd::Shutdown) => {
                    info!("trade feed shutdown requested");
                    self.set_state(FeedState::Disconnected);
                    return Ok(());
                }
                Ok(StreamEnd::Closed { received_any }) => {
                    ever_connected = true;
                    if received_any {
                        attempts = 0;
                    }
                    attempts += 1;
                }
                Err(e) => {
                    if !ever_connected {
                        self.set_state(FeedState::Disconnected);
                        return Err(e);
                    }
                    warn!("trade feed reconnect failed: {}", e);
                    attempts += 1;
                }
            }

            self.set_state(FeedState::Disconnected);
            if attempts > self.config.max_reconnects {
                return Err(self.fail_permanently(attempts - 1));
            }

            self.reconnect_count.fetch_add(1, Ordering::Relaxed);
            let wait = 2u64.saturating_pow(attempts).min(BACKOFF_CAP_SECS);
            info!("trade feed reconnecting in {}s (attempt {})", wait, attempts);
            tokio::select! {
                _ = sleep(Duration::from_secs(wait)) => {}
                _ = shutdown.recv() => {
                    info!("trade feed shutdown during backoff");
                    self.set_state(FeedState::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    /// Clear all subscriptions and mark the feed dead. Deliberate contract:
    /// stale callbacks are not kept alive for a feed that will never route
    /// to them again.
    fn fail_permanently(&self, reconnects: u32) -> MonitorError {
        self.routes.write().clear();
        self.set_state(FeedState::PermanentlyFailed);
        MonitorError::FeedPermanentlyFailed { reconnects }
    }

    async fn stream_once(&self, shutdown: &mut broadcast::Receiver<()>) -> Result<StreamEnd> {
        let connect = timeout(
            Duration::from_secs(self.config.connect_timeout_secs),
            connect_async(&self.config.url),
        )
        .await
        .map_err(|_| MonitorError::Feed("connection timeout".to_string()))?
        .map_err(|e| MonitorError::Feed(e.to_string()))?;

        let (mut write, mut read) = connect.0.split();

        write
            .send(Message::Text(Self::subscribe_message().into()))
            .await
            .map_err(|e| MonitorError::Feed(e.to_string()))?;
        self.set_state(FeedState::Subscribed);
        info!("trade feed connected and subscribed");

        self.set_state(FeedState::Streaming);
        let mut received_any = false;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    return Ok(StreamEnd::Shutdown);
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            received_any = true;
                            match classify_frame(&text) {
                                FrameAction::Pong => {
                                    let _ = write.send(Message::Text("PONG".into())).await;
                                }
                                FrameAction::Ignore => {}
                                FrameAction::Deliver { event_slug, market_slug, trade } => {
                                    let callback = self.routes.read().resolve(&event_slug, &market_slug);
                                    match callback {
                                        // Awaited inline to preserve per-market ordering
                                        Some(cb) => (*cb)(trade).await,
                                        None => debug!("no route for {}/{}", event_slug, market_slug),
                                    }
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!("trade feed closed by server");
                            return Ok(StreamEnd::Closed { received_any });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("trade feed transport error: {}", e);
                            return Ok(StreamEnd::Closed { received_any });
                        }
                        None => {
                            return Ok(StreamEnd::Closed { received_any });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn noop_callback() -> TradeCallback {
        Arc::new(|_trade| Box::pin(async {}))
    }

    fn recording_callback(log: Arc<Mutex<Vec<String>>>, tag: &str) -> TradeCallback {
        let tag = tag.to_string();
        Arc::new(move |_trade| {
            let log = Arc::clone(&log);
            let tag = tag.clone();
            Box::pin(async move {
                log.lock().push(tag);
            })
        })
    }

    #[test]
    fn test_feed_state_conversion() {
        assert_eq!(FeedState::from(0), FeedState::Disconnected);
        assert_eq!(FeedState::from(1), FeedState::Connecting);
        assert_eq!(FeedState::from(2), FeedState::Subscribed);
        assert_eq!(FeedState::from(3), FeedState::Streaming);
        assert_eq!(FeedState::from(4), FeedState::PermanentlyFailed);
        assert_eq!(FeedState::from(255), FeedState::Disconnected);
    }

    #[test]
    fn test_subscribe_message_shape() {
        let msg: serde_json::Value =
            serde_json::from_str(&TradeFeed::subscribe_message()).unwrap();
        assert_eq!(msg["action"], "subscribe");
        assert_eq!(msg["subscriptions"][0]["topic"], "activity");
        assert_eq!(msg["subscriptions"][0]["type"], "trades");
    }

    #[test]
    fn test_classify_frame_ping() {
        assert!(matches!(classify_frame("PING"), FrameAction::Pong));
    }

    #[test]
    fn test_classify_frame_blank_and_garbage() {
        assert!(matches!(classify_frame(""), FrameAction::Ignore));
        assert!(matches!(classify_frame("   "), FrameAction::Ignore));
        assert!(matches!(classify_frame("{not json"), FrameAction::Ignore));
    }

    #[test]
    fn test_classify_frame_missing_payload() {
        let frame = r#"{"topic": "activity", "type": "trades"}"#;
        assert!(matches!(classify_frame(frame), FrameAction::Ignore));
    }

    #[test]
    fn test_classify_frame_wrong_topic() {
        let frame = r#"{"topic": "comments", "type": "trades", "payload": {}}"#;
        assert!(matches!(classify_frame(frame), FrameAction::Ignore));
    }

    #[test]
    fn test_classify_frame_delivers_trade() {
        let frame = r#"{
            "topic": "activity",
            "type": "trades",
            "payload": {
                "conditionId": "0xcond",
                "eventSlug": "election-2026",
                "slug": "will-x-win",
                "proxyWallet": "0xwallet",
                "side": "SELL",
                "outcome": "No",
                "price": "0.35",
                "size": 200,
                "timestamp": 1735689600,
                "transactionHash": "0xtx"
            }
        }"#;

        match classify_frame(frame) {
            FrameAction::Deliver {
                event_slug,
                market_slug,
                trade,
            } => {
                assert_eq!(event_slug, "election-2026");
                assert_eq!(market_slug, "will-x-win");
                assert_eq!(trade.market_id, "0xcond");
                assert_eq!(trade.wallet, "0xwallet");
                assert_eq!(trade.side, Side::Sell);
                assert_eq!(trade.outcome, "No");
                assert!((trade.price - 0.35).abs() < 1e-9);
                assert!((trade.size - 200.0).abs() < 1e-9);
                assert_eq!(trade.timestamp.timestamp(), 1735689600);
            }
            other => panic!("expected Deliver, got {:?}", other),
        }
    }

    #[test]
    fn test_route_priority_event_before_market_before_wildcard() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut table = RouteTable::default();
        table.insert(
            RouteKey::Event("ev".to_string()),
            recording_callback(Arc::clone(&log), "event"),
        );
        table.insert(
            RouteKey::Market("mk".to_string()),
            recording_callback(Arc::clone(&log), "market"),
        );
        table.insert(RouteKey::All, recording_callback(Arc::clone(&log), "all"));

        let trade = trade_from_payload(&serde_json::json!({}));
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        rt.block_on(async {
            for (event, market) in [("ev", "mk"), ("other-ev", "mk"), ("other-ev", "other-mk")] {
                let cb = table.resolve(event, market).unwrap();
                (*cb)(trade.clone()).await;
            }
        });

        assert_eq!(*log.lock(), vec!["event", "market", "all"]);
    }

    #[test]
    fn test_route_unmatched_without_wildcard() {
        let mut table = RouteTable::default();
        table.insert(RouteKey::Market("mk".to_string()), noop_callback());
        assert!(table.resolve("ev", "other").is_none());
    }

    #[test]
    fn test_routes_cleared_after_permanent_failure() {
        // Documented contract: permanent failure deregisters every callback,
        // so callers relying on auto-resubscription will stop receiving data
        // until they re-subscribe.
        let feed = TradeFeed::new(FeedConfig::default());
        feed.subscribe(RouteKey::Market("mk".to_string()), noop_callback());
        feed.subscribe_all(noop_callback());
        assert_eq!(feed.subscription_count(), 2);

        let err = feed.fail_permanently(5);
        assert!(matches!(
            err,
            MonitorError::FeedPermanentlyFailed { reconnects: 5 }
        ));
        assert_eq!(feed.subscription_count(), 0);
        assert_eq!(feed.state(), FeedState::PermanentlyFailed);
    }

    #[test]
    fn test_resubscribing_key_replaces_callback() {
        let feed = TradeFeed::new(FeedConfig::default());
        feed.subscribe(RouteKey::Market("mk".to_string()), noop_callback());
        feed.subscribe(RouteKey::Market("mk".to_string()), noop_callback());
        assert_eq!(feed.subscription_count(), 1);
    }
}
