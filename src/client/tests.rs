//! Tests for client module

use crate::types::{Market, MarketSnapshot, Side, Trade};
use chrono::Utc;
use rust_decimal_macros::dec;

#[test]
fn test_market_json_parsing() {
    let json = r#"{
        "id": "market1",
        "question": "Will it rain?",
        "description": "Weather market",
        "volume": "10000",
        "liquidity": "5000",
        "outcomes": [
            {"token_id": "yes", "outcome": "Yes", "price": "0.65"},
            {"token_id": "no", "outcome": "No", "price": "0.35"}
        ],
        "active": true,
        "closed": false,
        "end_date": null
    }"#;
    let market: Market = serde_json::from_str(json).unwrap();
    assert_eq!(market.id, "market1");
    assert_eq!(market.question, "Will it rain?");
    assert!(market.active);
    assert!(!market.closed);
}

#[test]
fn test_market_with_outcomes() {
    let json = r#"{
        "id": "m1",
        "question": "Test?",
        "description": null,
        "volume": "1000",
        "liquidity": "500",
        "outcomes": [
            {"token_id": "y", "outcome": "Yes", "price": "0.70"},
            {"token_id": "n", "outcome": "No", "price": "0.30"}
        ],
        "active": true,
        "closed": false,
        "end_date": null
    }"#;
    let market: Market = serde_json::from_str(json).unwrap();
    assert_eq!(market.outcomes.len(), 2);
    assert_eq!(market.yes_price(), Some(dec!(0.70)));
    assert_eq!(market.no_price(), Some(dec!(0.30)));
}

#[test]
fn test_snapshot_serialization_round_trip() {
    let snap = MarketSnapshot {
        market_id: "m1".to_string(),
        market_slug: "slug".to_string(),
        title: "Test?".to_string(),
        probability: 0.7,
        volume_24h: 1000.0,
        liquidity: 500.0,
        best_bid: 0.69,
        best_ask: 0.71,
        spread: 0.02,
        timestamp: Utc::now(),
    };

    let json = serde_json::to_string(&snap).unwrap();
    let parsed: MarketSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.market_id, snap.market_id);
    assert!((parsed.probability - snap.probability).abs() < 1e-12);
}

#[test]
fn test_trade_serialization() {
    let trade = Trade {
        market_id: "m1".to_string(),
        event_slug: "ev".to_string(),
        market_slug: "mk".to_string(),
        wallet: "0xabc".to_string(),
        side: Side::Buy,
        outcome: "Yes".to_string(),
        price: 0.55,
        size: 100.0,
        timestamp: Utc::now(),
        tx_hash: "0xtx".to_string(),
    };

    let json = serde_json::to_string(&trade).unwrap();
    assert!(json.contains("\"side\":\"BUY\""));
    // Numbers serialize as numbers, not strings
    assert!(json.contains("\"price\":0.55"));

    let parsed: Trade = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.side, Side::Buy);
    assert!((parsed.notional() - 55.0).abs() < 1e-9);
}
