//! Order-book API client
//!
//! Path-parameterized endpoints for books, trades and the sampled
//! current-markets list. Book levels arrive in two shapes depending on the
//! endpoint: `{"price": "0.55", "size": "100"}` objects or
//! `["0.55", "100"]` tuples, with values as numbers or strings. Both are
//! accepted.

use crate::client::rest::{list_payload, RestClient};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One price level of an order book
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    fn value(&self) -> f64 {
        match self {
            RawNumber::Number(n) => *n,
            RawNumber::Text(s) => s.parse().unwrap_or(0.0),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLevel {
    Object { price: RawNumber, size: RawNumber },
    Tuple(RawNumber, RawNumber),
}

impl<'de> Deserialize<'de> for BookLevel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawLevel::deserialize(deserializer)?;
        Ok(match raw {
            RawLevel::Object { price, size } => BookLevel {
                price: price.value(),
                size: size.value(),
            },
            RawLevel::Tuple(price, size) => BookLevel {
                price: price.value(),
                size: size.value(),
            },
        })
    }
}

/// Order book for one outcome token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Bid-ask spread as a percentage of the best bid. Empty or one-sided
    /// books yield 0.0.
    pub fn spread_pct(&self) -> f64 {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if bid > 0.0 => (ask - bid) / bid * 100.0,
            _ => 0.0,
        }
    }

    /// Total size resting on the bid side
    pub fn bid_depth(&self) -> f64 {
        self.bids.iter().map(|l| l.size).sum()
    }

    /// Total size resting on the ask side
    pub fn ask_depth(&self) -> f64 {
        self.asks.iter().map(|l| l.size).sum()
    }
}

/// Order-book API client. Not rate limited.
pub struct ClobClient {
    rest: RestClient,
}

impl ClobClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(base_url, 3, None)?,
        })
    }

    /// Get the order book for a token, truncated to `depth` levels per side
    pub async fn get_order_book(&self, token_id: &str, depth: usize) -> Result<OrderBook> {
        let query = [("token_id", token_id.to_string())];
        let value = self.rest.get_json("/book", &query).await?;
        let mut book: OrderBook = serde_json::from_value(value)?;
        if depth > 0 {
            book.bids.truncate(depth);
            book.asks.truncate(depth);
        }
        Ok(book)
    }

    /// Get recent trades for a market as raw JSON objects; the feed is the
    /// canonical trade source, this endpoint backfills gaps.
    pub async fn get_recent_trades(
        &self,
        market_id: &str,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>> {
        let query = [("limit", limit.to_string())];
        let value = self
            .rest
            .get_json(&format!("/trades/{}", market_id), &query)
            .await?;
        Ok(list_payload(value))
    }

    /// Get current active markets. This endpoint wraps its list in a
    /// `{"data": [...]}` envelope.
    pub async fn get_current_markets(&self, limit: u32) -> Result<Vec<serde_json::Value>> {
        let query = [("limit", limit.to_string())];
        let value = self.rest.get_json("/sampling-markets", &query).await?;
        Ok(list_payload(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_level_object_form() {
        let json = r#"{"bids": [{"price": "0.55", "size": "100"}], "asks": [{"price": "0.60", "size": "80"}]}"#;
        let book: OrderBook = serde_json::from_str(json).unwrap();
        assert_eq!(book.best_bid(), Some(0.55));
        assert_eq!(book.best_ask(), Some(0.60));
    }

    #[test]
    fn test_book_level_tuple_form() {
        let json = r#"{"bids": [["0.55", "100"], ["0.54", "50"]], "asks": [[0.60, 80]]}"#;
        let book: OrderBook = serde_json::from_str(json).unwrap();
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.best_bid(), Some(0.55));
        assert_eq!(book.asks[0].size, 80.0);
    }

    #[test]
    fn test_spread_pct() {
        let book = OrderBook {
            bids: vec![BookLevel { price: 0.50, size: 100.0 }],
            asks: vec![BookLevel { price: 0.55, size: 100.0 }],
        };
        assert!((book.spread_pct() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_spread_pct_empty_or_one_sided() {
        assert_eq!(OrderBook::default().spread_pct(), 0.0);

        let book = OrderBook {
            bids: vec![],
            asks: vec![BookLevel { price: 0.55, size: 100.0 }],
        };
        assert_eq!(book.spread_pct(), 0.0);

        // Zero best bid guards the division
        let book = OrderBook {
            bids: vec![BookLevel { price: 0.0, size: 100.0 }],
            asks: vec![BookLevel { price: 0.55, size: 100.0 }],
        };
        assert_eq!(book.spread_pct(), 0.0);
    }

    #[test]
    fn test_depth_sums() {
        let book = OrderBook {
            bids: vec![
                BookLevel { price: 0.50, size: 100.0 },
                BookLevel { price: 0.49, size: 60.0 },
            ],
            asks: vec![BookLevel { price: 0.52, size: 40.0 }],
        };
        assert!((book.bid_depth() - 160.0).abs() < 1e-9);
        assert!((book.ask_depth() - 40.0).abs() < 1e-9);
    }
}
