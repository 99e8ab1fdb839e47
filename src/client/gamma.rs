//! Markets API client
//!
//! Fetches market information, prices, and metadata. Rate limited; attaches
//! a bearer token when an API key is configured.

use crate::client::rate_limit::RateLimiter;
use crate::client::rest::{list_payload, RestClient};
use crate::error::{MonitorError, Result};
use crate::types::{Market, Outcome};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

/// Markets API client
pub struct GammaClient {
    rest: RestClient,
}

/// Raw market as the API serializes it: numbers as strings, nested arrays
/// as JSON-encoded strings.
#[derive(Debug, Clone, Deserialize)]
struct RawMarket {
    id: String,
    #[serde(default)]
    slug: String,
    question: String,
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(rename = "resolutionSource")]
    resolution_source: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
    volume: Option<String>,
    #[serde(rename = "volume24hr")]
    volume_24h: Option<String>,
    liquidity: Option<String>,
    #[serde(rename = "bestBid")]
    best_bid: Option<String>,
    #[serde(rename = "bestAsk")]
    best_ask: Option<String>,
    spread: Option<String>,
    #[serde(rename = "oneDayPriceChange")]
    one_day_price_change: Option<String>,
    #[serde(rename = "oneWeekPriceChange")]
    one_week_price_change: Option<String>,
    #[serde(rename = "oneMonthPriceChange")]
    one_month_price_change: Option<String>,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    closed: bool,
    outcomes: Option<String>, // JSON string
    #[serde(rename = "outcomePrices")]
    outcome_prices: Option<String>, // JSON string "[\"0.55\", \"0.45\"]"
    #[serde(rename = "clobTokenIds")]
    clob_token_ids: Option<String>, // JSON string
}

impl GammaClient {
    /// Create a new markets client with its own rate limiter
    pub fn new(base_url: &str, api_key: Option<&str>, requests_per_minute: u32) -> Result<Self> {
        let rest = RestClient::new(base_url, 3, api_key)?
            .with_rate_limiter(RateLimiter::new(requests_per_minute));
        Ok(Self { rest })
    }

    /// Get a page of markets. Boolean filters are sent as lowercase string
    /// literals, which is what the API expects.
    pub async fn get_markets(
        &self,
        limit: u32,
        offset: u32,
        active: Option<bool>,
        closed: Option<bool>,
        tag: Option<&str>,
    ) -> Result<Vec<Market>> {
        let mut query = vec![
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        // Default to live markets
        let active = active.unwrap_or(true);
        let closed = closed.unwrap_or(false);
        query.push(("active", active.to_string()));
        query.push(("closed", closed.to_string()));
        if let Some(tag) = tag {
            query.push(("tag", tag.to_string()));
        }

        let value = self.rest.get_json("/markets", &query).await?;
        Ok(parse_market_list(value))
    }

    /// Get a single market by id or slug
    pub async fn get_market(&self, market_id: &str) -> Result<Market> {
        let value = self
            .rest
            .get_json(&format!("/markets/{}", market_id), &[])
            .await?;
        let raw: RawMarket = serde_json::from_value(value)?;
        parse_market(raw).ok_or_else(|| MonitorError::MarketNotFound(market_id.to_string()))
    }

    /// Search markets by free text. Tries the search endpoint first and
    /// falls back to filtering a page of markets locally.
    pub async fn search_markets(&self, query: &str, limit: u32) -> Result<Vec<Market>> {
        let params = [("q", query.to_string()), ("limit", limit.to_string())];
        match self.rest.get_json("/markets/search", &params).await {
            Ok(value) => {
                let results = parse_market_list(value);
                if !results.is_empty() {
                    return Ok(results);
                }
            }
            Err(e) => {
                debug!("search endpoint unavailable ({}), filtering locally", e);
            }
        }

        let markets = self.get_markets(200, 0, None, None, None).await?;
        let needle = query.to_lowercase();
        Ok(markets
            .into_iter()
            .filter(|m| m.question.to_lowercase().contains(&needle))
            .take(limit as usize)
            .collect())
    }

    /// Get markets sorted by 24h volume, descending
    pub async fn get_trending_markets(&self, limit: u32) -> Result<Vec<Market>> {
        let query = [
            ("limit", limit.to_string()),
            ("active", "true".to_string()),
            ("closed", "false".to_string()),
            ("order", "volume24hr".to_string()),
            ("ascending", "false".to_string()),
        ];
        let value = self.rest.get_json("/markets", &query).await?;
        Ok(parse_market_list(value))
    }
}

fn parse_market_list(value: serde_json::Value) -> Vec<Market> {
    list_payload(value)
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawMarket>(v).ok())
        .filter_map(parse_market)
        .collect()
}

fn parse_decimal(s: &Option<String>) -> Decimal {
    s.as_ref()
        .and_then(|v| v.parse().ok())
        .unwrap_or(Decimal::ZERO)
}

fn parse_opt_decimal(s: &Option<String>) -> Option<Decimal> {
    s.as_ref().and_then(|v| v.parse().ok())
}

fn parse_opt_f64(s: &Option<String>) -> Option<f64> {
    s.as_ref().and_then(|v| v.parse().ok())
}

fn parse_market(raw: RawMarket) -> Option<Market> {
    // Outcome prices arrive as a string array like ["0.55", "0.45"]
    let prices: Vec<f64> = raw
        .outcome_prices
        .as_ref()
        .and_then(|s| {
            if let Ok(string_prices) = serde_json::from_str::<Vec<String>>(s) {
                let parsed: Vec<f64> = string_prices
                    .iter()
                    .filter_map(|p| p.parse::<f64>().ok())
                    .collect();
                if !parsed.is_empty() {
                    return Some(parsed);
                }
            }
            serde_json::from_str(s).ok()
        })
        .unwrap_or_default();

    let token_ids: Vec<String> = raw
        .clob_token_ids
        .as_ref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();

    let outcome_names: Vec<String> = raw
        .outcomes
        .as_ref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_else(|| vec!["Yes".to_string(), "No".to_string()]);

    let outcomes: Vec<Outcome> = outcome_names
        .into_iter()
        .enumerate()
        .map(|(i, name)| Outcome {
            token_id: token_ids.get(i).cloned().unwrap_or_default(),
            outcome: name,
            price: prices
                .get(i)
                .map(|&p| Decimal::try_from(p).unwrap_or(Decimal::ZERO))
                .unwrap_or(Decimal::ZERO),
        })
        .collect();

    Some(Market {
        id: raw.id,
        slug: raw.slug,
        question: raw.question,
        description: raw.description,
        category: raw.category,
        resolution_source: raw.resolution_source,
        end_date: raw.end_date.as_ref().and_then(|s| s.parse().ok()),
        volume: parse_decimal(&raw.volume),
        volume_24h: parse_decimal(&raw.volume_24h),
        liquidity: parse_decimal(&raw.liquidity),
        best_bid: parse_opt_decimal(&raw.best_bid),
        best_ask: parse_opt_decimal(&raw.best_ask),
        spread: parse_opt_decimal(&raw.spread),
        one_day_price_change: parse_opt_f64(&raw.one_day_price_change),
        one_week_price_change: parse_opt_f64(&raw.one_week_price_change),
        one_month_price_change: parse_opt_f64(&raw.one_month_price_change),
        outcomes,
        active: raw.active,
        closed: raw.closed,
    })
}

/// Whether market data is fresh enough to monitor. The active/closed flags
/// are authoritative; the end date is a fallback for markets without them.
pub fn is_market_fresh(market: &Market, max_age_hours: i64, now: DateTime<Utc>) -> bool {
    if market.closed {
        return false;
    }
    if market.active {
        return true;
    }
    match market.end_date {
        Some(end) => end >= now - Duration::hours(max_age_hours),
        // Perpetual markets without an end date need the active flag
        None => false,
    }
}

/// Drop stale, closed, or dead-volume markets before monitoring
pub fn filter_fresh_markets(markets: Vec<Market>, max_age_hours: i64, min_volume: f64) -> Vec<Market> {
    use rust_decimal::prelude::ToPrimitive;

    let now = Utc::now();
    markets
        .into_iter()
        .filter(|m| is_market_fresh(m, max_age_hours, now))
        .filter(|m| {
            let volume = m.volume.to_f64().unwrap_or(0.0);
            let volume_24h = m.volume_24h.to_f64().unwrap_or(0.0);
            volume >= min_volume || volume_24h >= min_volume
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_json(extra: &str) -> String {
        format!(
            r#"{{
                "id": "mkt-1",
                "slug": "will-btc-hit-100k",
                "question": "Will Bitcoin reach $100k?",
                "description": "Resolves YES at $100,000 on Coinbase.",
                "category": "crypto",
                "resolutionSource": "Coinbase spot price",
                "endDate": "2026-12-31T00:00:00Z",
                "volume": "123456.78",
                "volume24hr": "9876.5",
                "liquidity": "55000",
                "bestBid": "0.64",
                "bestAsk": "0.66",
                "spread": "0.02",
                "active": true,
                "closed": false,
                "outcomes": "[\"Yes\", \"No\"]",
                "outcomePrices": "[\"0.65\", \"0.35\"]",
                "clobTokenIds": "[\"tok-yes\", \"tok-no\"]"
                {extra}
            }}"#,
            extra = extra
        )
    }

    #[test]
    fn test_parse_market_string_fields() {
        let raw: RawMarket = serde_json::from_str(&raw_json("")).unwrap();
        let market = parse_market(raw).unwrap();

        assert_eq!(market.id, "mkt-1");
        assert_eq!(market.slug, "will-btc-hit-100k");
        assert_eq!(market.outcomes.len(), 2);
        assert_eq!(market.outcomes[0].token_id, "tok-yes");
        assert_eq!(market.volume.to_string(), "123456.78");
        assert_eq!(market.resolution_source.as_deref(), Some("Coinbase spot price"));
        assert!(market.end_date.is_some());
    }

    #[test]
    fn test_parse_market_price_change_fields() {
        let raw: RawMarket = serde_json::from_str(&raw_json(
            r#", "oneDayPriceChange": "0.0", "oneWeekPriceChange": "0.05""#,
        ))
        .unwrap();
        let market = parse_market(raw).unwrap();

        // 0.0 is a present value, distinct from a missing field
        assert_eq!(market.one_day_price_change, Some(0.0));
        assert_eq!(market.one_week_price_change, Some(0.05));
        assert_eq!(market.one_month_price_change, None);
    }

    #[test]
    fn test_parse_market_missing_outcomes_default_yes_no() {
        let json = r#"{
            "id": "m2",
            "question": "Sparse market?",
            "description": null,
            "volume": null,
            "liquidity": null,
            "active": true,
            "closed": false
        }"#;
        let raw: RawMarket = serde_json::from_str(json).unwrap();
        let market = parse_market(raw).unwrap();

        assert_eq!(market.outcomes.len(), 2);
        assert_eq!(market.outcomes[0].outcome, "Yes");
        assert_eq!(market.volume, Decimal::ZERO);
    }

    #[test]
    fn test_is_market_fresh_flags_are_authoritative() {
        let raw: RawMarket = serde_json::from_str(&raw_json("")).unwrap();
        let mut market = parse_market(raw).unwrap();
        let now = Utc::now();

        assert!(is_market_fresh(&market, 24, now));

        market.closed = true;
        assert!(!is_market_fresh(&market, 24, now));

        market.closed = false;
        market.active = false;
        market.end_date = Some(now - Duration::hours(48));
        assert!(!is_market_fresh(&market, 24, now));

        market.end_date = None;
        assert!(!is_market_fresh(&market, 24, now));
    }
}
