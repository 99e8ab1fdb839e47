//! Resilient HTTP core shared by the REST clients
//!
//! Retry/backoff policy:
//! - 429: honor `Retry-After` capped at 60s, else `min(2^attempt * 2, 30)`;
//!   retries until the attempt budget runs out.
//! - 5xx: `2^attempt` backoff, except the final attempt returns the response
//!   for the caller to inspect.
//! - timeout / connection failure: `2^attempt` backoff, typed
//!   `RequestFailed` after exhaustion.
//! - other 4xx: typed `ClientError` immediately, no retry.

use crate::client::rate_limit::RateLimiter;
use crate::error::{MonitorError, Result};
use reqwest::{Client, Method, Response, StatusCode};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 15;
const RETRY_AFTER_CAP_SECS: u64 = 60;
const BACKOFF_CAP_SECS: u64 = 30;

/// What to do with an HTTP response at a given attempt index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Hand the response to the caller.
    Return,
    /// Sleep this many seconds, then try again.
    RetryAfter(u64),
    /// Surface a typed client error, no retry.
    Reject,
}

/// Backoff for a rate-limited response. A parseable non-negative
/// `Retry-After` wins (capped at 60s); anything else falls back to
/// exponential backoff capped at 30s.
pub fn backoff_429(attempt: u32, retry_after: Option<&str>) -> u64 {
    if let Some(value) = retry_after {
        if let Ok(secs) = value.trim().parse::<u64>() {
            return secs.min(RETRY_AFTER_CAP_SECS);
        }
    }
    (2u64.saturating_pow(attempt) * 2).min(BACKOFF_CAP_SECS)
}

/// Backoff for timeouts, connection failures and retryable 5xx.
pub fn backoff_transient(attempt: u32) -> u64 {
    2u64.saturating_pow(attempt)
}

/// Classify a status code into a retry decision for `attempt` (0-based) out
/// of `retries` total attempts.
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<&str>,
    attempt: u32,
    retries: u32,
) -> RetryDecision {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return RetryDecision::RetryAfter(backoff_429(attempt, retry_after));
    }
    if status.is_server_error() {
        if attempt + 1 < retries {
            return RetryDecision::RetryAfter(backoff_transient(attempt));
        }
        // Final attempt: the caller gets the 5xx response to inspect.
        return RetryDecision::Return;
    }
    if status.is_client_error() {
        return RetryDecision::Reject;
    }
    RetryDecision::Return
}

/// Extract the list items from a JSON response body. List endpoints return
/// either a bare array or a `{"data": [...]}` envelope.
pub fn list_payload(value: serde_json::Value) -> Vec<serde_json::Value> {
    match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("data") {
            Some(serde_json::Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// HTTP client with retry/backoff and optional request spacing.
pub struct RestClient {
    http: Client,
    base_url: String,
    retries: u32,
    limiter: Option<Mutex<RateLimiter>>,
}

impl RestClient {
    pub fn new(base_url: &str, retries: u32, api_key: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));

        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| MonitorError::Config(format!("invalid API key: {}", e)))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            retries: retries.max(1),
            limiter: None,
        })
    }

    /// Attach a rate limiter; every attempt consumes one slot.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(Mutex::new(limiter));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a request under the retry policy. Returns the response for 2xx
    /// and for a 5xx on the final attempt; other outcomes map to typed
    /// errors.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        let operation = format!("{} {}", method, url);
        let mut last_error: Option<reqwest::Error> = None;

        for attempt in 0..self.retries {
            if let Some(limiter) = &self.limiter {
                limiter.lock().await.wait_if_needed().await;
            }

            let result = self
                .http
                .request(method.clone(), &url)
                .query(query)
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    if attempt + 1 < self.retries {
                        let wait = backoff_transient(attempt);
                        warn!("{} failed ({}), retrying in {}s", operation, e, wait);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        last_error = Some(e);
                        continue;
                    }
                    return Err(MonitorError::RequestFailed {
                        operation,
                        attempts: self.retries,
                        source: Some(e),
                    });
                }
            };

            let status = response.status();
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            match classify_status(status, retry_after.as_deref(), attempt, self.retries) {
                RetryDecision::Return => {
                    debug!("{} -> {}", operation, status);
                    return Ok(response);
                }
                RetryDecision::RetryAfter(wait) => {
                    warn!("{} -> {}, retrying in {}s", operation, status, wait);
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                RetryDecision::Reject => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(MonitorError::ClientError {
                        operation,
                        status: status.as_u16(),
                        body,
                    });
                }
            }
        }

        // Only reachable when every attempt was rate limited.
        Err(MonitorError::RequestFailed {
            operation,
            attempts: self.retries,
            source: last_error,
        })
    }

    /// Request and deserialize a JSON body. A 5xx that survived every retry
    /// surfaces as `RequestFailed` here, since there is no body to hand
    /// back.
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        let response = self.request(Method::GET, path, query).await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(MonitorError::RequestFailed {
                operation: format!("GET {}{}", self.base_url, path),
                attempts: self.retries,
                source: None,
            });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_header_capped_at_60() {
        assert_eq!(backoff_429(0, Some("120")), 60);
    }

    #[test]
    fn test_retry_after_header_below_cap() {
        assert_eq!(backoff_429(0, Some("5")), 5);
    }

    #[test]
    fn test_retry_after_unparseable_falls_back_to_backoff() {
        // Attempt 0: 2^0 * 2 = 2
        assert_eq!(backoff_429(0, Some("not-a-number")), 2);
        // Attempt 2: 2^2 * 2 = 8
        assert_eq!(backoff_429(2, Some("not-a-number")), 8);
        // Attempt 5: 2^5 * 2 = 64, capped at 30
        assert_eq!(backoff_429(5, None), 30);
    }

    #[test]
    fn test_negative_retry_after_falls_back() {
        assert_eq!(backoff_429(1, Some("-3")), 4);
    }

    #[test]
    fn test_transient_backoff_doubles() {
        assert_eq!(backoff_transient(0), 1);
        assert_eq!(backoff_transient(1), 2);
        assert_eq!(backoff_transient(3), 8);
    }

    #[test]
    fn test_429_retries_on_every_attempt() {
        // Rate limiting keeps retrying through the final attempt
        let decision = classify_status(StatusCode::TOO_MANY_REQUESTS, Some("5"), 2, 3);
        assert_eq!(decision, RetryDecision::RetryAfter(5));
    }

    #[test]
    fn test_5xx_returned_on_final_attempt() {
        let decision = classify_status(StatusCode::INTERNAL_SERVER_ERROR, None, 0, 3);
        assert_eq!(decision, RetryDecision::RetryAfter(1));

        let decision = classify_status(StatusCode::INTERNAL_SERVER_ERROR, None, 2, 3);
        assert_eq!(decision, RetryDecision::Return);
    }

    #[test]
    fn test_4xx_rejected_without_retry() {
        let decision = classify_status(StatusCode::NOT_FOUND, None, 0, 3);
        assert_eq!(decision, RetryDecision::Reject);
        let decision = classify_status(StatusCode::BAD_REQUEST, None, 1, 3);
        assert_eq!(decision, RetryDecision::Reject);
    }

    #[test]
    fn test_2xx_returned_immediately() {
        let decision = classify_status(StatusCode::OK, None, 0, 3);
        assert_eq!(decision, RetryDecision::Return);
    }

    #[test]
    fn test_list_payload_bare_array() {
        let value = serde_json::json!([{"id": "a"}, {"id": "b"}]);
        assert_eq!(list_payload(value).len(), 2);
    }

    #[test]
    fn test_list_payload_data_envelope() {
        let value = serde_json::json!({"data": [{"id": "a"}], "next_cursor": "x"});
        assert_eq!(list_payload(value).len(), 1);
    }

    #[test]
    fn test_list_payload_unexpected_shape() {
        assert!(list_payload(serde_json::json!({"error": "nope"})).is_empty());
        assert!(list_payload(serde_json::json!("string")).is_empty());
    }
}
