//! Request spacing for rate-limited APIs

use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum interval between outbound requests.
///
/// Not internally synchronized: each limiter belongs to a single logical
/// client. Callers that share one across tasks must wrap it in a mutex so
/// the last-request marker is updated serially.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        Self {
            min_interval: Duration::from_secs_f64(60.0 / rpm as f64),
            last_request: None,
        }
    }

    /// Suspend until the minimum interval since the previous call has
    /// elapsed, then record the current instant. The first call never waits.
    pub async fn wait_if_needed(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_interval_from_rpm() {
        let limiter = RateLimiter::new(60);
        assert_eq!(limiter.min_interval(), Duration::from_secs(1));

        let limiter = RateLimiter::new(120);
        assert_eq!(limiter.min_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_rpm_clamped() {
        let limiter = RateLimiter::new(0);
        assert_eq!(limiter.min_interval(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_first_call_does_not_wait() {
        let mut limiter = RateLimiter::new(1);
        let start = Instant::now();
        limiter.wait_if_needed().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_consecutive_calls_are_spaced() {
        // 1200 rpm = 50ms interval; three calls must span >= 100ms
        let mut limiter = RateLimiter::new(1200);
        let start = Instant::now();
        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
