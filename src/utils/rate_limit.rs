//! Client-side request pacing for rate-limited APIs.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorLimiter};
use nonzero_ext::nonzero;
use std::sync::Arc;
use std::time::Duration;

/// Longest spacing a positive rate is stretched to
const MAX_PERIOD: Duration = Duration::from_secs(3600);

/// Paces outgoing requests to at most `requests_per_second`, with a burst of one
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    period: Duration,
}

impl RateLimiter {
    /// Returns `None` when the rate is zero, negative or not finite (unlimited)
    pub fn per_second(requests_per_second: f32) -> Option<Self> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return None;
        }
        let period = Duration::try_from_secs_f64(1.0 / requests_per_second as f64)
            .unwrap_or(MAX_PERIOD)
            .min(MAX_PERIOD);
        let quota = Quota::with_period(period)?.allow_burst(nonzero!(1u32));

        Some(Self {
            limiter: Arc::new(GovernorLimiter::direct(quota)),
            period,
        })
    }

    /// Wait until the next request may be sent
    pub async fn until_ready(&self) {
        self.limiter.until_ready().await;
    }

    /// Minimum spacing between requests
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("period", &self.period)
            .finish()
    }
}
