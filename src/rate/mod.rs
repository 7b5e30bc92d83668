//! Adaptive rate limiting shared across all request-issuing workers.
//!
//! Download workers report HTTP 429 responses as penalty weight; a periodic
//! controller turns that weight into a global inter-request delay (and an
//! advisory concurrency target). Every request sleeps the current delay
//! before it is issued, which is the only mechanism that actually throttles
//! request rate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::RateLimitConfig;

/// How often the controller re-evaluates the penalty weight.
const CONTROLLER_PERIOD: Duration = Duration::from_secs(1);

/// Step size for delay adjustments, in seconds.
const DELAY_STEP: f64 = 0.5;

/// Shared throttling state, guarded by a single mutex.
#[derive(Debug, Clone, PartialEq)]
pub struct RateState {
    /// Recent server-side throttling pressure (429 responses).
    pub penalty_weight: u32,
    /// Mandatory sleep before every request, in seconds.
    pub delay_seconds: f64,
    /// Advisory worker-pool size target. Computed by the controller but
    /// never used to resize the live pool; exposed for observability only.
    pub desired_concurrency: usize,
}

/// Shared rate limiter handed to every request-issuing worker.
pub struct RateLimiter {
    state: Mutex<RateState>,
    initial_delay: f64,
    max_penalty_weight: u32,
    max_concurrency: usize,
    backoff_factor: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, max_concurrency: usize) -> Self {
        Self {
            state: Mutex::new(RateState {
                penalty_weight: 0,
                delay_seconds: config.initial_delay_seconds,
                desired_concurrency: max_concurrency,
            }),
            initial_delay: config.initial_delay_seconds,
            max_penalty_weight: config.max_penalty_weight,
            max_concurrency,
            backoff_factor: config.backoff_factor,
        }
    }

    /// Record an HTTP 429 response.
    pub async fn record_throttle(&self) {
        let mut state = self.state.lock().await;
        state.penalty_weight += 1;
    }

    /// Record a successful download, easing the pressure estimate.
    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.penalty_weight = state.penalty_weight.saturating_sub(1);
    }

    /// Sleep the current inter-request delay. Called before every request.
    pub async fn wait_before_request(&self) {
        let delay = {
            let state = self.state.lock().await;
            state.delay_seconds
        };
        if delay > 0.0 {
            sleep(Duration::from_secs_f64(delay)).await;
        }
    }

    /// Backoff duration for the given retry attempt (1-based) after a 429.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.backoff_factor * attempt as f64)
    }

    /// Current state, for logging and stats.
    pub async fn snapshot(&self) -> RateState {
        self.state.lock().await.clone()
    }

    /// Apply one controller step.
    ///
    /// Weight at or above the maximum backs off: longer delay, lower
    /// concurrency target. Weight at zero recovers: shorter delay (floored at
    /// the initial delay), higher target. Anything in between is left alone,
    /// giving the controller a hysteresis band.
    pub async fn adjust_once(&self) {
        let mut state = self.state.lock().await;
        if state.penalty_weight >= self.max_penalty_weight {
            state.delay_seconds += DELAY_STEP;
            state.desired_concurrency = state.desired_concurrency.saturating_sub(1).max(1);
        } else if state.penalty_weight == 0 {
            state.delay_seconds = (state.delay_seconds - DELAY_STEP).max(self.initial_delay);
            state.desired_concurrency = (state.desired_concurrency + 1).min(self.max_concurrency);
        }
    }
}

/// Periodic control loop. Runs until `stop` is cancelled, then exits.
pub async fn run_controller(limiter: Arc<RateLimiter>, stop: CancellationToken) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = sleep(CONTROLLER_PERIOD) => {
                limiter.adjust_once().await;
                let state = limiter.snapshot().await;
                tracing::trace!(
                    weight = state.penalty_weight,
                    delay = state.delay_seconds,
                    concurrency = state.desired_concurrency,
                    "rate controller tick"
                );
            }
        }
    }
    tracing::debug!("rate controller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_limiter(initial_delay: f64, max_weight: u32, max_concurrency: usize) -> RateLimiter {
        RateLimiter::new(
            &RateLimitConfig {
                initial_delay_seconds: initial_delay,
                max_penalty_weight: max_weight,
                backoff_factor: 1.0,
            },
            max_concurrency,
        )
    }

    #[tokio::test]
    async fn test_backs_off_at_max_weight() {
        let limiter = make_limiter(1.0, 3, 8);
        for _ in 0..3 {
            limiter.record_throttle().await;
        }

        limiter.adjust_once().await;
        let state = limiter.snapshot().await;
        assert_eq!(state.delay_seconds, 1.5);
        assert_eq!(state.desired_concurrency, 7);
    }

    #[tokio::test]
    async fn test_recovers_at_zero_weight() {
        let limiter = make_limiter(1.0, 3, 8);
        for _ in 0..3 {
            limiter.record_throttle().await;
        }
        limiter.adjust_once().await;
        limiter.adjust_once().await;

        for _ in 0..3 {
            limiter.record_success().await;
        }
        limiter.adjust_once().await;
        let state = limiter.snapshot().await;
        assert_eq!(state.delay_seconds, 1.5);
        assert_eq!(state.desired_concurrency, 7);
    }

    #[tokio::test]
    async fn test_delay_never_drops_below_initial() {
        let limiter = make_limiter(2.0, 5, 4);
        for _ in 0..20 {
            limiter.adjust_once().await;
        }
        let state = limiter.snapshot().await;
        assert_eq!(state.delay_seconds, 2.0);
        assert_eq!(state.desired_concurrency, 4);
    }

    #[tokio::test]
    async fn test_hysteresis_band_holds() {
        let limiter = make_limiter(1.0, 5, 8);
        limiter.record_throttle().await;
        limiter.record_throttle().await;

        let before = limiter.snapshot().await;
        for _ in 0..10 {
            limiter.adjust_once().await;
        }
        let after = limiter.snapshot().await;
        assert_eq!(before.delay_seconds, after.delay_seconds);
        assert_eq!(before.desired_concurrency, after.desired_concurrency);
    }

    #[tokio::test]
    async fn test_concurrency_floors_at_one() {
        let limiter = make_limiter(1.0, 1, 2);
        for _ in 0..10 {
            limiter.record_throttle().await;
            limiter.adjust_once().await;
        }
        let state = limiter.snapshot().await;
        assert_eq!(state.desired_concurrency, 1);
        assert_eq!(state.delay_seconds, 6.0);
    }

    #[tokio::test]
    async fn test_weight_floors_at_zero() {
        let limiter = make_limiter(1.0, 5, 8);
        limiter.record_success().await;
        limiter.record_success().await;
        let state = limiter.snapshot().await;
        assert_eq!(state.penalty_weight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_controller_stops_on_cancel() {
        let limiter = Arc::new(make_limiter(1.0, 5, 8));
        let stop = CancellationToken::new();
        let handle = tokio::spawn(run_controller(limiter.clone(), stop.clone()));

        // Weight pinned at max: every tick should widen the delay.
        for _ in 0..5 {
            limiter.record_throttle().await;
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
        stop.cancel();
        handle.await.unwrap();

        let state = limiter.snapshot().await;
        assert!(state.delay_seconds >= 2.0, "delay was {}", state.delay_seconds);
    }

    #[tokio::test]
    async fn test_backoff_scales_with_attempt() {
        let limiter = make_limiter(1.0, 5, 8);
        assert_eq!(limiter.backoff_for_attempt(1), Duration::from_secs(1));
        assert_eq!(limiter.backoff_for_attempt(3), Duration::from_secs(3));
    }
}
