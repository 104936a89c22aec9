//! Reconnect delay policy for socket panels.

use std::time::Duration;

use rand::Rng;

/// Unlimited-retry backoff: the delay doubles from `initial_delay` up to `max_delay`,
/// each attempt bounded by `handshake_timeout`.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub handshake_timeout: Duration,
    /// Fraction of the base delay added as random jitter, in `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(20),
            jitter: 0.5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (zero based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Delay before retry number `attempt` with random jitter, never above `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }

        let spread = base.mul_f64(self.jitter.min(1.0));
        let extra = rand::rng().random_range(0.0..=1.0);
        (base + spread.mul_f64(extra)).min(self.max_delay)
    }
}
