use std::time::Duration;

use rand::Rng;

use crate::{configs::ReconnectConfig, gateway::constants::BACKOFF_MAX_EXPONENT};

/// Exponential reconnect backoff with optional jitter and an attempt cap.
pub(crate) struct Backoff {
    attempt: u32,
    base_ms: u64,
    max_ms: u64,
    max_attempts: u32,
    jitter: bool,
}

impl Backoff {
    pub(crate) fn new(config: &ReconnectConfig) -> Self {
        Self {
            attempt: 0,
            base_ms: config.base_delay_ms.max(1),
            max_ms: config.max_delay_ms.max(config.base_delay_ms.max(1)),
            max_attempts: config.max_attempts,
            jitter: config.jitter,
        }
    }

    /// Delay before the next attempt: `base * 2^n`, capped, then reduced by
    /// up to a quarter when jitter is enabled.
    pub(crate) fn next(&mut self) -> Duration {
        self.attempt += 1;
        let exponent = (self.attempt - 1).min(BACKOFF_MAX_EXPONENT);
        let mut delay = self
            .base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_ms);

        if self.jitter {
            delay -= rand::thread_rng().gen_range(0..=delay / 4);
        }
        Duration::from_millis(delay)
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Always false when `max_attempts` is 0.
    pub(crate) fn is_exhausted(&self) -> bool {
        self.max_attempts != 0 && self.attempt >= self.max_attempts
    }

    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }
}
