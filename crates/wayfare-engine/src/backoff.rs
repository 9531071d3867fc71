//! Exponential retry delay for "not yet" answers.

use std::time::Duration;

use crate::config::BackoffConfig;
use crate::lifecycle::ShutdownSignal;

/// Exponential backoff between retries of a refused request.
///
/// The delay starts at `initial_delay_us`, grows by `backoff_factor`
/// after every wait, and saturates at `max_delay_us`.
#[derive(Clone, Debug)]
pub struct RetryBackoff {
    initial_us: u64,
    factor: f64,
    max_us: u64,
    current_us: u64,
}

impl RetryBackoff {
    /// Create a backoff from a validated config.
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            initial_us: config.initial_delay_us,
            factor: config.backoff_factor,
            max_us: config.max_delay_us,
            current_us: config.initial_delay_us,
        }
    }

    /// The delay the next [`wait`](Self::wait) will sleep.
    pub fn current(&self) -> Duration {
        Duration::from_micros(self.current_us)
    }

    /// Sleep the current delay, then grow it.
    ///
    /// Returns `false` if shutdown interrupted the sleep.
    pub fn wait(&mut self, shutdown: &ShutdownSignal) -> bool {
        let completed = shutdown.sleep(self.current());
        self.advance();
        completed
    }

    /// Return to the initial delay after a success.
    pub fn reset(&mut self) {
        self.current_us = self.initial_us;
    }

    fn advance(&mut self) {
        let next = (self.current_us as f64 * self.factor).min(self.max_us as f64);
        self.current_us = (next as u64).max(self.initial_us);
    }
}
