use std::thread;
use std::time::Duration;

/// Bounded exponential backoff applied to every remote call in the pipeline.
/// The policy is a value passed in at construction, not a global, so tests
/// can drive it with a zero base delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before retrying after the given 1-based attempt. Doubles per
    /// attempt, capped at 2^6 times the base.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(6);
        self.base_delay * (1u32 << exponent)
    }

    /// Runs `op` until it succeeds or the attempt budget is spent, sleeping
    /// between attempts. `on_error` is invoked with the attempt number for
    /// every failure so callers can log context.
    pub fn run<T, E>(
        &self,
        mut op: impl FnMut() -> Result<T, E>,
        mut on_error: impl FnMut(u32, &E),
    ) -> Result<T, E> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    on_error(attempt, &err);
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    thread::sleep(self.delay_for(attempt));
                }
            }
        }
    }
}
