//! Retrying of fallible operations with an exponential [`Backoff`].

use std::{future::Future, time::Duration};

use rand::Rng as _;
use smart_default::SmartDefault;
use tokio::time;
use tracing as log;

/// Exponential backoff policy.
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Backoff {
    /// Maximum number of attempts, including the first one.
    #[default(3)]
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[default(Duration::from_secs(1))]
    pub initial_delay: Duration,

    /// Upper bound of any delay.
    #[default(Duration::from_secs(10))]
    pub max_delay: Duration,

    /// Multiplier of the delay after each retry.
    #[default(2.0)]
    pub factor: f64,
}

impl Backoff {
    /// Returns the delay to wait before the next attempt, given the
    /// `current` base delay, adding up to 30% of random jitter.
    fn jittered(&self, current: Duration) -> Duration {
        let jitter = current.mul_f64(rand::thread_rng().gen_range(0.0..0.3));
        (current + jitter).min(self.max_delay)
    }

    /// Returns the base delay following the `current` one.
    fn next(&self, current: Duration) -> Duration {
        current.mul_f64(self.factor.max(1.0)).min(self.max_delay)
    }
}

/// Runs the provided `op` until it succeeds, fails with an error not passing
/// the `is_retryable` check, or runs out of [`Backoff::max_attempts`].
///
/// # Errors
///
/// With the last error of the `op`.
pub async fn with_retry<T, E, F, Fut>(
    mut op: F,
    backoff: &Backoff,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = backoff.max_attempts.max(1);
    let mut current = backoff.initial_delay;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= max_attempts || !is_retryable(&e) => {
                return Err(e);
            }
            Err(e) => {
                let delay = backoff.jittered(current);
                log::info!(
                    "attempt {attempt}/{max_attempts} failed: {e}, retrying in \
                     {delay:?}",
                );
                time::sleep(delay).await;
                current = backoff.next(current);
                attempt += 1;
            }
        }
    }
}
