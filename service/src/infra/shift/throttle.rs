//! [`Throttle`] spacing out requests to the SHiFT website.

use std::time::Duration;

use tokio::{
    sync::Mutex,
    time::{self, Instant},
};

/// Guarantees at least the configured delay between consecutive requests.
///
/// The timestamp is shared by every throttled operation, so code checks and
/// redemptions are spaced out together.
#[derive(Debug)]
pub struct Throttle {
    /// Minimal delay between two consecutive requests.
    delay: Duration,

    /// [`Instant`] of the last request, if any.
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Creates a new [`Throttle`] with the provided `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Mutex::new(None),
        }
    }

    /// Waits until a new request is allowed and marks it as sent.
    ///
    /// Concurrent callers are queued, so they're spaced out as well.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(at) = *last {
            time::sleep_until(at + self.delay).await;
        }
        *last = Some(Instant::now());
    }
}
