// src/geocode/throttle.rs
//! Minimum-interval pacing for the external geocoder.
//!
//! Runs on the tokio clock, so tests drive it with a paused runtime
//! (`#[tokio::test(start_paused = true)]`) instead of real sleeps.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Wait until at least `min_interval` has passed since the previous
    /// permit, then record this one. The first permit is immediate.
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last {
            let ready_at = last + self.min_interval;
            if Instant::now() < ready_at {
                sleep_until(ready_at).await;
            }
        }
        self.last = Some(Instant::now());
    }
}
