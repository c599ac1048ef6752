//! Periodic tick driving live scanning.
//!
//! The controller never sleeps on its own; a `Ticker` decides when the next
//! attempt is evaluated, so tests can step ticks without wall-clock delays.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

#[async_trait(?Send)]
pub trait Ticker {
    /// Completes when the next tick is due.
    async fn tick(&mut self);
}

/// Fixed-period ticker backed by `tokio::time::interval`.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        // A slow OCR call must not cause a burst of catch-up ticks
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait(?Send)]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticker_period() {
        let mut ticker = IntervalTicker::new(Duration::from_millis(1500));
        let start = Instant::now();

        // First tick fires immediately
        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        ticker.tick().await;
        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }
}
