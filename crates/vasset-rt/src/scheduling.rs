//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Periodic tick source for simulation runners."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

/// Async rate limiter producing one tick per period.
///
/// The first tick fires one full period after construction. Missed ticks are
/// delayed rather than bursted.
#[derive(Debug)]
pub struct RateLimiter {
    interval: tokio::time::Interval,
}

impl RateLimiter {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_period() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Duration::from_millis(500));
        let first = limiter.tick().await;
        assert_eq!(first - start, Duration::from_millis(500));
        let second = limiter.tick().await;
        assert_eq!(second - first, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn late_tick_delays_the_schedule() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Duration::from_millis(200));
        tokio::time::sleep(Duration::from_millis(500)).await;
        limiter.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        limiter.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(700));
    }
}
