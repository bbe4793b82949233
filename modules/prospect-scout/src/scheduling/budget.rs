use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use prospect_common::RefreshSettings;

/// Tracks wall-clock spend against the invocation's time budget.
/// A zero `max_duration` means unlimited.
pub struct TimeBudget {
    /// Budget usable for prospect work (max duration minus reserve).
    usable: Duration,
    /// Expected cost of one prospect: fetch latency plus the rate-limit delay.
    per_prospect: Duration,
    /// Expected fetch latency alone; the delay after the last prospect may overrun.
    fetch_latency: Duration,
    started: Instant,
    unlimited: bool,
}

impl TimeBudget {
    pub fn start(settings: &RefreshSettings) -> Self {
        let usable = if settings.reserve < settings.max_duration {
            settings.max_duration - settings.reserve
        } else {
            if !settings.max_duration.is_zero() {
                warn!(
                    max_duration_secs = settings.max_duration.as_secs(),
                    reserve_secs = settings.reserve.as_secs(),
                    "Reserve covers the whole time budget, ignoring it"
                );
            }
            settings.max_duration
        };
        Self {
            usable,
            per_prospect: settings.expected_fetch_latency + settings.delay,
            fetch_latency: settings.expected_fetch_latency,
            started: Instant::now(),
            unlimited: settings.max_duration.is_zero(),
        }
    }

    /// How many prospects fit in the budget. Never below one.
    pub fn batch_capacity(&self) -> usize {
        if self.unlimited || self.per_prospect.is_zero() {
            return usize::MAX;
        }
        let fits = (self.usable.as_millis() / self.per_prospect.as_millis().max(1)) as usize;
        fits.max(1)
    }

    /// Whether another fetch is expected to finish inside the budget.
    pub fn can_start_next(&self) -> bool {
        if self.unlimited {
            return true;
        }
        let projected = self.elapsed() + self.fetch_latency;
        if projected > self.usable {
            warn!(
                elapsed_ms = self.elapsed().as_millis() as u64,
                usable_ms = self.usable.as_millis() as u64,
                "Time budget exhausted"
            );
            return false;
        }
        true
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time remaining (Duration::MAX if unlimited).
    pub fn remaining(&self) -> Duration {
        if self.unlimited {
            return Duration::MAX;
        }
        self.usable.saturating_sub(self.elapsed())
    }

    pub fn is_active(&self) -> bool {
        !self.unlimited
    }

    pub fn log_status(&self) {
        if self.is_active() {
            info!(
                elapsed_ms = self.elapsed().as_millis() as u64,
                remaining_ms = self.remaining().as_millis() as u64,
                usable_ms = self.usable.as_millis() as u64,
                "Time budget status"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(max_secs: u64, reserve_secs: u64, delay_secs: u64, latency_secs: u64) -> RefreshSettings {
        RefreshSettings {
            max_duration: Duration::from_secs(max_secs),
            reserve: Duration::from_secs(reserve_secs),
            delay: Duration::from_secs(delay_secs),
            expected_fetch_latency: Duration::from_secs(latency_secs),
            ..RefreshSettings::default()
        }
    }

    #[test]
    fn default_settings_fit_the_default_batch() {
        let budget = TimeBudget::start(&RefreshSettings::default());
        // (60 - 5) / (2 + 3) = 11
        assert_eq!(budget.batch_capacity(), 11);
    }

    #[test]
    fn tight_budget_shrinks_capacity() {
        let budget = TimeBudget::start(&settings(20, 0, 3, 2));
        assert_eq!(budget.batch_capacity(), 4);
    }

    #[test]
    fn capacity_is_at_least_one() {
        let budget = TimeBudget::start(&settings(6, 1, 3, 10));
        assert_eq!(budget.batch_capacity(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reserve_covering_the_budget_is_ignored() {
        let budget = TimeBudget::start(&settings(5, 5, 3, 2));
        assert_eq!(budget.batch_capacity(), 1);
        assert!(budget.can_start_next());
        assert_eq!(budget.remaining(), Duration::from_secs(5));
    }

    #[test]
    fn tiny_budget_still_has_capacity_for_one() {
        let budget = TimeBudget::start(&settings(1, 5, 3, 2));
        assert_eq!(budget.batch_capacity(), 1);
    }

    #[test]
    fn zero_max_duration_is_unlimited() {
        let budget = TimeBudget::start(&settings(0, 5, 3, 2));
        assert!(!budget.is_active());
        assert_eq!(budget.batch_capacity(), usize::MAX);
        assert!(budget.can_start_next());
        assert_eq!(budget.remaining(), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_blocks_next_prospect() {
        let budget = TimeBudget::start(&settings(20, 0, 3, 2));
        assert!(budget.can_start_next());
        tokio::time::sleep(Duration::from_secs(18)).await;
        assert!(budget.can_start_next());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!budget.can_start_next());
        assert_eq!(budget.remaining(), Duration::from_secs(1));
    }
}
