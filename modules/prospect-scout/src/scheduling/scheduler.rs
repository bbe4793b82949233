use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use prospect_common::{Prospect, RefreshLogEntry, RefreshSettings};

use crate::run_log::latest_refresh_by_prospect;

/// Decides which prospects to refresh this run: staleness filter, then
/// status priority, then oldest refresh first, capped at the batch size.
pub struct RefreshScheduler {
    /// Prospects refreshed within this window are skipped.
    stale_after: Duration,
    /// Upper bound on prospects selected per run.
    batch_size: usize,
}

/// Result of scheduling: which prospects to refresh and how many were considered.
#[derive(Debug)]
pub struct RefreshPlan {
    /// Non-archived prospects on the roster.
    pub total: usize,
    /// Prospects that passed the staleness filter.
    pub eligible: usize,
    /// Prospects skipped because they were refreshed recently.
    pub fresh: usize,
    /// Selected prospects in processing order.
    pub selected: Vec<ScheduledProspect>,
}

#[derive(Debug, Clone)]
pub struct ScheduledProspect {
    pub prospect: Prospect,
    pub last_refresh: Option<DateTime<Utc>>,
    pub reason: ScheduleReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleReason {
    /// No run-log entry exists.
    NeverRefreshed,
    /// Last refresh is older than the staleness window.
    Stale,
}

impl RefreshScheduler {
    pub fn new(stale_after: Duration, batch_size: usize) -> Self {
        Self {
            stale_after,
            batch_size,
        }
    }

    pub fn from_settings(settings: &RefreshSettings) -> Self {
        Self::new(settings.stale_after, settings.batch_size)
    }

    /// A scheduler with the same window but a tighter cap.
    pub fn with_batch_size(&self, batch_size: usize) -> Self {
        Self::new(self.stale_after, batch_size)
    }

    /// Plan this run from the roster and the run log.
    pub fn plan(
        &self,
        prospects: Vec<Prospect>,
        log: &[RefreshLogEntry],
        now: DateTime<Utc>,
    ) -> RefreshPlan {
        let latest = latest_refresh_by_prospect(log);

        let mut total = 0usize;
        let mut fresh = 0usize;
        let mut candidates = Vec::new();

        for prospect in prospects.into_iter().filter(|p| !p.archived) {
            total += 1;
            let last_refresh = latest.get(&prospect.id).copied();
            if !self.is_stale(last_refresh, now) {
                fresh += 1;
                continue;
            }
            candidates.push(ScheduledProspect {
                reason: if last_refresh.is_none() {
                    ScheduleReason::NeverRefreshed
                } else {
                    ScheduleReason::Stale
                },
                prospect,
                last_refresh,
            });
        }

        let eligible = candidates.len();
        candidates.sort_by(compare_for_refresh);
        candidates.truncate(self.batch_size);

        info!(
            total,
            eligible,
            fresh,
            selected = candidates.len(),
            "Refresh scheduling complete"
        );

        RefreshPlan {
            total,
            eligible,
            fresh,
            selected: candidates,
        }
    }

    /// Never-refreshed prospects are always stale.
    fn is_stale(&self, last_refresh: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_refresh {
            Some(t) => now - t >= self.stale_after,
            None => true,
        }
    }
}

/// Status priority ascending, then last refresh ascending with never-refreshed first.
fn compare_for_refresh(a: &ScheduledProspect, b: &ScheduledProspect) -> Ordering {
    a.prospect
        .status
        .priority()
        .cmp(&b.prospect.status.priority())
        .then_with(|| a.last_refresh.cmp(&b.last_refresh))
}
