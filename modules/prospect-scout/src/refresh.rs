//! Scheduled refresh: one bounded, sequential pass over the stalest prospects.
//!
//! Plan (roster + run log) → for each selected prospect:
//! fetch → sort by relevance → dedup → insert → upsert run log → sleep.
//!
//! Prospects are processed one at a time because the provider rate limit is
//! per caller. A failure is recorded against that prospect and the loop moves
//! on; only failing to load the roster or the log aborts the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use prospect_common::{
    BatchRunSummary, IntelligenceItem, Prospect, ProspectOutcome, RefreshError, RefreshLogEntry,
    RefreshSettings, RefreshStatus,
};

use crate::dedup::{dedup, sort_by_relevance};
use crate::scheduling::{RefreshScheduler, TimeBudget};
use crate::traits::{CandidateFetcher, ItemStore, ProspectReader, RefreshLogStore};

/// Fetch and insert yield for one prospect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Yield {
    found: u32,
    inserted: u32,
}

/// Dependencies and settings for scheduled refresh runs.
/// Holds a run lock so overlapping triggers cannot interleave batches.
#[derive(TypedBuilder)]
pub struct ScheduledRefresh {
    prospects: Arc<dyn ProspectReader>,
    items: Arc<dyn ItemStore>,
    run_log: Arc<dyn RefreshLogStore>,
    fetcher: Arc<dyn CandidateFetcher>,
    #[builder(default)]
    settings: RefreshSettings,
    /// Set to stop the batch before the next prospect.
    #[builder(default)]
    cancel: Arc<AtomicBool>,
    #[builder(default, setter(skip))]
    lock: Mutex<()>,
}

impl ScheduledRefresh {
    pub fn settings(&self) -> &RefreshSettings {
        &self.settings
    }

    /// Handle for stopping an in-flight run.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Run one scheduled refresh using the current time.
    pub async fn run(&self) -> Result<BatchRunSummary, RefreshError> {
        self.run_at(Utc::now()).await
    }

    /// Run one scheduled refresh, judging staleness as of `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<BatchRunSummary, RefreshError> {
        let _guard = self
            .lock
            .try_lock()
            .map_err(|_| RefreshError::RefreshInProgress)?;
        self.settings.validate()?;

        // Reset cancel flag at the start of each run
        self.cancel.store(false, Ordering::Relaxed);

        let budget = TimeBudget::start(&self.settings);

        let roster = self
            .prospects
            .active_prospects()
            .await
            .map_err(|e| RefreshError::database(&e.context("Failed to load prospect roster")))?;
        let log = self
            .run_log
            .load_all()
            .await
            .map_err(|e| RefreshError::database(&e.context("Failed to load refresh log")))?;

        let scheduler = RefreshScheduler::from_settings(&self.settings);
        let capacity = budget.batch_capacity();
        let scheduler = if capacity < self.settings.batch_size {
            info!(
                capacity,
                configured = self.settings.batch_size,
                "Time budget shrinks batch"
            );
            scheduler.with_batch_size(capacity)
        } else {
            scheduler
        };
        let plan = scheduler.plan(roster, &log, now);

        let mut summary = BatchRunSummary {
            total_prospects: plan.total as u32,
            eligible: plan.eligible as u32,
            ..Default::default()
        };

        if plan.selected.is_empty() {
            info!("No stale prospects to refresh");
            summary.duration_ms = budget.elapsed().as_millis() as u64;
            return Ok(summary);
        }

        let selected = plan.selected.len();
        for (position, scheduled) in plan.selected.into_iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                warn!(remaining = selected - position, "Scheduled refresh cancelled");
                summary.deferred = (selected - position) as u32;
                break;
            }
            // The first prospect always runs so a tight budget cannot stall the queue.
            if position > 0 && !budget.can_start_next() {
                summary.deferred = (selected - position) as u32;
                break;
            }

            let prospect = scheduled.prospect;
            let elapsed = chrono::Duration::from_std(budget.elapsed())
                .unwrap_or_else(|_| chrono::Duration::zero());
            let at = now + elapsed;
            let fetch_limit = budget.is_active().then(|| budget.remaining());
            let outcome = self.refresh_prospect(&prospect, at, fetch_limit).await;

            summary.batch_size += 1;
            summary.items_inserted += outcome.items_inserted;
            if outcome.status == RefreshStatus::Error {
                summary.errors += 1;
            }
            summary.outcomes.push(outcome);

            // Rate limit applies after every prospect, including failures.
            if !self.settings.delay.is_zero() {
                tokio::time::sleep(self.settings.delay).await;
            }
        }

        budget.log_status();
        summary.duration_ms = budget.elapsed().as_millis() as u64;
        info!(
            processed = summary.batch_size,
            inserted = summary.items_inserted,
            errors = summary.errors,
            deferred = summary.deferred,
            "Scheduled refresh complete"
        );
        Ok(summary)
    }

    /// Run the pipeline for one prospect and record the outcome in the run log.
    async fn refresh_prospect(
        &self,
        prospect: &Prospect,
        at: DateTime<Utc>,
        fetch_limit: Option<Duration>,
    ) -> ProspectOutcome {
        let result = self.fetch_and_store(prospect, at, fetch_limit).await;

        let (entry, mut outcome) = match result {
            Ok(y) => {
                info!(
                    prospect_id = %prospect.id,
                    company = prospect.company.as_str(),
                    found = y.found,
                    inserted = y.inserted,
                    "Prospect refreshed"
                );
                (
                    RefreshLogEntry::success(prospect.id, y.found, at),
                    ProspectOutcome {
                        prospect_id: prospect.id,
                        company: prospect.company.clone(),
                        status: RefreshStatus::Success,
                        items_found: y.found,
                        items_inserted: y.inserted,
                        error: None,
                    },
                )
            }
            Err(e) => {
                let message = e.to_string();
                warn!(
                    prospect_id = %prospect.id,
                    company = prospect.company.as_str(),
                    error = message.as_str(),
                    "Prospect refresh failed"
                );
                (
                    RefreshLogEntry::failure(prospect.id, message.clone(), at),
                    ProspectOutcome {
                        prospect_id: prospect.id,
                        company: prospect.company.clone(),
                        status: RefreshStatus::Error,
                        items_found: 0,
                        items_inserted: 0,
                        error: Some(message),
                    },
                )
            }
        };

        if let Err(e) = self.run_log.upsert(&entry).await {
            warn!(prospect_id = %prospect.id, error = %e, "Failed to write refresh log entry");
            let note = format!("refresh log write failed: {e:#}");
            outcome.status = RefreshStatus::Error;
            outcome.error = Some(match outcome.error.take() {
                Some(prior) => format!("{prior}; {note}"),
                None => note,
            });
        }

        outcome
    }

    async fn fetch_and_store(
        &self,
        prospect: &Prospect,
        at: DateTime<Utc>,
        fetch_limit: Option<Duration>,
    ) -> Result<Yield, RefreshError> {
        let identity = prospect.identity();
        let fetch = self.fetcher.fetch_candidates(&identity);
        let fetched = match fetch_limit {
            Some(limit) => tokio::time::timeout(limit, fetch).await.map_err(|_| {
                RefreshError::Fetch(format!(
                    "Provider lookup exceeded the remaining time budget ({}ms)",
                    limit.as_millis()
                ))
            })?,
            None => fetch.await,
        };
        let mut candidates = fetched.map_err(|e| RefreshError::fetch(&e))?;
        let found = candidates.len() as u32;
        if candidates.is_empty() {
            return Ok(Yield { found, inserted: 0 });
        }

        sort_by_relevance(&mut candidates);

        let existing = self
            .items
            .existing_keys(prospect.id)
            .await
            .map_err(|e| RefreshError::database(&e))?;
        let fresh = dedup(candidates, &existing);
        if fresh.is_empty() {
            return Ok(Yield { found, inserted: 0 });
        }

        let items: Vec<IntelligenceItem> = fresh
            .into_iter()
            .map(|c| IntelligenceItem::from_candidate(c, Some(prospect.id), at))
            .collect();
        let inserted = self
            .items
            .insert_items(&items)
            .await
            .map_err(|e| RefreshError::database(&e))?;

        Ok(Yield {
            found,
            inserted: inserted as u32,
        })
    }
}
