//! Refresh run log: one row per `(prospect_id, source)`, overwritten on every run.
//!
//! The scheduler only ever asks "when was this prospect last refreshed", so the
//! log keeps the latest outcome rather than a history. Postgres gets this from
//! its primary key (`store::postgres`); the in-memory log below keeps an arena
//! of rows plus a key → slot index so a second upsert replaces the first.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use prospect_common::RefreshLogEntry;

use crate::traits::RefreshLogStore;

/// Most recent `last_refresh_at` per prospect, across every source.
pub fn latest_refresh_by_prospect(entries: &[RefreshLogEntry]) -> HashMap<Uuid, DateTime<Utc>> {
    let mut latest: HashMap<Uuid, DateTime<Utc>> = HashMap::with_capacity(entries.len());
    for entry in entries {
        latest
            .entry(entry.prospect_id)
            .and_modify(|t| {
                if entry.last_refresh_at > *t {
                    *t = entry.last_refresh_at;
                }
            })
            .or_insert(entry.last_refresh_at);
    }
    latest
}

// ---------------------------------------------------------------------------
// InMemoryRefreshLog
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LogArena {
    rows: Vec<RefreshLogEntry>,
    index: HashMap<(Uuid, String), usize>,
}

impl LogArena {
    fn upsert(&mut self, entry: RefreshLogEntry) {
        let key = (entry.prospect_id, entry.source.clone());
        match self.index.get(&key) {
            Some(&slot) => self.rows[slot] = entry,
            None => {
                self.index.insert(key, self.rows.len());
                self.rows.push(entry);
            }
        }
    }
}

/// Run log held in process memory. Used by the CLI's dry runs and by tests.
#[derive(Default)]
pub struct InMemoryRefreshLog {
    arena: RwLock<LogArena>,
}

impl InMemoryRefreshLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the log with pre-existing entries (upsert semantics apply).
    pub fn with_entries(entries: impl IntoIterator<Item = RefreshLogEntry>) -> Self {
        let mut arena = LogArena::default();
        for entry in entries {
            arena.upsert(entry);
        }
        Self {
            arena: RwLock::new(arena),
        }
    }

    pub async fn len(&self) -> usize {
        self.arena.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, prospect_id: Uuid, source: &str) -> Option<RefreshLogEntry> {
        let arena = self.arena.read().await;
        arena
            .index
            .get(&(prospect_id, source.to_string()))
            .map(|&slot| arena.rows[slot].clone())
    }
}

#[async_trait]
impl RefreshLogStore for InMemoryRefreshLog {
    async fn upsert(&self, entry: &RefreshLogEntry) -> Result<()> {
        self.arena.write().await.upsert(entry.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<RefreshLogEntry>> {
        Ok(self.arena.read().await.rows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use prospect_common::{RefreshStatus, SCHEDULED_BATCH_SOURCE};

    #[tokio::test]
    async fn second_upsert_overwrites_first() {
        let log = InMemoryRefreshLog::new();
        let id = Uuid::new_v4();
        let t0 = Utc::now() - Duration::hours(30);
        let t1 = Utc::now();

        log.upsert(&RefreshLogEntry::success(id, 4, t0)).await.unwrap();
        log.upsert(&RefreshLogEntry::failure(id, "provider timeout", t1))
            .await
            .unwrap();

        assert_eq!(log.len().await, 1);
        let row = log.get(id, SCHEDULED_BATCH_SOURCE).await.unwrap();
        assert_eq!(row.status, RefreshStatus::Error);
        assert_eq!(row.last_refresh_at, t1);
        assert_eq!(row.items_found, 0);
        assert_eq!(row.error_message.as_deref(), Some("provider timeout"));
    }

    #[tokio::test]
    async fn different_sources_are_separate_rows() {
        let log = InMemoryRefreshLog::new();
        let id = Uuid::new_v4();
        let now = Utc::now();

        log.upsert(&RefreshLogEntry::success(id, 1, now)).await.unwrap();
        let manual = RefreshLogEntry {
            source: "manual".to_string(),
            ..RefreshLogEntry::success(id, 2, now)
        };
        log.upsert(&manual).await.unwrap();

        assert_eq!(log.len().await, 2);
        assert_eq!(log.load_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn seeded_entries_are_deduplicated_by_key() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let log = InMemoryRefreshLog::with_entries([
            RefreshLogEntry::success(id, 1, now - Duration::hours(2)),
            RefreshLogEntry::success(id, 7, now),
        ]);
        assert_eq!(log.len().await, 1);
        assert_eq!(log.get(id, SCHEDULED_BATCH_SOURCE).await.unwrap().items_found, 7);
    }

    #[test]
    fn latest_refresh_takes_max_across_sources() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc::now();
        let entries = vec![
            RefreshLogEntry::success(id, 1, now - Duration::hours(50)),
            RefreshLogEntry {
                source: "manual".to_string(),
                ..RefreshLogEntry::success(id, 1, now - Duration::hours(3))
            },
            RefreshLogEntry::success(other, 1, now - Duration::hours(10)),
        ];

        let latest = latest_refresh_by_prospect(&entries);
        assert_eq!(latest[&id], now - Duration::hours(3));
        assert_eq!(latest[&other], now - Duration::hours(10));
        assert_eq!(latest.len(), 2);
    }
}
