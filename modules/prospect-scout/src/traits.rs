// Trait abstractions for the scheduled refresh's collaborators.
//
// CandidateFetcher: the opaque multi-provider lookup for one prospect.
// ProspectReader: read-only access to the CRM roster.
// ItemStore: stored intelligence items (dedup keys + bulk insert).
// RefreshLogStore: one row per (prospect, source), upserted every run.
//
// Postgres implements the three stores in `store::postgres`; `testing`
// provides in-memory doubles so the scheduler runs without a database.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use prospect_common::{
    CandidateItem, ExistingItemKey, IntelligenceItem, Prospect, ProspectIdentity, RefreshLogEntry,
};

// ---------------------------------------------------------------------------
// CandidateFetcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CandidateFetcher: Send + Sync {
    /// Look up recent signals about a prospect. May be slow; may fail.
    async fn fetch_candidates(&self, identity: &ProspectIdentity) -> Result<Vec<CandidateItem>>;
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ProspectReader: Send + Sync {
    /// All prospects that are not archived.
    async fn active_prospects(&self) -> Result<Vec<Prospect>>;
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Url/title pairs of every item already stored for a prospect.
    async fn existing_keys(&self, prospect_id: Uuid) -> Result<Vec<ExistingItemKey>>;

    /// Insert all items or none. Returns the number of rows written.
    async fn insert_items(&self, items: &[IntelligenceItem]) -> Result<u64>;
}

#[async_trait]
pub trait RefreshLogStore: Send + Sync {
    /// Insert or overwrite the entry for `(prospect_id, source)`.
    async fn upsert(&self, entry: &RefreshLogEntry) -> Result<()>;

    async fn load_all(&self) -> Result<Vec<RefreshLogEntry>>;
}
