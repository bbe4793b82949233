// Test doubles for the scheduled refresh.
//
// - MockFetcher (CandidateFetcher): company -> canned candidates or error
// - FailingItemStore (ItemStore): wraps MemoryStore, fails inserts for chosen prospects
// - FailingReader (ProspectReader) / FailingRunLog (RefreshLogStore): always error
//
// Plus builders for prospects and candidates.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use prospect_common::{
    CandidateItem, ExistingItemKey, IntelligenceItem, IntelligenceSource, Prospect,
    ProspectIdentity, ProspectStatus, RefreshLogEntry, RefreshSettings,
};

use crate::store::MemoryStore;
use crate::traits::{CandidateFetcher, ItemStore, ProspectReader, RefreshLogStore};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn make_prospect(company: &str, status: &str) -> Prospect {
    Prospect {
        id: Uuid::new_v4(),
        company: company.to_string(),
        status: ProspectStatus::from(status),
        archived: false,
        website: Some(format!("https://{}.example", company.to_lowercase())),
        prospect_type: Some("club".to_string()),
        country: Some("GB".to_string()),
        profile_url: None,
    }
}

pub fn candidate(title: &str, url: Option<&str>, score: Option<u8>) -> CandidateItem {
    CandidateItem {
        title: title.to_string(),
        url: url.map(str::to_string),
        summary: None,
        source: IntelligenceSource::News,
        relevance_score: score,
        published_at: None,
    }
}

/// Settings with no delay and no time budget.
pub fn instant_settings() -> RefreshSettings {
    RefreshSettings {
        max_duration: Duration::ZERO,
        delay: Duration::ZERO,
        expected_fetch_latency: Duration::ZERO,
        reserve: Duration::ZERO,
        ..RefreshSettings::default()
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Company-keyed fetcher. Unregistered companies return no candidates.
/// Records the order in which companies were fetched.
#[derive(Default)]
pub struct MockFetcher {
    responses: HashMap<String, Vec<CandidateItem>>,
    failures: HashMap<String, String>,
    latency: Duration,
    cancel_on: Option<(String, Arc<AtomicBool>)>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_company(mut self, company: &str, items: Vec<CandidateItem>) -> Self {
        self.responses.insert(company.to_string(), items);
        self
    }

    pub fn failing_for(mut self, company: &str, message: &str) -> Self {
        self.failures.insert(company.to_string(), message.to_string());
        self
    }

    /// Every fetch takes this long (use with paused tokio time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Raise `flag` while fetching `company`.
    pub fn cancel_on(mut self, company: &str, flag: Arc<AtomicBool>) -> Self {
        self.cancel_on = Some((company.to_string(), flag));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl CandidateFetcher for MockFetcher {
    async fn fetch_candidates(&self, identity: &ProspectIdentity) -> Result<Vec<CandidateItem>> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(identity.company.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some((company, flag)) = &self.cancel_on {
            if *company == identity.company {
                flag.store(true, Ordering::Relaxed);
            }
        }
        if let Some(message) = self.failures.get(&identity.company) {
            bail!("{message}");
        }
        Ok(self
            .responses
            .get(&identity.company)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Failing stores
// ---------------------------------------------------------------------------

/// Delegates to a MemoryStore but rejects inserts for the given prospects.
pub struct FailingItemStore {
    inner: Arc<MemoryStore>,
    reject: HashSet<Uuid>,
}

impl FailingItemStore {
    pub fn new(inner: Arc<MemoryStore>, reject: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            inner,
            reject: reject.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ItemStore for FailingItemStore {
    async fn existing_keys(&self, prospect_id: Uuid) -> Result<Vec<ExistingItemKey>> {
        self.inner.existing_keys(prospect_id).await
    }

    async fn insert_items(&self, items: &[IntelligenceItem]) -> Result<u64> {
        if items
            .iter()
            .any(|i| i.prospect_id.is_some_and(|id| self.reject.contains(&id)))
        {
            return Err(anyhow!("unique constraint violated on intelligence_items"));
        }
        self.inner.insert_items(items).await
    }
}

pub struct FailingReader;

#[async_trait]
impl ProspectReader for FailingReader {
    async fn active_prospects(&self) -> Result<Vec<Prospect>> {
        Err(anyhow!("connection refused"))
    }
}

/// Loads fine but every upsert fails.
pub struct FailingRunLog;

#[async_trait]
impl RefreshLogStore for FailingRunLog {
    async fn upsert(&self, _entry: &RefreshLogEntry) -> Result<()> {
        Err(anyhow!("refresh_log is read-only"))
    }

    async fn load_all(&self) -> Result<Vec<RefreshLogEntry>> {
        Ok(Vec::new())
    }
}
