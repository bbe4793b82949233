// In-process roster and item store. Backs tests and local dry runs.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use prospect_common::{ExistingItemKey, IntelligenceItem, Prospect};

use crate::traits::{ItemStore, ProspectReader};

#[derive(Default)]
pub struct MemoryStore {
    prospects: RwLock<Vec<Prospect>>,
    items: RwLock<Vec<IntelligenceItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prospects(prospects: Vec<Prospect>) -> Self {
        Self {
            prospects: RwLock::new(prospects),
            items: RwLock::new(Vec::new()),
        }
    }

    pub async fn add_prospect(&self, prospect: Prospect) {
        self.prospects.write().await.push(prospect);
    }

    /// Store an item directly, bypassing dedup.
    pub async fn seed_item(&self, item: IntelligenceItem) {
        self.items.write().await.push(item);
    }

    pub async fn items_for(&self, prospect_id: Uuid) -> Vec<IntelligenceItem> {
        self.items
            .read()
            .await
            .iter()
            .filter(|i| i.prospect_id == Some(prospect_id))
            .cloned()
            .collect()
    }

    pub async fn item_count(&self) -> usize {
        self.items.read().await.len()
    }
}

#[async_trait]
impl ProspectReader for MemoryStore {
    async fn active_prospects(&self) -> Result<Vec<Prospect>> {
        Ok(self
            .prospects
            .read()
            .await
            .iter()
            .filter(|p| !p.archived)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn existing_keys(&self, prospect_id: Uuid) -> Result<Vec<ExistingItemKey>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|i| i.prospect_id == Some(prospect_id))
            .map(ExistingItemKey::from)
            .collect())
    }

    async fn insert_items(&self, items: &[IntelligenceItem]) -> Result<u64> {
        self.items.write().await.extend_from_slice(items);
        Ok(items.len() as u64)
    }
}
