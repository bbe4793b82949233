// Postgres persistence for the roster, intelligence items and the refresh log.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use prospect_common::{
    ExistingItemKey, IntelligenceItem, Prospect, ProspectStatus, RefreshLogEntry, RefreshStatus,
};

use crate::traits::{ItemStore, ProspectReader, RefreshLogStore};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// A row from the prospects table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ProspectRow {
    id: Uuid,
    company: String,
    status: Option<String>,
    archived: bool,
    website: Option<String>,
    prospect_type: Option<String>,
    country: Option<String>,
    profile_url: Option<String>,
}

impl From<ProspectRow> for Prospect {
    fn from(row: ProspectRow) -> Self {
        Prospect {
            id: row.id,
            company: row.company,
            status: ProspectStatus::from(row.status.unwrap_or_default()),
            archived: row.archived,
            website: row.website,
            prospect_type: row.prospect_type,
            country: row.country,
            profile_url: row.profile_url,
        }
    }
}

/// A row from the refresh_log table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RefreshLogRow {
    prospect_id: Uuid,
    source: String,
    last_refresh_at: DateTime<Utc>,
    status: String,
    items_found: i32,
    error_message: Option<String>,
}

impl From<RefreshLogRow> for RefreshLogEntry {
    fn from(row: RefreshLogRow) -> Self {
        RefreshLogEntry {
            prospect_id: row.prospect_id,
            source: row.source,
            last_refresh_at: row.last_refresh_at,
            status: if row.status == "success" {
                RefreshStatus::Success
            } else {
                RefreshStatus::Error
            },
            items_found: row.items_found.max(0) as u32,
            error_message: row.error_message,
        }
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;
        Ok(())
    }
}

#[async_trait]
impl ProspectReader for PgStore {
    async fn active_prospects(&self) -> Result<Vec<Prospect>> {
        let rows = sqlx::query_as::<_, ProspectRow>(
            r#"
            SELECT id, company, status, archived, website, prospect_type, country, profile_url
            FROM prospects
            WHERE NOT archived
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Prospect::from).collect())
    }
}

#[async_trait]
impl ItemStore for PgStore {
    async fn existing_keys(&self, prospect_id: Uuid) -> Result<Vec<ExistingItemKey>> {
        let rows = sqlx::query_as::<_, (Option<String>, String)>(
            r#"
            SELECT url, title
            FROM intelligence_items
            WHERE prospect_id = $1
            "#,
        )
        .bind(prospect_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(url, title)| ExistingItemKey { url, title })
            .collect())
    }

    async fn insert_items(&self, items: &[IntelligenceItem]) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;
        for item in items {
            let result = sqlx::query(
                r#"
                INSERT INTO intelligence_items
                    (id, prospect_id, title, url, summary, source,
                     relevance_score, published_at, created_at, dismissed)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(item.id)
            .bind(item.prospect_id)
            .bind(&item.title)
            .bind(&item.url)
            .bind(&item.summary)
            .bind(item.source.as_str())
            .bind(item.relevance_score.map(i16::from))
            .bind(item.published_at)
            .bind(item.created_at)
            .bind(item.dismissed)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert item {:?}", item.title))?;
            written += result.rows_affected();
        }
        tx.commit().await?;

        Ok(written)
    }
}

#[async_trait]
impl RefreshLogStore for PgStore {
    async fn upsert(&self, entry: &RefreshLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_log
                (prospect_id, source, last_refresh_at, status, items_found, error_message)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (prospect_id, source) DO UPDATE SET
                last_refresh_at = EXCLUDED.last_refresh_at,
                status = EXCLUDED.status,
                items_found = EXCLUDED.items_found,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(entry.prospect_id)
        .bind(&entry.source)
        .bind(entry.last_refresh_at)
        .bind(entry.status.as_str())
        .bind(entry.items_found.min(i32::MAX as u32) as i32)
        .bind(&entry.error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<RefreshLogEntry>> {
        let rows = sqlx::query_as::<_, RefreshLogRow>(
            r#"
            SELECT prospect_id, source, last_refresh_at, status, items_found, error_message
            FROM refresh_log
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RefreshLogEntry::from).collect())
    }
}
