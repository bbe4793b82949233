use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Run-log source tag written by the scheduled batch.
pub const SCHEDULED_BATCH_SOURCE: &str = "scheduled_batch";

/// Priority given to statuses outside the known CRM pipeline stages.
pub const UNKNOWN_STATUS_PRIORITY: u32 = 99;

// --- Prospects ---

/// CRM pipeline stage of a prospect. Labels are the CRM's own strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProspectStatus {
    Hot,
    Warm,
    NotContacted,
    Cold,
    Lost,
    /// Any label the CRM uses that this subsystem does not rank.
    Other(String),
}

impl ProspectStatus {
    /// Scheduling priority. Lower sorts first.
    pub fn priority(&self) -> u32 {
        match self {
            ProspectStatus::Hot => 1,
            ProspectStatus::Warm => 2,
            ProspectStatus::NotContacted => 3,
            ProspectStatus::Cold => 4,
            ProspectStatus::Lost => 5,
            ProspectStatus::Other(_) => UNKNOWN_STATUS_PRIORITY,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProspectStatus::Hot => "Hot",
            ProspectStatus::Warm => "Warm",
            ProspectStatus::NotContacted => "Not contacted yet",
            ProspectStatus::Cold => "Cold",
            ProspectStatus::Lost => "Lost",
            ProspectStatus::Other(label) => label,
        }
    }
}

impl From<&str> for ProspectStatus {
    fn from(label: &str) -> Self {
        match label {
            "Hot" => ProspectStatus::Hot,
            "Warm" => ProspectStatus::Warm,
            "Not contacted yet" => ProspectStatus::NotContacted,
            "Cold" => ProspectStatus::Cold,
            "Lost" => ProspectStatus::Lost,
            other => ProspectStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for ProspectStatus {
    fn from(label: String) -> Self {
        ProspectStatus::from(label.as_str())
    }
}

impl From<ProspectStatus> for String {
    fn from(status: ProspectStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ProspectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked business entity. Owned by the CRM; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prospect {
    pub id: Uuid,
    pub company: String,
    pub status: ProspectStatus,
    pub archived: bool,
    pub website: Option<String>,
    pub prospect_type: Option<String>,
    pub country: Option<String>,
    pub profile_url: Option<String>,
}

impl Prospect {
    /// The attributes handed to the candidate fetcher.
    pub fn identity(&self) -> ProspectIdentity {
        ProspectIdentity {
            company: self.company.clone(),
            website: self.website.clone(),
            prospect_type: self.prospect_type.clone(),
            country: self.country.clone(),
            profile_url: self.profile_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProspectIdentity {
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prospect_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
}

// --- Intelligence items ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntelligenceSource {
    News,
    RoleChange,
    SocialPost,
    MatchResult,
    Funding,
    #[serde(other)]
    Other,
}

impl IntelligenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntelligenceSource::News => "news",
            IntelligenceSource::RoleChange => "role_change",
            IntelligenceSource::SocialPost => "social_post",
            IntelligenceSource::MatchResult => "match_result",
            IntelligenceSource::Funding => "funding",
            IntelligenceSource::Other => "other",
        }
    }

    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "news" => IntelligenceSource::News,
            "role_change" => IntelligenceSource::RoleChange,
            "social_post" => IntelligenceSource::SocialPost,
            "match_result" => IntelligenceSource::MatchResult,
            "funding" => IntelligenceSource::Funding,
            _ => IntelligenceSource::Other,
        }
    }
}

impl std::fmt::Display for IntelligenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item returned by the fetcher, before storage assigns identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default = "default_source")]
    pub source: IntelligenceSource,
    /// 0-100. Providers send fractional or out-of-range scores; they are
    /// rounded and clamped, and unreadable ones become `None`.
    #[serde(default, deserialize_with = "lenient_score")]
    pub relevance_score: Option<u8>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

fn default_source() -> IntelligenceSource {
    IntelligenceSource::Other
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Text(String),
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<RawScore>::deserialize(deserializer)?;
    let value = match raw {
        Some(RawScore::Number(n)) => Some(n),
        Some(RawScore::Text(t)) => t.trim().parse::<f64>().ok(),
        None => None,
    };
    Ok(value
        .filter(|n| n.is_finite())
        .map(|n| n.round().clamp(0.0, 100.0) as u8))
}

impl CandidateItem {
    /// The url, if present and non-blank.
    pub fn dedup_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceItem {
    pub id: Uuid,
    pub prospect_id: Option<Uuid>,
    pub title: String,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub source: IntelligenceSource,
    pub relevance_score: Option<u8>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub dismissed: bool,
}

impl IntelligenceItem {
    pub fn from_candidate(
        candidate: CandidateItem,
        prospect_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            prospect_id,
            title: candidate.title,
            url: candidate.url,
            summary: candidate.summary,
            source: candidate.source,
            relevance_score: candidate.relevance_score.map(|s| s.min(100)),
            published_at: candidate.published_at,
            created_at,
            dismissed: false,
        }
    }
}

/// The two fields of a stored item that dedup compares against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingItemKey {
    pub url: Option<String>,
    pub title: String,
}

impl From<&IntelligenceItem> for ExistingItemKey {
    fn from(item: &IntelligenceItem) -> Self {
        Self {
            url: item.url.clone(),
            title: item.title.clone(),
        }
    }
}

// --- Run log ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    Success,
    Error,
}

impl RefreshStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshStatus::Success => "success",
            RefreshStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the most recent refresh of a prospect from one source.
/// At most one entry exists per `(prospect_id, source)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshLogEntry {
    pub prospect_id: Uuid,
    pub source: String,
    pub last_refresh_at: DateTime<Utc>,
    pub status: RefreshStatus,
    /// Fetch yield, including items that were already known.
    pub items_found: u32,
    pub error_message: Option<String>,
}

impl RefreshLogEntry {
    pub fn success(prospect_id: Uuid, items_found: u32, at: DateTime<Utc>) -> Self {
        Self {
            prospect_id,
            source: SCHEDULED_BATCH_SOURCE.to_string(),
            last_refresh_at: at,
            status: RefreshStatus::Success,
            items_found,
            error_message: None,
        }
    }

    pub fn failure(prospect_id: Uuid, error_message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            prospect_id,
            source: SCHEDULED_BATCH_SOURCE.to_string(),
            last_refresh_at: at,
            status: RefreshStatus::Error,
            items_found: 0,
            error_message: Some(error_message.into()),
        }
    }

    /// Upsert key.
    pub fn key(&self) -> (Uuid, &str) {
        (self.prospect_id, self.source.as_str())
    }
}

// --- Batch summary ---

/// What happened to one prospect during a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectOutcome {
    pub prospect_id: Uuid,
    pub company: String,
    pub status: RefreshStatus,
    pub items_found: u32,
    pub items_inserted: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-invocation report returned to the trigger. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRunSummary {
    /// Non-archived prospects on the roster.
    pub total_prospects: u32,
    /// Prospects that passed the staleness filter.
    pub eligible: u32,
    /// Prospects actually processed this run.
    pub batch_size: u32,
    /// Selected prospects not started (deadline or cancellation).
    pub deferred: u32,
    pub items_inserted: u32,
    pub errors: u32,
    pub duration_ms: u64,
    pub outcomes: Vec<ProspectOutcome>,
}

impl std::fmt::Display for BatchRunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Scheduled Refresh Complete ===")?;
        writeln!(f, "Prospects on roster: {}", self.total_prospects)?;
        writeln!(f, "Stale and eligible:  {}", self.eligible)?;
        writeln!(f, "Processed:           {}", self.batch_size)?;
        writeln!(f, "Deferred:            {}", self.deferred)?;
        writeln!(f, "Items inserted:      {}", self.items_inserted)?;
        writeln!(f, "Errors:              {}", self.errors)?;
        writeln!(f, "Duration:            {}ms", self.duration_ms)?;
        for outcome in self.outcomes.iter().filter(|o| o.error.is_some()) {
            writeln!(
                f,
                "  failed: {} ({})",
                outcome.company,
                outcome.error.as_deref().unwrap_or_default()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score_of(json: &str) -> Option<u8> {
        serde_json::from_str::<CandidateItem>(json).unwrap().relevance_score
    }

    #[test]
    fn relevance_score_tolerates_provider_quirks() {
        assert_eq!(score_of(r#"{"title":"x","relevance_score":87.5}"#), Some(88));
        assert_eq!(score_of(r#"{"title":"x","relevance_score":-3}"#), Some(0));
        assert_eq!(score_of(r#"{"title":"x","relevance_score":740}"#), Some(100));
        assert_eq!(score_of(r#"{"title":"x","relevance_score":"64"}"#), Some(64));
        assert_eq!(score_of(r#"{"title":"x","relevance_score":"high"}"#), None);
        assert_eq!(score_of(r#"{"title":"x","relevance_score":null}"#), None);
        assert_eq!(score_of(r#"{"title":"x"}"#), None);
        assert_eq!(score_of(r#"{"title":"x","relevance_score":42}"#), Some(42));
    }

    #[test]
    fn status_priority_follows_pipeline_order() {
        let ordered = ["Hot", "Warm", "Not contacted yet", "Cold", "Lost"];
        let priorities: Vec<u32> = ordered
            .iter()
            .map(|l| ProspectStatus::from(*l).priority())
            .collect();
        assert_eq!(priorities, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn unknown_status_sorts_last() {
        let status = ProspectStatus::from("Nurturing");
        assert_eq!(status.priority(), UNKNOWN_STATUS_PRIORITY);
        assert_eq!(status.as_str(), "Nurturing");
    }

    #[test]
    fn status_serializes_as_crm_label() {
        let json = serde_json::to_string(&ProspectStatus::NotContacted).unwrap();
        assert_eq!(json, "\"Not contacted yet\"");
        let back: ProspectStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ProspectStatus::NotContacted);
    }

    #[test]
    fn blank_url_is_not_a_dedup_key() {
        let candidate = CandidateItem {
            title: "Raises Series A".to_string(),
            url: Some("  ".to_string()),
            summary: None,
            source: IntelligenceSource::Funding,
            relevance_score: Some(80),
            published_at: None,
        };
        assert_eq!(candidate.dedup_url(), None);
    }

    #[test]
    fn unknown_source_deserializes_as_other() {
        let json = r#"{"title":"Podcast appearance","source":"podcast"}"#;
        let candidate: CandidateItem = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.source, IntelligenceSource::Other);
        assert_eq!(candidate.url, None);
    }

    #[test]
    fn relevance_is_clamped_on_storage() {
        let candidate = CandidateItem {
            title: "t".to_string(),
            url: None,
            summary: None,
            source: IntelligenceSource::News,
            relevance_score: Some(250),
            published_at: None,
        };
        let item = IntelligenceItem::from_candidate(candidate, None, Utc::now());
        assert_eq!(item.relevance_score, Some(100));
        assert!(!item.dismissed);
    }
}
