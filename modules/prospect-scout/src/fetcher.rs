//! HTTP candidate fetcher: posts a prospect's identity to the intelligence
//! provider gateway and reads back candidate items.
//!
//! The gateway fans out to the individual providers (news search, social,
//! match results, funding feeds) and scores relevance; this side only sees
//! the merged list. The `reqwest::Client` is built by the caller and passed
//! in, so one pooled client serves every prospect in a run.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use prospect_common::{CandidateItem, ProspectIdentity};

use crate::traits::CandidateFetcher;

/// Build the shared HTTP client used for provider calls.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    items: Vec<CandidateItem>,
}

pub struct HttpCandidateFetcher {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpCandidateFetcher {
    pub fn new(client: reqwest::Client, endpoint: &str, api_key: Option<&str>) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(String::from),
        }
    }
}

#[async_trait]
impl CandidateFetcher for HttpCandidateFetcher {
    async fn fetch_candidates(&self, identity: &ProspectIdentity) -> Result<Vec<CandidateItem>> {
        let mut request = self.client.post(&self.endpoint).json(identity);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("Provider request failed for {}", identity.company))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Provider returned {}: {}", status.as_u16(), truncate(&body, 200));
        }

        let parsed: FetchResponse = resp
            .json()
            .await
            .context("Provider response was not valid candidate JSON")?;
        debug!(
            company = identity.company.as_str(),
            candidates = parsed.items.len(),
            "Provider candidates received"
        );
        Ok(parsed.items)
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospect_common::IntelligenceSource;

    #[test]
    fn response_items_parse_with_defaults() {
        let body = r#"{
            "items": [
                {"title": "Acme appoints new CEO", "url": "https://news.example/ceo",
                 "source": "role_change", "relevance_score": 92,
                 "published_at": "2025-03-01T09:00:00Z"},
                {"title": "Acme on LinkedIn"}
            ]
        }"#;
        let parsed: FetchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].source, IntelligenceSource::RoleChange);
        assert_eq!(parsed.items[0].relevance_score, Some(92));
        assert_eq!(parsed.items[1].source, IntelligenceSource::Other);
        assert!(parsed.items[1].url.is_none());
    }

    #[test]
    fn fractional_score_does_not_discard_the_response() {
        let body = r#"{
            "items": [
                {"title": "Acme wins cup final", "relevance_score": 87.5},
                {"title": "Acme kit sponsor renews", "relevance_score": 310},
                {"title": "Acme youth academy opens", "relevance_score": 55}
            ]
        }"#;
        let parsed: FetchResponse = serde_json::from_str(body).unwrap();
        let scores: Vec<Option<u8>> = parsed.items.iter().map(|c| c.relevance_score).collect();
        assert_eq!(scores, vec![Some(88), Some(100), Some(55)]);
    }

    #[test]
    fn missing_items_is_empty() {
        let parsed: FetchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn identity_omits_absent_attributes() {
        let identity = ProspectIdentity {
            company: "Acme".to_string(),
            website: Some("https://acme.example".to_string()),
            prospect_type: None,
            country: None,
            profile_url: None,
        };
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"company": "Acme", "website": "https://acme.example"})
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ok", 10), "ok");
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let fetcher = HttpCandidateFetcher::new(
            reqwest::Client::new(),
            "https://gateway.example/v1/candidates/",
            Some(""),
        );
        assert_eq!(fetcher.endpoint, "https://gateway.example/v1/candidates");
        assert!(fetcher.api_key.is_none());
    }
}
