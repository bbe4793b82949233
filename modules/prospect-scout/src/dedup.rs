//! Drop fetched candidates that are already stored for a prospect.
//!
//! A candidate is known when its url matches a stored url, or when its title
//! exactly matches a stored title. Title matching catches sources that hand
//! out a different url (or none) for the same story. Candidates that repeat
//! an earlier candidate in the same batch are dropped as well.

use std::collections::HashSet;

use prospect_common::{CandidateItem, ExistingItemKey};

/// Url and title sets built once per prospect.
#[derive(Debug, Default)]
pub struct KnownItems {
    urls: HashSet<String>,
    titles: HashSet<String>,
}

impl KnownItems {
    pub fn new(existing: &[ExistingItemKey]) -> Self {
        let mut known = Self::default();
        for key in existing {
            known.remember(key.url.as_deref(), &key.title);
        }
        known
    }

    pub fn contains(&self, candidate: &CandidateItem) -> bool {
        if let Some(url) = candidate.dedup_url() {
            if self.urls.contains(url) {
                return true;
            }
        }
        self.titles.contains(&candidate.title)
    }

    fn remember(&mut self, url: Option<&str>, title: &str) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.urls.insert(url.to_string());
        }
        self.titles.insert(title.to_string());
    }
}

/// Return the candidates not already known, in their original order.
pub fn dedup(candidates: Vec<CandidateItem>, existing: &[ExistingItemKey]) -> Vec<CandidateItem> {
    let mut known = KnownItems::new(existing);
    let mut fresh = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        if known.contains(&candidate) {
            continue;
        }
        known.remember(candidate.dedup_url(), &candidate.title);
        fresh.push(candidate);
    }

    fresh
}

/// Highest relevance first; unscored candidates last. Stable for equal scores.
pub fn sort_by_relevance(candidates: &mut [CandidateItem]) {
    candidates.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
}
