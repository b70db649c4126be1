use crate::client::AnalysisResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of past analyses kept for the current session.
pub const HISTORY_CAPACITY: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub url: String,
    pub result: AnalysisResult,
    pub captured_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn capture(result: &AnalysisResult) -> Self {
        Self {
            url: result.analyzed_url.clone(),
            result: result.clone(),
            captured_at: Utc::now(),
        }
    }
}

/// Bounded list of recent analyses, newest first.
#[derive(Debug, Clone, Default)]
pub struct RecentHistory {
    entries: VecDeque<HistoryEntry>,
}

impl RecentHistory {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        if self.entries.len() > HISTORY_CAPACITY {
            if let Some(evicted) = self.entries.pop_back() {
                log::debug!("Evicted {} from recent history", evicted.url);
            }
        }
    }

    /// Snapshot of the current entries; later pushes do not show up in it.
    pub fn list(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
