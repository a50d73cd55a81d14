//! crates/research_copilot_core/src/history.rs
//!
//! Per-user research history and the short "recent searches" list.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::QueryResult;
use crate::query::{QueryError, QueryResponse};

const RECENT_STORED: usize = 10;
const RECENT_SHOWN: usize = 5;

/// Results in submission order. At most one slot is loading at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    results: Vec<QueryResult>,
}

impl ChatHistory {
    pub fn results(&self) -> &[QueryResult] {
        &self.results
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn in_flight(&self) -> Option<usize> {
        self.results.iter().position(|r| r.loading)
    }

    /// Fails loading slots older than `deadline`; their request was abandoned.
    pub fn expire_stale(&mut self, now: DateTime<Utc>, deadline: Duration) -> usize {
        let mut expired = 0;
        for slot in self.results.iter_mut().filter(|r| r.loading) {
            if now - slot.timestamp > deadline {
                slot.fail(&QueryError::Timeout);
                expired += 1;
            }
        }
        expired
    }

    /// Drops finished results older than `history_days`; a negative value keeps
    /// everything. Returns how many were dropped.
    pub fn prune(&mut self, now: DateTime<Utc>, history_days: i64) -> usize {
        if history_days < 0 {
            return 0;
        }
        let cutoff = now - Duration::days(history_days);
        let before = self.results.len();
        self.results.retain(|r| r.loading || r.timestamp >= cutoff);
        before - self.results.len()
    }

    /// Opens a loading placeholder and returns its index.
    pub fn begin(&mut self, query: &str, now: DateTime<Utc>) -> Result<usize, QueryError> {
        if self.in_flight().is_some() {
            return Err(QueryError::InFlight);
        }
        self.results.push(QueryResult::placeholder(query, now));
        Ok(self.results.len() - 1)
    }

    pub fn resolve(&mut self, index: usize, response: QueryResponse) -> Option<&QueryResult> {
        let slot = self.results.get_mut(index)?;
        slot.resolve(response);
        Some(slot)
    }

    pub fn fail(&mut self, index: usize, error: &QueryError) -> Option<&QueryResult> {
        let slot = self.results.get_mut(index)?;
        slot.fail(error);
        Some(slot)
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentQuery {
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

/// Newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentQueries {
    entries: Vec<RecentQuery>,
}

impl RecentQueries {
    pub fn push(&mut self, query: &str, timestamp: DateTime<Utc>) {
        self.entries.insert(
            0,
            RecentQuery {
                query: query.to_string(),
                timestamp,
            },
        );
        self.entries.truncate(RECENT_STORED);
    }

    /// The entries a sidebar shows.
    pub fn shown(&self) -> &[RecentQuery] {
        &self.entries[..self.entries.len().min(RECENT_SHOWN)]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
