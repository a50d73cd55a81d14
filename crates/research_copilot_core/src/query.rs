//! crates/research_copilot_core/src/query.rs
//!
//! The research backend's response shape, the query failure taxonomy, and how a
//! result slot moves from placeholder to answer or to an in-place error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{null_as_default, QueryResult, ReferenceRecord, Section};

const MISSING_SUMMARY: &str = "No summary provided.";

//=========================================================================================
// Backend response
//=========================================================================================

/// What the research backend returns. Any field may be absent or `null`, and
/// `null` entries inside lists are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(deserialize_with = "present_entries")]
    pub sections: Vec<Section>,
    #[serde(deserialize_with = "present_entries")]
    pub references: Vec<ReferenceRecord>,
    #[serde(deserialize_with = "present_entries")]
    pub key_terms: Vec<String>,
    #[serde(deserialize_with = "present_entries")]
    pub related_fields: Vec<String>,
    #[serde(deserialize_with = "present_entries")]
    pub suggested_collaborations: Vec<String>,
}

fn present_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let entries = Option::<Vec<Option<T>>>::deserialize(deserializer)?;
    Ok(entries.into_iter().flatten().flatten().collect())
}

impl QueryResponse {
    pub fn normalize(mut self) -> Self {
        if self.summary.trim().is_empty() {
            self.summary = MISSING_SUMMARY.to_string();
        }
        self.sections
            .retain(|s| !s.title.trim().is_empty() || !s.content.trim().is_empty());
        self
    }
}

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorKind {
    NotAuthenticated,
    QuotaExceeded,
    EmptyQuery,
    InFlight,
    Timeout,
    NetworkUnavailable,
    MalformedResponse,
    ServerError,
    RateLimited,
    Forbidden,
}

/// Why a research query did not produce a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Sign in to run research queries")]
    NotAuthenticated,
    #[error("Daily limit of {limit} queries reached")]
    QuotaExceeded { limit: i64 },
    #[error("No query provided")]
    EmptyQuery,
    #[error("A query is already in progress")]
    InFlight,
    #[error("The research service did not respond in time")]
    Timeout,
    #[error("Could not reach the research service: {0}")]
    NetworkUnavailable(String),
    #[error("The research service returned malformed data: {0}")]
    MalformedResponse(String),
    #[error("The research service failed: {0}")]
    ServerError(String),
    #[error("The research service is rate limiting requests")]
    RateLimited,
    #[error("The research service refused the request: {0}")]
    Forbidden(String),
}

impl QueryError {
    pub fn kind(&self) -> QueryErrorKind {
        match self {
            QueryError::NotAuthenticated => QueryErrorKind::NotAuthenticated,
            QueryError::QuotaExceeded { .. } => QueryErrorKind::QuotaExceeded,
            QueryError::EmptyQuery => QueryErrorKind::EmptyQuery,
            QueryError::InFlight => QueryErrorKind::InFlight,
            QueryError::Timeout => QueryErrorKind::Timeout,
            QueryError::NetworkUnavailable(_) => QueryErrorKind::NetworkUnavailable,
            QueryError::MalformedResponse(_) => QueryErrorKind::MalformedResponse,
            QueryError::ServerError(_) => QueryErrorKind::ServerError,
            QueryError::RateLimited => QueryErrorKind::RateLimited,
            QueryError::Forbidden(_) => QueryErrorKind::Forbidden,
        }
    }

    /// Headline and guidance shown in place of a result.
    pub fn user_message(&self) -> (String, &'static str) {
        let guidance = match self {
            QueryError::NotAuthenticated => "Log in or create a free account to start researching.",
            QueryError::QuotaExceeded { .. } => {
                "Your free queries reset at midnight. Upgrade to Pro for unlimited queries."
            }
            QueryError::EmptyQuery => "Type a research question and submit again.",
            QueryError::InFlight => {
                "Wait for the current analysis to finish before asking another question."
            }
            QueryError::Timeout => {
                "The analysis took too long. Try a more specific query or try again later."
            }
            QueryError::NetworkUnavailable(_) => {
                "The research service is unreachable. Check your connection and try again."
            }
            QueryError::MalformedResponse(_) => {
                "The research service returned data that could not be read. Please try again."
            }
            QueryError::ServerError(_) => {
                "The research service hit an internal error. Please try again shortly."
            }
            QueryError::RateLimited => "Too many requests right now. Wait a moment and try again.",
            QueryError::Forbidden(_) => {
                "The research service rejected its credentials. Contact support."
            }
        };
        (self.to_string(), guidance)
    }
}

//=========================================================================================
// Result slot lifecycle
//=========================================================================================

impl QueryResult {
    pub fn placeholder(query_text: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            query_text: query_text.to_string(),
            timestamp,
            loading: true,
            summary: String::new(),
            sections: Vec::new(),
            references: Vec::new(),
            key_terms: Vec::new(),
            related_fields: Vec::new(),
            suggested_collaborations: Vec::new(),
            error: None,
        }
    }

    pub fn resolve(&mut self, response: QueryResponse) {
        let response = response.normalize();
        self.loading = false;
        self.summary = response.summary;
        self.sections = response.sections;
        self.references = response.references;
        self.key_terms = response.key_terms;
        self.related_fields = response.related_fields;
        self.suggested_collaborations = response.suggested_collaborations;
        self.error = None;
    }

    pub fn fail(&mut self, error: &QueryError) {
        let (headline, guidance) = error.user_message();
        self.loading = false;
        self.summary = format!("{}. {}", headline, guidance);
        self.sections = vec![Section {
            title: "What you can do".to_string(),
            content: guidance.to_string(),
        }];
        self.references.clear();
        self.key_terms.clear();
        self.related_fields.clear();
        self.suggested_collaborations.clear();
        self.error = Some(error.kind());
    }
}
