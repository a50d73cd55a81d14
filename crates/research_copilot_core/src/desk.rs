//! crates/research_copilot_core/src/desk.rs
//!
//! The query submission flow: gate on the account's quota, open a result slot,
//! run the research call, and account for it only once a response is delivered.

use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{QueryResult, SubscriptionTier, UserAccount};
use crate::entitlement::{self, Quota, ResetCountdown};
use crate::history::{ChatHistory, RecentQueries};
use crate::ports::{Clock, PortError, ResearchRequest, ResearchService};
use crate::pricing;
use crate::query::QueryError;
use crate::store::Repository;

#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    /// The query was refused or failed. `result` holds the slot, if one was opened.
    #[error("{error}")]
    Query {
        error: QueryError,
        result: Option<Box<QueryResult>>,
    },
    #[error(transparent)]
    Port(#[from] PortError),
}

impl From<QueryError> for DeskError {
    fn from(error: QueryError) -> Self {
        DeskError::Query {
            error,
            result: None,
        }
    }
}

/// A delivered query together with the account after accounting for it.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub result: QueryResult,
    pub account: UserAccount,
}

/// Quota view for one account at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub tier: SubscriptionTier,
    pub can_submit: bool,
    /// `-1` when unlimited.
    pub remaining: i64,
    pub daily_limit: i64,
    pub used_today: u32,
    pub total_queries: u64,
    pub resets_in: ResetCountdown,
}

#[derive(Clone)]
pub struct ResearchDesk {
    repo: Repository,
    research: Arc<dyn ResearchService>,
    clock: Arc<dyn Clock>,
    deadline: Duration,
}

impl ResearchDesk {
    pub fn new(
        repo: Repository,
        research: Arc<dyn ResearchService>,
        clock: Arc<dyn Clock>,
        deadline: Duration,
    ) -> Self {
        Self {
            repo,
            research,
            clock,
            deadline,
        }
    }

    /// Read-only; a pending rollover is reflected but not committed.
    pub fn quota(&self, account: &UserAccount) -> QuotaStatus {
        let local_now = self.clock.local_now();
        let today = local_now.date();
        let remaining = entitlement::remaining(account, today);
        QuotaStatus {
            tier: account.subscription_tier,
            can_submit: entitlement::can_submit(account, today),
            remaining: remaining.as_sentinel(),
            daily_limit: account.daily_query_limit,
            used_today: match remaining {
                Quota::Unlimited => account.queries_used_today,
                Quota::Limited(_) => entitlement::effective_used_today(account, today),
            },
            total_queries: account.total_queries_all_time,
            resets_in: entitlement::time_until_reset(local_now),
        }
    }

    /// The account's results within its tier's retention window.
    pub async fn history(&self, account: &UserAccount) -> Result<ChatHistory, PortError> {
        let mut history = self.repo.history(&account.email).await?;
        let history_days = pricing::limits(account.subscription_tier).history_days;
        history.prune(self.clock.now(), history_days);
        Ok(history)
    }

    pub async fn recent(&self, email: &str) -> Result<RecentQueries, PortError> {
        self.repo.recent(email).await
    }

    /// Runs one query for `email`.
    ///
    /// Refusals (not signed in, empty query, quota, already running) return before a
    /// slot is opened. Upstream failures are written into the slot and do not
    /// consume quota.
    pub async fn submit(&self, email: Option<&str>, query: &str) -> Result<Delivered, DeskError> {
        let email = email.ok_or(QueryError::NotAuthenticated)?;
        let account = self
            .repo
            .account(email)
            .await?
            .ok_or(QueryError::NotAuthenticated)?;

        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery.into());
        }

        let today = self.clock.local_now().date();
        if !entitlement::can_submit(&account, today) {
            info!(
                email = %account.email,
                limit = account.daily_query_limit,
                "Daily quota exhausted"
            );
            return Err(QueryError::QuotaExceeded {
                limit: account.daily_query_limit,
            }
            .into());
        }

        let limits = pricing::limits(account.subscription_tier);
        let now = self.clock.now();
        let mut history = self.repo.history(&account.email).await?;
        if history.expire_stale(now, self.deadline) > 0 {
            warn!(email = %account.email, "Abandoned in-flight query marked as timed out");
        }
        let pruned = history.prune(now, limits.history_days);
        if pruned > 0 {
            debug!(email = %account.email, pruned, "Dropped results past the retention window");
        }
        let slot = history.begin(query, now)?;
        self.repo.save_history(&account.email, &history).await?;

        let mut recent = self.repo.recent(&account.email).await?;
        recent.push(query, now);
        self.repo.save_recent(&account.email, &recent).await?;

        let request = ResearchRequest {
            query: query.to_string(),
            limits,
        };
        let outcome = self.research.research(&request).await;

        // Re-read so a concurrent upgrade or usage is not overwritten.
        let account = self.repo.account(&account.email).await?.unwrap_or(account);
        let mut history = self.repo.history(&account.email).await?;

        match outcome {
            Ok(response) => {
                let result = match history.resolve(slot, response.clone()) {
                    Some(result) => result.clone(),
                    None => {
                        let mut result = QueryResult::placeholder(query, now);
                        result.resolve(response);
                        result
                    }
                };
                self.repo.save_history(&account.email, &history).await?;

                let account = entitlement::record_usage(account, self.clock.local_now().date());
                self.repo.save_account(&account).await?;
                info!(
                    email = %account.email,
                    used_today = account.queries_used_today,
                    references = result.references.len(),
                    "Query delivered"
                );
                Ok(Delivered { result, account })
            }
            Err(error) => {
                warn!(email = %account.email, error = %error, "Query failed");
                let result = match history.fail(slot, &error) {
                    Some(result) => result.clone(),
                    None => {
                        let mut result = QueryResult::placeholder(query, now);
                        result.fail(&error);
                        result
                    }
                };
                self.repo.save_history(&account.email, &history).await?;
                Err(DeskError::Query {
                    error,
                    result: Some(Box::new(result)),
                })
            }
        }
    }
}
