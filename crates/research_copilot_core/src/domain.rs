//! crates/research_copilot_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! These structs serialize to the same camelCase blobs the web client persists,
//! but carry no knowledge of where they are stored.

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::pricing::{self, BillingCycle, PlanId};
use crate::query::QueryErrorKind;

/// Stored value of `daily_query_limit` meaning "no limit".
pub const UNLIMITED: i64 = -1;

//=========================================================================================
// Accounts
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Pro,
    Enterprise,
}

impl SubscriptionTier {
    /// Pro and Enterprise are never gated by the daily quota.
    pub fn is_unlimited(self) -> bool {
        matches!(self, SubscriptionTier::Pro | SubscriptionTier::Enterprise)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Enterprise => "enterprise",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

/// A paid plan attached to an account after a verified payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: PlanId,
    pub billing_cycle: BillingCycle,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub paid_amount: u32,
}

impl Subscription {
    /// Starts `plan` at `now`; the period ends one month or one year later.
    pub fn start(plan: PlanId, paid_amount: u32, now: DateTime<Utc>) -> Self {
        let cycle = plan.billing_cycle();
        let months = match cycle {
            BillingCycle::Monthly => Months::new(1),
            BillingCycle::Annual => Months::new(12),
        };
        let ends_at = now.checked_add_months(months).unwrap_or(now);
        Self {
            plan,
            billing_cycle: cycle,
            started_at: now,
            ends_at,
            paid_amount,
        }
    }
}

/// A research copilot user together with their entitlement counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub is_student: bool,
    pub subscription_tier: SubscriptionTier,
    pub subscription_status: SubscriptionStatus,
    /// `UNLIMITED` for pro/enterprise.
    pub daily_query_limit: i64,
    pub queries_used_today: u32,
    /// Calendar day (local time) the daily counter was last reset.
    pub last_reset_date: NaiveDate,
    pub total_queries_all_time: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

impl UserAccount {
    /// Creates a fresh free-tier account.
    pub fn new(
        email: &str,
        display_name: Option<&str>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());

        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            display_name,
            is_student: pricing::is_academic_email(email),
            subscription_tier: SubscriptionTier::Free,
            subscription_status: SubscriptionStatus::Active,
            daily_query_limit: pricing::limits(SubscriptionTier::Free).daily_queries,
            queries_used_today: 0,
            last_reset_date: today,
            total_queries_all_time: 0,
            created_at: now,
            subscription: None,
        }
    }
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub id: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// References
//=========================================================================================

/// A bibliography entry attached to a query result.
///
/// Older backends returned bare URL strings; newer ones return full records. The
/// shape is resolved once here and never re-checked by consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceRecord {
    LegacyUrl(String),
    Structured(CitedWork),
}

impl ReferenceRecord {
    pub fn url(&self) -> Option<&str> {
        match self {
            ReferenceRecord::LegacyUrl(url) => Some(url.as_str()).filter(|u| !u.is_empty()),
            ReferenceRecord::Structured(work) => work.url.as_deref().filter(|u| !u.is_empty()),
        }
    }

    pub fn as_work(&self) -> Option<&CitedWork> {
        match self {
            ReferenceRecord::Structured(work) => Some(work),
            ReferenceRecord::LegacyUrl(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitedWork {
    #[serde(default, alias = "citation")]
    pub citation_label: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "year_as_string")]
    pub year: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "type", alias = "category")]
    pub category: Option<String>,
}

impl CitedWork {
    pub fn category(&self) -> ReferenceCategory {
        ReferenceCategory::parse(self.category.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceCategory {
    Journal,
    Conference,
    Preprint,
    Other,
}

impl ReferenceCategory {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("journal") => ReferenceCategory::Journal,
            Some("conference") => ReferenceCategory::Conference,
            Some("preprint") => ReferenceCategory::Preprint,
            _ => ReferenceCategory::Other,
        }
    }
}

/// Backends send `year` as either a number or a string.
fn year_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawYear {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<RawYear>::deserialize(deserializer)? {
        Some(RawYear::Number(n)) => Some(n.to_string()),
        Some(RawYear::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

//=========================================================================================
// Query results
//=========================================================================================

/// Reads a missing or `null` value as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

/// One slot in a user's research history.
///
/// Created as a loading placeholder when a query is submitted and filled in
/// place once the research call resolves or fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub query_text: String,
    pub timestamp: DateTime<Utc>,
    pub loading: bool,
    pub summary: String,
    pub sections: Vec<Section>,
    pub references: Vec<ReferenceRecord>,
    pub key_terms: Vec<String>,
    pub related_fields: Vec<String>,
    pub suggested_collaborations: Vec<String>,
    #[serde(default)]
    pub error: Option<QueryErrorKind>,
}
