//! crates/research_copilot_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific implementations like databases, LLM providers or
//! payment gateways.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::{PlanId, TierLimits};
use crate::query::{QueryError, QueryResponse};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Stored data is malformed: {0}")]
    Malformed(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Keyed blob persistence. Values are opaque strings; callers own the encoding.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> PortResult<()>;
}

/// What the research backend is asked to produce for one query.
#[derive(Debug, Clone)]
pub struct ResearchRequest {
    pub query: String,
    pub limits: TierLimits,
}

#[async_trait]
pub trait ResearchService: Send + Sync {
    /// Runs one literature analysis. Errors are already classified for the user.
    async fn research(&self, request: &ResearchRequest) -> Result<QueryResponse, QueryError>;
}

/// Everything the gateway needs to open a checkout for a plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub plan: PlanId,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    /// Whole rupees.
    pub amount: u32,
}

/// An opaque order handle for the checkout widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub order_id: String,
    /// Smallest currency unit, as the gateway reports it.
    pub amount: u64,
    pub currency: String,
    /// Public key the widget is initialised with.
    pub key_id: String,
}

/// The callback payload the checkout widget hands back after payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> PortResult<PaymentOrder>;

    /// `true` only when the payment is authentic and complete.
    async fn verify_payment(&self, payload: &PaymentVerification) -> PortResult<bool>;
}

/// Source of the current time. Quota periods follow the local wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn local_now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
