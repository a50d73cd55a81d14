//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the research and account endpoints and the
//! master definition for the OpenAPI specification.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use chrono::{DateTime, Utc};
use research_copilot_core::citation::{self, LinkedResult};
use research_copilot_core::domain::Subscription;
use research_copilot_core::pricing::{self, PlanId, PriceDetails};
use research_copilot_core::{
    DeskError, QueryError, QueryErrorKind, QueryResult, QuotaStatus, SubscriptionTier, UserAccount,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::auth::{LoginRequest, SignupRequest};
use crate::web::middleware::CurrentUser;
use crate::web::payments::{CreateOrderRequest, VerifyPaymentRequest};
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        health_handler,
        pricing_handler,
        account_handler,
        quota_handler,
        query_handler,
        history_handler,
        recent_handler,
        crate::web::payments::create_order_handler,
        crate::web::payments::verify_payment_handler,
    ),
    components(
        schemas(
            SignupRequest,
            LoginRequest,
            AccountView,
            QueryRequest,
            QueryReply,
            QueryFailure,
            CreateOrderRequest,
            VerifyPaymentRequest,
        )
    ),
    tags(
        (name = "Research Copilot API", description = "Research queries with daily quotas, citations and plan upgrades.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

/// An account as the client sees it, with its current quota.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub is_student: bool,
    #[schema(value_type = String)]
    pub subscription_tier: SubscriptionTier,
    #[schema(value_type = Option<Object>)]
    pub subscription: Option<Subscription>,
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub quota: QuotaStatus,
}

impl AccountView {
    pub fn new(account: &UserAccount, quota: QuotaStatus) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            display_name: account.display_name.clone(),
            is_student: account.is_student,
            subscription_tier: account.subscription_tier,
            subscription: account.subscription.clone(),
            created_at: account.created_at,
            quota,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct QueryRequest {
    pub query: String,
}

/// A delivered research result with its prose cut into citation segments.
#[derive(Serialize, ToSchema)]
pub struct QueryReply {
    #[schema(value_type = Object)]
    pub result: QueryResult,
    #[schema(value_type = Object)]
    pub linked: LinkedResult,
    #[schema(value_type = Object)]
    pub quota: QuotaStatus,
}

/// Why a query produced no answer. `result` is the failed slot, when one was opened.
#[derive(Serialize, ToSchema)]
pub struct QueryFailure {
    #[schema(value_type = String)]
    pub error: QueryErrorKind,
    pub message: String,
    pub guidance: String,
    #[schema(value_type = Option<Object>)]
    pub result: Option<QueryResult>,
}

#[derive(Deserialize)]
pub struct PricingParams {
    #[serde(default)]
    pub student: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    #[serde(flatten)]
    pub price: PriceDetails,
    pub display_price: String,
    pub limits: pricing::TierLimits,
}

pub fn status_for(kind: QueryErrorKind) -> StatusCode {
    match kind {
        QueryErrorKind::NotAuthenticated => StatusCode::UNAUTHORIZED,
        QueryErrorKind::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
        QueryErrorKind::EmptyQuery => StatusCode::BAD_REQUEST,
        QueryErrorKind::InFlight => StatusCode::CONFLICT,
        QueryErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        QueryErrorKind::Forbidden => StatusCode::FORBIDDEN,
        QueryErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        QueryErrorKind::NetworkUnavailable
        | QueryErrorKind::MalformedResponse
        | QueryErrorKind::ServerError => StatusCode::BAD_GATEWAY,
    }
}

fn failure_response(error: QueryError, result: Option<QueryResult>) -> Response {
    let (message, guidance) = error.user_message();
    let status = status_for(error.kind());
    let body = QueryFailure {
        error: error.kind(),
        message,
        guidance: guidance.to_string(),
        result,
    };
    (status, Json(body)).into_response()
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness check.
#[utoipa::path(get, path = "/health", responses((status = 200, description = "Service is up")))]
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Plans and prices, with the student discount applied when `student=true`.
#[utoipa::path(
    get,
    path = "/api/pricing",
    params(("student" = Option<bool>, Query, description = "Apply the student discount")),
    responses((status = 200, description = "Plans with prices and limits"))
)]
pub async fn pricing_handler(Query(params): Query<PricingParams>) -> impl IntoResponse {
    let plans: Vec<PlanView> = PlanId::ALL
        .into_iter()
        .map(|plan| {
            let price = plan.details(params.student);
            PlanView {
                display_price: pricing::format_price(price.discounted),
                limits: pricing::limits(plan.tier()),
                price,
            }
        })
        .collect();

    Json(serde_json::json!({
        "free": pricing::limits(SubscriptionTier::Free),
        "plans": plans,
    }))
}

/// The signed-in account.
#[utoipa::path(
    get,
    path = "/api/account",
    responses(
        (status = 200, description = "Account and quota", body = AccountView),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn account_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(account)): Extension<CurrentUser>,
) -> impl IntoResponse {
    Json(AccountView::new(&account, state.desk.quota(&account)))
}

/// Remaining queries and time until the daily reset.
#[utoipa::path(
    get,
    path = "/api/quota",
    responses(
        (status = 200, description = "Current quota"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn quota_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(account)): Extension<CurrentUser>,
) -> impl IntoResponse {
    Json(state.desk.quota(&account))
}

/// Run one research query.
///
/// Quota is consumed only when an analysis is delivered. Failures from the research
/// backend come back with the failed result slot so the client can show it in place.
#[utoipa::path(
    post,
    path = "/api/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Analysis delivered", body = QueryReply),
        (status = 400, description = "Empty query", body = QueryFailure),
        (status = 401, description = "Not signed in"),
        (status = 402, description = "Daily quota exhausted", body = QueryFailure),
        (status = 409, description = "Another query is still running", body = QueryFailure),
        (status = 429, description = "Research backend is rate limiting", body = QueryFailure),
        (status = 502, description = "Research backend failed", body = QueryFailure),
        (status = 504, description = "Research backend timed out", body = QueryFailure)
    )
)]
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(account)): Extension<CurrentUser>,
    Json(req): Json<QueryRequest>,
) -> Response {
    match state.desk.submit(Some(&account.email), &req.query).await {
        Ok(delivered) => {
            let linked = citation::link_result(&delivered.result);
            let quota = state.desk.quota(&delivered.account);
            Json(QueryReply {
                result: delivered.result,
                linked,
                quota,
            })
            .into_response()
        }
        Err(DeskError::Query { error, result }) => failure_response(error, result.map(|r| *r)),
        Err(DeskError::Port(e)) => {
            error!("Query failed on storage: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to run query".to_string()).into_response()
        }
    }
}

/// Result history for the signed-in account, oldest first.
#[utoipa::path(
    get,
    path = "/api/history",
    responses(
        (status = 200, description = "Result history"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(account)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let history = state.desk.history(&account).await.map_err(|e| {
        error!("Failed to load history: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load history".to_string())
    })?;
    Ok(Json(history.results().to_vec()))
}

/// The most recent searches, newest first.
#[utoipa::path(
    get,
    path = "/api/recent",
    responses(
        (status = 200, description = "Recent searches"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn recent_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(account)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let recent = state.desk.recent(&account.email).await.map_err(|e| {
        error!("Failed to load recent searches: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load recent searches".to_string())
    })?;
    Ok(Json(recent.shown().to_vec()))
}
