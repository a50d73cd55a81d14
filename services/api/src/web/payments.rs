//! services/api/src/web/payments.rs
//!
//! Checkout endpoints: open a gateway order for a plan, then verify the
//! widget's callback and upgrade the account.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use research_copilot_core::ports::PaymentVerification;
use research_copilot_core::{Billing, BillingError, PlanId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::web::middleware::CurrentUser;
use crate::web::rest::AccountView;
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// One of `pro-monthly`, `pro-annual`, `enterprise`.
    pub plan: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

fn billing(state: &AppState) -> Result<&Billing, (StatusCode, String)> {
    state.billing.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "Payments are not configured".to_string(),
    ))
}

/// POST /api/create-order - Open a checkout order for a plan
#[utoipa::path(
    post,
    path = "/api/create-order",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created"),
        (status = 400, description = "Unknown plan"),
        (status = 401, description = "Not signed in"),
        (status = 502, description = "Payment gateway error"),
        (status = 503, description = "Payments are not configured")
    )
)]
pub async fn create_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(account)): Extension<CurrentUser>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let billing = billing(&state)?;
    let plan: PlanId = req
        .plan
        .parse()
        .map_err(|e: String| (StatusCode::BAD_REQUEST, e))?;

    let order = billing.create_order(&account, plan).await.map_err(|e| {
        error!("Failed to create payment order: {:?}", e);
        (StatusCode::BAD_GATEWAY, "Failed to create payment order".to_string())
    })?;
    Ok(Json(order))
}

/// POST /api/verify-payment - Verify a checkout callback and activate the plan
#[utoipa::path(
    post,
    path = "/api/verify-payment",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified, plan active"),
        (status = 400, description = "Unknown order"),
        (status = 401, description = "Not signed in"),
        (status = 402, description = "Payment could not be verified"),
        (status = 403, description = "Order belongs to another account"),
        (status = 503, description = "Payments are not configured")
    )
)]
pub async fn verify_payment_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(account)): Extension<CurrentUser>,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let billing = billing(&state)?;
    let payload = PaymentVerification {
        razorpay_order_id: req.razorpay_order_id,
        razorpay_payment_id: req.razorpay_payment_id,
        razorpay_signature: req.razorpay_signature,
    };

    let upgraded = billing
        .verify_payment(&account, &payload)
        .await
        .map_err(|e| match &e {
            BillingError::UnknownOrder(_) => (StatusCode::BAD_REQUEST, e.to_string()),
            BillingError::OrderMismatch(_) => (StatusCode::FORBIDDEN, e.to_string()),
            BillingError::VerificationFailed => (StatusCode::PAYMENT_REQUIRED, e.to_string()),
            BillingError::Port(_) => {
                error!("Failed to verify payment: {:?}", e);
                (StatusCode::BAD_GATEWAY, "Failed to verify payment".to_string())
            }
        })?;

    let view = AccountView::new(&upgraded, state.desk.quota(&upgraded));
    Ok(Json(serde_json::json!({ "success": true, "account": view })))
}
