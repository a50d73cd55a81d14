//! services/api/src/adapters/payments.rs
//!
//! This module contains the Razorpay adapter, the concrete implementation of the
//! `PaymentGateway` port. Orders are created over the REST API; checkout callbacks
//! are verified locally with the HMAC-SHA256 signature scheme.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use research_copilot_core::ports::{
    OrderRequest, PaymentGateway, PaymentOrder, PaymentVerification, PortError, PortResult,
};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{error, info};

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

const CURRENCY: &str = "INR";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct RazorpayAdapter {
    http: reqwest::Client,
    config: PaymentConfig,
}

/// The subset of the order resource we read back.
#[derive(Deserialize)]
struct OrderRecord {
    id: String,
    amount: u64,
    currency: String,
}

impl RazorpayAdapter {
    pub fn new(http: reqwest::Client, config: PaymentConfig) -> Self {
        Self { http, config }
    }

    /// Checks `signature` against HMAC-SHA256(`order_id|payment_id`) in constant time.
    pub fn signature_matches(
        secret: &str,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

//=========================================================================================
// `PaymentGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl PaymentGateway for RazorpayAdapter {
    async fn create_order(&self, request: &OrderRequest) -> PortResult<PaymentOrder> {
        let body = json!({
            // Amounts are sent in paise.
            "amount": u64::from(request.amount) * 100,
            "currency": CURRENCY,
            "receipt": format!("rc_{}", request.user_id.simple()),
            "notes": {
                "plan": request.plan.as_str(),
                "user_id": request.user_id.to_string(),
                "email": request.email,
                "name": request.name,
            }
        });

        let response = self
            .http
            .post(format!("{}/orders", self.config.api_base))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(%status, body = %text, "Order creation rejected by gateway");
            return Err(PortError::Unexpected(format!(
                "gateway responded with {}",
                status
            )));
        }

        let order: OrderRecord = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        info!(order_id = %order.id, amount = order.amount, "Gateway order created");

        Ok(PaymentOrder {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            key_id: self.config.key_id.clone(),
        })
    }

    async fn verify_payment(&self, payload: &PaymentVerification) -> PortResult<bool> {
        Ok(Self::signature_matches(
            &self.config.key_secret,
            &payload.razorpay_order_id,
            &payload.razorpay_payment_id,
            &payload.razorpay_signature,
        ))
    }
}
