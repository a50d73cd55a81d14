//! services/api/tests/routes.rs
//!
//! Drives the full router in-process with an in-memory store and stubbed
//! research and payment backends.

use api_lib::adapters::MemoryStore;
use api_lib::config::Config;
use api_lib::web::{router, state::AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use pretty_assertions::assert_eq;
use research_copilot_core::domain::{CitedWork, ReferenceRecord, Section};
use research_copilot_core::ports::{
    Clock, OrderRequest, PaymentGateway, PaymentOrder, PaymentVerification, PortResult,
    ResearchRequest, ResearchService,
};
use research_copilot_core::{QueryError, QueryResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct StubResearch;

#[async_trait]
impl ResearchService for StubResearch {
    async fn research(&self, request: &ResearchRequest) -> Result<QueryResponse, QueryError> {
        if request.query.contains("overloaded") {
            return Err(QueryError::ServerError("upstream returned 500".into()));
        }
        if request.query.contains("slow") {
            return Err(QueryError::Timeout);
        }
        if request.query.contains("busy") {
            return Err(QueryError::RateLimited);
        }
        Ok(QueryResponse {
            summary: "Self-attention replaced recurrence [Vaswani 2017].".into(),
            sections: vec![Section {
                title: "Background".into(),
                content: "See [Unknown 1999] and [Vaswani 2017].".into(),
            }],
            references: vec![ReferenceRecord::Structured(CitedWork {
                citation_label: Some("Vaswani et al. 2017".into()),
                title: Some("Attention Is All You Need".into()),
                year: Some("2017".into()),
                url: Some("https://arxiv.org/abs/1706.03762".into()),
                category: Some("conference".into()),
                ..CitedWork::default()
            })],
            key_terms: vec!["transformer".into()],
            ..QueryResponse::default()
        })
    }
}

struct StubGateway;

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(&self, request: &OrderRequest) -> PortResult<PaymentOrder> {
        Ok(PaymentOrder {
            order_id: "order_test_1".into(),
            amount: u64::from(request.amount) * 100,
            currency: "INR".into(),
            key_id: "rzp_test_key".into(),
        })
    }

    async fn verify_payment(&self, payload: &PaymentVerification) -> PortResult<bool> {
        Ok(payload.razorpay_signature == "valid-signature")
    }
}

struct NoonClock;

impl Clock for NoonClock {
    fn now(&self) -> DateTime<Utc> {
        self.local_now().and_utc()
    }

    fn local_now(&self) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: None,
        log_level: tracing::Level::INFO,
        openai_api_key: None,
        research_model: "test-model".into(),
        query_timeout: Duration::from_secs(120),
        cors_origin: "http://localhost:3000".into(),
        session_ttl_days: 30,
        payments: None,
    }
}

fn app(with_payments: bool) -> Router {
    let gateway: Option<Arc<dyn PaymentGateway>> = if with_payments {
        Some(Arc::new(StubGateway))
    } else {
        None
    };
    let state = AppState::new(
        Arc::new(test_config()),
        Arc::new(MemoryStore::new()),
        Arc::new(StubResearch),
        gateway,
        Arc::new(NoonClock),
    );
    router(Arc::new(state)).unwrap()
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, set_cookie, json)
}

async fn signup(app: &Router, email: &str) -> String {
    let (status, cookie, body) = send(
        app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({ "email": email, "password": "correct horse", "displayName": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["quota"]["remaining"], 5);
    cookie.expect("signup sets a session cookie")
}

#[tokio::test]
async fn health_and_pricing_are_public() {
    let app = app(false);
    let (status, _, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _, body) = send(&app, "GET", "/api/pricing?student=true", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["free"]["dailyQueries"], 5);
    let monthly = &body["plans"][0];
    assert_eq!(monthly["plan"], "pro-monthly");
    assert_eq!(monthly["original"], 399);
    assert_eq!(monthly["discounted"], 239);
    assert_eq!(monthly["displayPrice"], "₹239");
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = app(false);
    let (status, _, _) =
        send(&app, "POST", "/api/query", None, Some(json!({ "query": "q" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&app, "GET", "/api/quota", Some("session=not-a-session"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let app = app(false);
    signup(&app, "dup@example.com").await;
    let (status, _, _) = send(
        &app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({ "email": "DUP@example.com", "password": "another secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() {
    let app = app(false);
    signup(&app, "ada@example.com").await;
    let (status, cookie, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "wrong password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(cookie, None);

    let (status, cookie, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookie.is_some());
}

#[tokio::test]
async fn delivered_query_is_linked_and_counted() {
    let app = app(false);
    let cookie = signup(&app, "ada@example.com").await;

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/query",
        Some(&cookie),
        Some(json!({ "query": "  transformers  " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["queryText"], "transformers");
    assert_eq!(body["quota"]["remaining"], 4);

    let summary = body["linked"]["summary"].as_array().unwrap();
    assert_eq!(summary.len(), 3);
    assert_eq!(summary[1]["type"], "citation");
    assert_eq!(summary[1]["marker"], "[Vaswani 2017]");
    assert_eq!(summary[1]["reference"]["url"], "https://arxiv.org/abs/1706.03762");

    let section = body["linked"]["sections"][0]["segments"].as_array().unwrap();
    assert_eq!(section[1]["label"], "Unknown 1999");
    assert!(section[1].get("reference").is_none());

    let (_, _, history) = send(&app, "GET", "/api/history", Some(&cookie), None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    let (_, _, recent) = send(&app, "GET", "/api/recent", Some(&cookie), None).await;
    assert_eq!(recent[0]["query"], "transformers");
}

#[tokio::test]
async fn sixth_free_query_needs_an_upgrade() {
    let app = app(false);
    let cookie = signup(&app, "ada@example.com").await;
    for _ in 0..5 {
        let (status, _, _) =
            send(&app, "POST", "/api/query", Some(&cookie), Some(json!({ "query": "q" }))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _, body) =
        send(&app, "POST", "/api/query", Some(&cookie), Some(json!({ "query": "q" }))).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "quota_exceeded");
    assert_eq!(body["result"], Value::Null);

    let (_, _, quota) = send(&app, "GET", "/api/quota", Some(&cookie), None).await;
    assert_eq!(quota["canSubmit"], false);
    assert_eq!(quota["remaining"], 0);
    assert_eq!(quota["resetsIn"]["hours"], 12);
}

#[tokio::test]
async fn empty_and_failed_queries_do_not_consume_quota() {
    let app = app(false);
    let cookie = signup(&app, "ada@example.com").await;

    let (status, _, body) =
        send(&app, "POST", "/api/query", Some(&cookie), Some(json!({ "query": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty_query");

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/query",
        Some(&cookie),
        Some(json!({ "query": "overloaded topic" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "server_error");
    assert_eq!(body["result"]["loading"], false);
    assert_eq!(body["result"]["error"], "server_error");

    let (_, _, quota) = send(&app, "GET", "/api/quota", Some(&cookie), None).await;
    assert_eq!(quota["remaining"], 5);
    assert_eq!(quota["totalQueries"], 0);
}

#[tokio::test]
async fn timed_out_and_rate_limited_queries_map_to_gateway_statuses() {
    let app = app(false);
    let cookie = signup(&app, "ada@example.com").await;

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/query",
        Some(&cookie),
        Some(json!({ "query": "slow topic" })),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "timeout");
    assert_eq!(body["result"]["error"], "timeout");

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/query",
        Some(&cookie),
        Some(json!({ "query": "busy topic" })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");

    let (_, _, quota) = send(&app, "GET", "/api/quota", Some(&cookie), None).await;
    assert_eq!(quota["remaining"], 5);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = app(false);
    let cookie = signup(&app, "ada@example.com").await;

    let (status, cleared, _) = send(&app, "POST", "/auth/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared.as_deref(), Some("session="));

    let (status, _, _) = send(&app, "GET", "/api/account", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn payments_are_unavailable_without_a_gateway() {
    let app = app(false);
    let cookie = signup(&app, "ada@example.com").await;
    let (status, _, _) = send(
        &app,
        "POST",
        "/api/create-order",
        Some(&cookie),
        Some(json!({ "plan": "pro-monthly" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn verified_payment_upgrades_to_unlimited() {
    let app = app(true);
    let cookie = signup(&app, "ada@example.com").await;

    let (status, _, _) = send(
        &app,
        "POST",
        "/api/create-order",
        Some(&cookie),
        Some(json!({ "plan": "gold" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, order) = send(
        &app,
        "POST",
        "/api/create-order",
        Some(&cookie),
        Some(json!({ "plan": "pro-monthly" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["amount"], 39900);

    let callback = |signature: &str| {
        json!({
            "razorpay_order_id": "order_test_1",
            "razorpay_payment_id": "pay_1",
            "razorpay_signature": signature,
        })
    };
    let (status, _, _) =
        send(&app, "POST", "/api/verify-payment", Some(&cookie), Some(callback("forged"))).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/verify-payment",
        Some(&cookie),
        Some(callback("valid-signature")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["account"]["subscriptionTier"], "pro");
    assert_eq!(body["account"]["quota"]["remaining"], -1);

    let (status, _, _) = send(
        &app,
        "POST",
        "/api/verify-payment",
        Some(&cookie),
        Some(callback("valid-signature")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
