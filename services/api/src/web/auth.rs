//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use research_copilot_core::{AccountError, AuthSession};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::web::middleware::{session_id, SESSION_COOKIE};
use crate::web::rest::AccountView;
use crate::web::state::AppState;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn session_cookie(session: &AuthSession, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, session.id, max_age_secs
    )
}

fn valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new account on the free tier
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = AccountView),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Account already exists"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !valid_email(&req.email) {
        return Err((StatusCode::BAD_REQUEST, "A valid email is required".to_string()));
    }
    if req.password.len() < 8 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters".to_string(),
        ));
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })?
        .to_string();

    // 2. Create the account
    state
        .accounts
        .signup(&req.email, req.display_name.as_deref(), &password_hash)
        .await
        .map_err(|e| match e {
            AccountError::AlreadyExists(_) => {
                (StatusCode::CONFLICT, "User already exists".to_string())
            }
            other => {
                error!("Failed to create account: {:?}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create account".to_string())
            }
        })?;

    // 3. Open a session for the new account
    let (session, account) = state.accounts.open_session(&req.email).await.map_err(|e| {
        error!("Failed to create auth session: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
    })?;

    let cookie = session_cookie(&session, state.accounts.session_ttl().num_seconds());
    let view = AccountView::new(&account, state.desk.quota(&account));
    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(view)))
}

/// POST /auth/login - Login with an existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AccountView),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string());

    // 1. Get credentials by email
    let credentials = state.accounts.credentials(&req.email).await.map_err(|e| {
        info!("Login failed: {}", e);
        invalid()
    })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&credentials.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid());
    }

    // 3. Open a session; this also commits a pending daily reset
    let (session, account) = state.accounts.open_session(&req.email).await.map_err(|e| {
        error!("Failed to create auth session: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
    })?;

    let cookie = session_cookie(&session, state.accounts.session_ttl().num_seconds());
    let view = AccountView::new(&account, state.desk.quota(&account));
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(view)))
}

/// POST /auth/logout - Logout, invalidate the session and clear result history
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id =
        session_id(&headers).ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state.accounts.logout(auth_session_id).await.map_err(|e| {
        error!("Failed to delete auth session: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
    })?;

    let cookie = format!("{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE);
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

#[cfg(test)]
mod tests {
    use super::valid_email;

    #[test]
    fn email_shape_check() {
        assert!(valid_email("a@b.in"));
        assert!(!valid_email("a@b"));
        assert!(!valid_email("@b.in"));
        assert!(!valid_email("a b@c.in"));
    }
}
