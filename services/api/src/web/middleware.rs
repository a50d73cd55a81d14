//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use research_copilot_core::UserAccount;
use std::sync::Arc;
use tracing::debug;

use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// The signed-in account, inserted into request extensions by `require_auth`.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub UserAccount);

/// Reads the session id from the `Cookie` header.
pub fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

/// Middleware that validates the auth session cookie and loads the account.
///
/// If valid, inserts a `CurrentUser` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session = session_id(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let account = state.accounts.session_account(session).await.map_err(|e| {
        debug!("Rejected session: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(CurrentUser(account));
    Ok(next.run(req).await)
}
