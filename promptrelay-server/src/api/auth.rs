//! Bearer authentication for the admin surface.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Gate in front of every /admin route. With no token configured the whole
/// surface is closed; a misconfigured deployment must fail shut, not open.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.admin_token() else {
        tracing::error!("Admin request denied: no admin token is configured");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or(Some(s)))
        .or_else(|| request.headers().get("x-admin-token").and_then(|h| h.to_str().ok()));

    if presented.is_some_and(|token| constant_time_compare(token, expected)) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Admin request rejected: missing or invalid token");
        Err(StatusCode::UNAUTHORIZED)
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
