//! Admin API Routes
//!
//! REST endpoints for inspecting and mutating the gateway policy, gated by
//! bearer authentication.

pub(crate) mod auth;
mod policy;

#[cfg(test)]
mod policy_tests;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Status
        .route("/status", get(get_status))
        // Whitelist
        .route(
            "/whitelist",
            get(policy::list_whitelist)
                .post(policy::add_whitelist_entry)
                .delete(policy::remove_whitelist_entry),
        )
        // Concurrency
        .route(
            "/concurrent-limit",
            get(policy::get_concurrent_limit).post(policy::set_concurrent_limit),
        )
        // Decryption key
        .route("/private-key", get(policy::get_private_key).post(policy::set_private_key))
        // Reload
        .route("/reload-config", post(policy::reload_config))
        // Fallback: return 404 for unknown admin endpoints
        .fallback(admin_not_found)
}

async fn admin_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"})))
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_seconds: u64,
    whitelist_size: usize,
    max_concurrent_per_client: u32,
    key_fingerprint: Option<String>,
    decryption_cache_entries: u64,
    policy_loaded_at: DateTime<Utc>,
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.policy().current();

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        whitelist_size: snapshot.whitelist.len(),
        max_concurrent_per_client: snapshot.max_concurrent_per_client,
        key_fingerprint: snapshot.key_fingerprint.clone(),
        decryption_cache_entries: state.policy().cache_entry_count(),
        policy_loaded_at: snapshot.loaded_at,
    })
}
