//! Request-path components and the shared state they hang off.

pub mod admission;
pub mod cache;
pub mod decrypt;
pub mod forward;
pub mod metrics;
pub mod routing;


use std::sync::Arc;
use std::time::Duration;

use axum::routing::post;
use axum::Router;

use crate::error::GatewayResult;
use crate::gateway::admission::AdmissionController;
use crate::gateway::decrypt::DecryptionEngine;
use crate::policy::PolicyStore;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Shared state for the forwarding path. Cheap to clone; every field is a
/// handle.
#[derive(Clone)]
pub struct GatewayState {
    pub policy: Arc<PolicyStore>,
    pub admission: AdmissionController,
    pub engine: DecryptionEngine,
    pub client: reqwest::Client,
    /// Bounds the whole upstream exchange, headers through last body byte.
    pub upstream_timeout: Duration,
}

impl GatewayState {
    /// Builds the request-path state around an opened policy store. The
    /// engine shares the store's cache so key rotation flushes what the
    /// engine reads.
    pub fn new(policy: Arc<PolicyStore>, upstream_timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            // 3xx answers are relayed like any other status, never followed:
            // the whitelist vets the exact URL the caller named, not wherever
            // it points next.
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let engine = DecryptionEngine::new(policy.decryption_cache());

        Ok(Self {
            policy,
            admission: AdmissionController::new(),
            engine,
            client,
            upstream_timeout,
        })
    }
}

/// The wildcard forwarding route. Merge exact routes (health, metrics,
/// admin) before this one; the router prefers exact matches, so they stay
/// reachable.
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new().route("/*route", post(forward::forward_request)).with_state(state)
}
