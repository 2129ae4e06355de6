//! Application State
//!
//! Holds shared state for the server: the gateway request-path state, the
//! policy store behind the admin API, and the admin credential.

use std::sync::Arc;
use std::time::Instant;

use promptrelay_core::{GatewayState, PolicyStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub gateway: GatewayState,
    pub policy: Arc<PolicyStore>,
    /// Bearer token for /admin. `None` rejects every admin request.
    pub admin_token: Option<String>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        gateway: GatewayState,
        policy: Arc<PolicyStore>,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                gateway,
                policy,
                admin_token: admin_token.filter(|token| !token.is_empty()),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn policy(&self) -> &Arc<PolicyStore> {
        &self.inner.policy
    }

    pub fn gateway(&self) -> &GatewayState {
        &self.inner.gateway
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.inner.admin_token.as_deref()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}
