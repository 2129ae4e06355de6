//! Test helpers for promptrelay-server unit tests.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use promptrelay_core::gateway::cache::DecryptionCache;
use promptrelay_core::{GatewayState, PolicyStore};

use crate::state::AppState;

/// Create a minimal `AppState` over a fresh policy file.
///
/// Returns `(AppState, TempDir)` — keep `TempDir` alive for the test duration.
pub fn test_app_state(admin_token: Option<&str>) -> (AppState, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let policy = Arc::new(PolicyStore::open(
        temp_dir.path().join("config.json"),
        Arc::new(DecryptionCache::new()),
    ));
    let gateway = GatewayState::new(Arc::clone(&policy), Duration::from_secs(30))
        .expect("failed to create test GatewayState");

    let state = AppState::new(gateway, policy, admin_token.map(str::to_string));
    (state, temp_dir)
}
