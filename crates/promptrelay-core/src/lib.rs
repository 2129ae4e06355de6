//! # Promptrelay Core
//!
//! Core forwarding logic for Promptrelay: policy management, per-client
//! admission control, content decryption, and the streaming relay itself.
//!
//! ```text
//! promptrelay-core/src/
//! ├── policy/            # live-reloadable gateway policy
//! │   ├── snapshot.rs    # immutable policy view
//! │   ├── store.rs       # JSON-backed store, atomic swap on commit
//! │   └── watcher.rs     # debounced file-watch reload
//! ├── gateway/           # the request path
//! │   ├── admission.rs   # per-client in-flight caps
//! │   ├── routing.rs     # alias and URL resolution
//! │   ├── cache.rs       # bounded plaintext cache
//! │   ├── decrypt.rs     # RSA-OAEP content decryption
//! │   ├── forward.rs     # forwarding pipeline and relay
//! │   └── metrics.rs     # Prometheus counters
//! ├── models.rs          # request envelope
//! └── error.rs           # GatewayError
//! ```

#![allow(
    clippy::module_name_repetitions,
    reason = "PolicyStore/PolicySnapshot/GatewayState read better fully qualified"
)]
#![allow(
    clippy::significant_drop_tightening,
    reason = "The policy writer lock is held across validate-persist-swap on purpose"
)]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(
    test,
    allow(clippy::panic, clippy::print_stdout, clippy::assertions_on_result_states)
)]

pub mod error;
pub mod gateway;
pub mod models;
pub mod policy;

// Re-export commonly used types
pub use error::{GatewayError, GatewayResult};
pub use gateway::{gateway_router, GatewayState};
pub use models::{Message, RequestEnvelope};
pub use policy::{PolicyFile, PolicySnapshot, PolicyStore, PolicyWatcher};
