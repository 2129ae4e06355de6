//! Immutable policy snapshot shared by all request tasks.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rsa::RsaPrivateKey;

/// Fallback concurrency cap when no configuration exists yet.
pub const DEFAULT_MAX_CONCURRENT: u32 = 2;

/// One consistent view of the gateway policy.
///
/// Replaced wholesale by `PolicyStore`; never mutated in place, so a reader
/// holding an `Arc<PolicySnapshot>` sees a complete policy for the duration
/// of one operation.
#[derive(Clone)]
pub struct PolicySnapshot {
    /// Exact-match set of permitted upstream URLs.
    pub whitelist: HashSet<String>,
    /// Per-client concurrent request cap. Always at least 1.
    pub max_concurrent_per_client: u32,
    /// Active decryption key; absent means decryption is disabled and
    /// encrypted content is forwarded opaquely.
    pub decryption_key: Option<Arc<RsaPrivateKey>>,
    /// Hex SHA-256 of the key DER. Rotation is detected by value, not by
    /// reference.
    pub key_fingerprint: Option<String>,
    /// When this snapshot was committed.
    pub loaded_at: DateTime<Utc>,
}

impl PolicySnapshot {
    /// Exact string membership in the whitelist. No normalization.
    pub fn allows(&self, url: &str) -> bool {
        self.whitelist.contains(url)
    }
}

impl Default for PolicySnapshot {
    fn default() -> Self {
        Self {
            whitelist: HashSet::new(),
            max_concurrent_per_client: DEFAULT_MAX_CONCURRENT,
            decryption_key: None,
            key_fingerprint: None,
            loaded_at: Utc::now(),
        }
    }
}

// Key material must never reach logs, so Debug prints the fingerprint only.
impl fmt::Debug for PolicySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicySnapshot")
            .field("whitelist_len", &self.whitelist.len())
            .field("max_concurrent_per_client", &self.max_concurrent_per_client)
            .field("key_fingerprint", &self.key_fingerprint)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_closed_and_keyless() {
        let snapshot = PolicySnapshot::default();
        assert!(snapshot.whitelist.is_empty());
        assert_eq!(snapshot.max_concurrent_per_client, DEFAULT_MAX_CONCURRENT);
        assert!(snapshot.decryption_key.is_none());
        assert!(!snapshot.allows("https://example.com"));
    }

    #[test]
    fn allows_is_exact_match() {
        let mut snapshot = PolicySnapshot::default();
        snapshot.whitelist.insert("https://api.example.com/v1".to_string());
        assert!(snapshot.allows("https://api.example.com/v1"));
        assert!(!snapshot.allows("https://api.example.com/v1/"));
        assert!(!snapshot.allows("https://API.example.com/v1"));
    }
}
