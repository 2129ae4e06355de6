//! Bounded plaintext cache keyed by digest of the encrypted content.

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::time::Duration;

const CACHE_CAPACITY: u64 = 10_000;
const CACHE_TTL: Duration = Duration::from_secs(3600);

/// LRU cache of decrypted message content.
///
/// Keys are SHA-256 digests of the full marked ciphertext string, so equal
/// inputs across requests hit without re-running the RSA operation. Entries
/// expire after an hour to bound how long plaintext stays resident.
pub struct DecryptionCache {
    entries: Cache<String, String>,
}

impl DecryptionCache {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    pub fn get(&self, digest: &str) -> Option<String> {
        self.entries.get(digest)
    }

    pub fn put(&self, digest: String, plaintext: String) {
        self.entries.insert(digest, plaintext);
    }

    /// Drops every entry. Called when the decryption key rotates so stale
    /// plaintext cannot be served for ciphertext the new key would reject.
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}

impl Default for DecryptionCache {
    fn default() -> Self {
        Self::new()
    }
}
