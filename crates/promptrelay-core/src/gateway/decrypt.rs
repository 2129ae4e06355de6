//! RSA-OAEP decryption of marked message content, with plaintext caching.

use std::sync::Arc;

use rsa::{Oaep, RsaPrivateKey};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::cache::DecryptionCache;
use crate::gateway::metrics;
use crate::models::Message;
use crate::policy::PolicySnapshot;

/// Prefix marking message content as encrypted. Everything after it is the
/// hex-encoded RSA-OAEP ciphertext.
pub const ENCRYPTION_MARKER: &str = "ENC:";

pub fn is_encrypted(content: &str) -> bool {
    content.starts_with(ENCRYPTION_MARKER)
}

/// Hex SHA-256 of the full marked string, used as the cache key.
pub(crate) fn content_digest(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Decrypts marked message content before forwarding.
///
/// Decryption is best effort by contract: any failure (bad hex, wrong key,
/// non-UTF-8 plaintext, no key configured) leaves the content exactly as it
/// arrived and the request proceeds. Rejecting would turn a client-side
/// encryption bug into an outage.
#[derive(Clone)]
pub struct DecryptionEngine {
    cache: Arc<DecryptionCache>,
}

impl DecryptionEngine {
    pub fn new(cache: Arc<DecryptionCache>) -> Self {
        Self { cache }
    }

    /// Rewrites every marked message in place, first to last. Unmarked
    /// messages and failed decryptions are left untouched.
    pub fn decrypt_messages(&self, snapshot: &PolicySnapshot, messages: &mut [Message]) {
        for message in messages.iter_mut() {
            if !is_encrypted(&message.content) {
                continue;
            }
            if let Some(plaintext) = self.decrypt_content(snapshot, &message.content) {
                message.content = plaintext;
            }
        }
    }

    /// `None` means pass the original content through unchanged.
    fn decrypt_content(&self, snapshot: &PolicySnapshot, content: &str) -> Option<String> {
        let digest = content_digest(content);
        if let Some(plaintext) = self.cache.get(&digest) {
            metrics::record_decrypt_cache(true);
            return Some(plaintext);
        }
        metrics::record_decrypt_cache(false);

        let payload = content.strip_prefix(ENCRYPTION_MARKER)?;
        let Some(key) = snapshot.decryption_key.as_deref() else {
            warn!("Encrypted content received but no key is configured, forwarding as-is");
            metrics::record_decrypt("skipped");
            return None;
        };

        match decrypt_payload(key, payload) {
            Ok(plaintext) => {
                metrics::record_decrypt("ok");
                self.cache.put(digest, plaintext.clone());
                Some(plaintext)
            }
            Err(e) => {
                warn!("Forwarding encrypted content unchanged: {e}");
                metrics::record_decrypt("error");
                None
            }
        }
    }
}

fn decrypt_payload(key: &RsaPrivateKey, hex_payload: &str) -> GatewayResult<String> {
    let ciphertext = hex::decode(hex_payload)
        .map_err(|e| GatewayError::Decryption(format!("payload is not valid hex: {e}")))?;
    let plaintext = key
        .decrypt(Oaep::new::<Sha256>(), &ciphertext)
        .map_err(|e| GatewayError::Decryption(format!("RSA-OAEP decryption failed: {e}")))?;
    String::from_utf8(plaintext)
        .map_err(|e| GatewayError::Decryption(format!("plaintext is not valid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPublicKey;

    fn test_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate key")
    }

    fn snapshot_with(key: Option<RsaPrivateKey>) -> PolicySnapshot {
        PolicySnapshot { decryption_key: key.map(Arc::new), ..PolicySnapshot::default() }
    }

    fn encrypt(key: &RsaPrivateKey, plaintext: &str) -> String {
        let ciphertext = RsaPublicKey::from(key)
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), plaintext.as_bytes())
            .expect("encrypt");
        format!("{ENCRYPTION_MARKER}{}", hex::encode(ciphertext))
    }

    fn engine() -> (DecryptionEngine, Arc<DecryptionCache>) {
        let cache = Arc::new(DecryptionCache::new());
        (DecryptionEngine::new(Arc::clone(&cache)), cache)
    }

    #[test]
    fn marked_content_is_decrypted_in_place() {
        let key = test_key();
        let marked = encrypt(&key, "hello upstream");
        let snapshot = snapshot_with(Some(key));
        let (engine, cache) = engine();

        let mut messages = vec![Message::new("user", &marked)];
        engine.decrypt_messages(&snapshot, &mut messages);

        assert_eq!(messages[0].content, "hello upstream");
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn second_occurrence_is_served_from_cache() {
        let key = test_key();
        let marked = encrypt(&key, "cached plaintext");
        let snapshot = snapshot_with(Some(key));
        let (engine, cache) = engine();

        let mut first = vec![Message::new("user", &marked)];
        engine.decrypt_messages(&snapshot, &mut first);

        // Poison the key: a second pass over the same ciphertext must still
        // succeed because it resolves through the cache.
        let keyless = snapshot_with(None);
        let mut second = vec![Message::new("user", &marked)];
        engine.decrypt_messages(&keyless, &mut second);

        assert_eq!(second[0].content, "cached plaintext");
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn unmarked_content_is_never_touched() {
        let snapshot = snapshot_with(Some(test_key()));
        let (engine, cache) = engine();

        let mut messages = vec![Message::new("user", "plain text, nothing to do")];
        engine.decrypt_messages(&snapshot, &mut messages);

        assert_eq!(messages[0].content, "plain text, nothing to do");
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn mixed_conversations_decrypt_in_order() {
        let key = test_key();
        let first = encrypt(&key, "first secret");
        let second = encrypt(&key, "second secret");
        let snapshot = snapshot_with(Some(key));
        let (engine, _cache) = engine();

        let mut messages = vec![
            Message::new("system", "you are a test fixture"),
            Message::new("user", &first),
            Message::new("assistant", "noted"),
            Message::new("user", &second),
        ];
        engine.decrypt_messages(&snapshot, &mut messages);

        assert_eq!(messages[0].content, "you are a test fixture");
        assert_eq!(messages[1].content, "first secret");
        assert_eq!(messages[2].content, "noted");
        assert_eq!(messages[3].content, "second secret");
    }

    #[test]
    fn invalid_hex_passes_through() {
        let snapshot = snapshot_with(Some(test_key()));
        let (engine, cache) = engine();

        let mut messages = vec![Message::new("user", "ENC:zz-not-hex")];
        engine.decrypt_messages(&snapshot, &mut messages);

        assert_eq!(messages[0].content, "ENC:zz-not-hex");
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn wrong_key_passes_through() {
        let marked = encrypt(&test_key(), "sealed for someone else");
        let snapshot = snapshot_with(Some(test_key()));
        let (engine, cache) = engine();

        let mut messages = vec![Message::new("user", &marked)];
        engine.decrypt_messages(&snapshot, &mut messages);

        assert_eq!(messages[0].content, marked);
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn missing_key_passes_through() {
        let marked = encrypt(&test_key(), "no key on this gateway");
        let snapshot = snapshot_with(None);
        let (engine, _cache) = engine();

        let mut messages = vec![Message::new("user", &marked)];
        engine.decrypt_messages(&snapshot, &mut messages);

        assert_eq!(messages[0].content, marked);
    }

    #[test]
    fn decrypted_output_carries_no_marker() {
        let key = test_key();
        let marked = encrypt(&key, "ENC-free plaintext");
        let snapshot = snapshot_with(Some(key));
        let (engine, _cache) = engine();

        let mut messages = vec![Message::new("user", &marked)];
        engine.decrypt_messages(&snapshot, &mut messages);
        // A second pass sees plain content and leaves it alone.
        engine.decrypt_messages(&snapshot, &mut messages);

        assert_eq!(messages[0].content, "ENC-free plaintext");
    }
}
