//! Per-client admission control with RAII slot release.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Tracks in-flight request counts per client identity.
///
/// Entries are created lazily on a client's first request and kept for the
/// process lifetime, so the map is bounded by the set of observed clients.
#[derive(Clone, Default)]
pub struct AdmissionController {
    active: Arc<DashMap<String, AtomicU32>>,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically reserve a slot if the client's in-flight count is below
    /// `max_concurrent`. Returns `None` when the cap is reached; the check
    /// and increment are one compare-exchange, so two racing requests cannot
    /// both take the last slot.
    pub fn try_admit(&self, client: &str, max_concurrent: u32) -> Option<AdmissionGuard> {
        self.active.entry(client.to_string()).or_insert_with(|| AtomicU32::new(0));

        let counter = self.active.get(client)?;
        loop {
            let current = counter.load(Ordering::SeqCst);
            if current >= max_concurrent {
                return None;
            }
            if counter
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                drop(counter);
                return Some(AdmissionGuard {
                    active: Arc::clone(&self.active),
                    client: client.to_string(),
                });
            }
        }
    }

    /// Current in-flight count for a client. Zero when never seen.
    pub fn active_count(&self, client: &str) -> u32 {
        self.active.get(client).map_or(0, |counter| counter.load(Ordering::SeqCst))
    }
}

/// One reserved admission slot, released exactly once when dropped.
pub struct AdmissionGuard {
    active: Arc<DashMap<String, AtomicU32>>,
    client: String,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        if let Some(counter) = self.active.get(&self.client) {
            // Saturating at zero: a release must never underflow the counter.
            let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                if count > 0 {
                    Some(count - 1)
                } else {
                    None
                }
            });
        }
    }
}
