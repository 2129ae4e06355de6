//! Prometheus recorder setup and the counters the gateway emits.

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder. Idempotent; the first call wins.
///
/// Must run before any counter is touched, otherwise those increments go to
/// the no-op recorder and never show up in the rendered output.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus metrics recorder");

        describe_counter!(
            "promptrelay_requests_total",
            "Forwarded requests by final response status"
        );
        describe_counter!(
            "promptrelay_rejections_total",
            "Requests refused before reaching the upstream, by reason"
        );
        describe_counter!(
            "promptrelay_decrypt_total",
            "Decryption attempts on marked message content, by outcome"
        );
        describe_counter!(
            "promptrelay_decrypt_cache_total",
            "Plaintext cache lookups, by result"
        );
        describe_counter!(
            "promptrelay_policy_reloads_total",
            "Policy file reload attempts, by result"
        );

        handle
    })
}

/// Rendered exposition text, or empty if the recorder was never installed.
pub fn render() -> String {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render).unwrap_or_default()
}

pub(crate) fn record_request(status: u16) {
    counter!("promptrelay_requests_total", "status" => status.to_string()).increment(1);
}

pub(crate) fn record_rejection(reason: &'static str) {
    counter!("promptrelay_rejections_total", "reason" => reason).increment(1);
}

pub(crate) fn record_decrypt(outcome: &'static str) {
    counter!("promptrelay_decrypt_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_decrypt_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("promptrelay_decrypt_cache_total", "result" => result).increment(1);
}

pub(crate) fn record_policy_reload(result: &'static str) {
    counter!("promptrelay_policy_reloads_total", "result" => result).increment(1);
}
