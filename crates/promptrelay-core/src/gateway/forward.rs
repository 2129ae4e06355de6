//! The forwarding pipeline: admission, whitelist gate, decryption, relay.

use std::io;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::Json;
use futures::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::GatewayError;
use crate::gateway::metrics;
use crate::gateway::routing::resolve_target;
use crate::gateway::GatewayState;
use crate::models::RequestEnvelope;

/// Client identity used when no forwarding header is present.
pub(crate) const DEFAULT_CLIENT_KEY: &str = "localhost";

/// `POST /{route}`: admit, gate against the whitelist, decrypt marked
/// content, then relay the upstream response as it arrives.
///
/// The admission slot is tied to the response body stream, so it is held
/// until the last byte is relayed (or the caller disconnects) and released
/// exactly once on every exit path before that.
pub async fn forward_request(
    State(state): State<GatewayState>,
    Path(route): Path<String>,
    headers: HeaderMap,
    Json(mut envelope): Json<RequestEnvelope>,
) -> Result<Response, GatewayError> {
    if envelope.messages.is_empty() {
        metrics::record_rejection("empty_messages");
        return Err(GatewayError::EmptyMessages);
    }

    let request_id = short_request_id();
    let client = client_key(&headers);
    let snapshot = state.policy.current();

    let Some(guard) = state.admission.try_admit(&client, snapshot.max_concurrent_per_client)
    else {
        warn!(
            "[{request_id}] Client {client} hit the concurrency limit ({})",
            snapshot.max_concurrent_per_client
        );
        metrics::record_rejection("admission");
        return Err(GatewayError::AdmissionRejected);
    };

    let target = match resolve_target(&route) {
        Ok(target) => target,
        Err(err) => {
            metrics::record_rejection("invalid_target");
            return Err(err);
        }
    };
    if !snapshot.allows(&target) {
        warn!("[{request_id}] Target {target} is not whitelisted");
        metrics::record_rejection("whitelist");
        return Err(GatewayError::WhitelistRejected);
    }

    state.engine.decrypt_messages(&snapshot, &mut envelope.messages);

    info!(
        "[{request_id}] Forwarding {} message(s) from {client} to {target}",
        envelope.messages.len()
    );

    let upstream = match state
        .client
        .post(&target)
        .headers(filter_forward_headers(&headers))
        .timeout(state.upstream_timeout)
        .json(&envelope)
        .send()
        .await
    {
        Ok(upstream) => upstream,
        Err(err) => {
            warn!("[{request_id}] Upstream call failed: {err}");
            metrics::record_request(if err.is_timeout() { 504 } else { 502 });
            return Err(GatewayError::Upstream(err));
        }
    };

    let status = upstream.status();
    metrics::record_request(status.as_u16());
    debug!("[{request_id}] Upstream answered {status}, streaming response");

    let mut builder = Response::builder().status(status);
    if let Some(response_headers) = builder.headers_mut() {
        for (name, value) in upstream.headers() {
            // The body is re-framed by the relay, so upstream framing
            // headers must not be replayed.
            if *name == header::CONTENT_LENGTH
                || *name == header::TRANSFER_ENCODING
                || *name == header::CONNECTION
            {
                continue;
            }
            response_headers.append(name.clone(), value.clone());
        }
    }

    // The guard rides inside the stream: dropping the body (completion or
    // caller disconnect) is what releases the slot, not the handler return.
    let body = Body::from_stream(upstream.bytes_stream().map(move |chunk| {
        let _slot = &guard;
        chunk.map_err(io::Error::other)
    }));

    builder
        .body(body)
        .map_err(|e| GatewayError::Internal(format!("could not assemble relay response: {e}")))
}

/// First hop of `x-forwarded-for`, or the fixed local identity.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .map_or_else(|| DEFAULT_CLIENT_KEY.to_string(), ToString::to_string)
}

/// Inbound headers minus the hop-specific set that describes the client
/// connection rather than the upstream exchange.
fn filter_forward_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if *name == header::HOST
            || *name == header::CONTENT_LENGTH
            || *name == header::ACCEPT_ENCODING
            || *name == header::CONNECTION
        {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

fn short_request_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_key_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 70.41.3.18"));
        assert_eq!(client_key(&headers), "203.0.113.7");
    }

    #[test]
    fn client_key_defaults_when_header_is_absent_or_blank() {
        assert_eq!(client_key(&HeaderMap::new()), DEFAULT_CLIENT_KEY);

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("  "));
        assert_eq!(client_key(&headers), DEFAULT_CLIENT_KEY);
    }

    #[test]
    fn hop_headers_are_stripped_and_the_rest_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer sk-test"));
        headers.insert("x-api-key", HeaderValue::from_static("key-123"));

        let filtered = filter_forward_headers(&headers);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()), Some("Bearer sk-test"));
        assert_eq!(filtered.get("x-api-key").and_then(|v| v.to_str().ok()), Some("key-123"));
    }

    #[test]
    fn request_ids_are_eight_hex_chars() {
        let id = short_request_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
