//! Promptrelay - Headless Forwarding Gateway
//!
//! A pure Rust HTTP daemon that:
//! - Forwards chat-style JSON requests to whitelisted upstreams on POST /{target}
//! - Enforces per-client concurrency limits and decrypts marked message content
//! - Provides a REST API for policy control on /admin/*
//!
//! Access via: http://localhost:8065

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit, http::StatusCode, middleware, response::IntoResponse, routing::get,
    Router,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod state;
#[cfg(test)]
mod test_helpers;

use promptrelay_core::gateway::cache::DecryptionCache;
use promptrelay_core::gateway::metrics;
use promptrelay_core::{gateway_router, GatewayState, PolicyStore, PolicyWatcher};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Must run before the first request touches a counter.
    metrics::init_metrics();

    let config_path = cli.config_path();
    info!("🚀 Promptrelay starting on port {}...", cli.port);
    info!("📄 Policy file: {}", config_path.display());

    let policy = Arc::new(PolicyStore::open(&config_path, Arc::new(DecryptionCache::new())));
    let gateway =
        GatewayState::new(Arc::clone(&policy), Duration::from_secs(cli.upstream_timeout_secs))
            .map_err(|e| anyhow::anyhow!("failed to build gateway state: {e}"))?;

    // Keep the watcher alive for the server lifetime; dropping it stops the
    // reload task.
    let _watcher = if cli.no_watch {
        info!("👁 Policy file watching disabled");
        None
    } else {
        match PolicyWatcher::spawn(Arc::clone(&policy)) {
            Ok(watcher) => {
                info!("👁 Watching {} for policy changes", config_path.display());
                Some(watcher)
            }
            Err(e) => {
                warn!("⚠️ Could not watch policy file ({e}); use POST /admin/reload-config");
                None
            }
        }
    };

    if cli.admin_token.as_deref().map_or(true, str::is_empty) {
        warn!("⚠️ No admin token configured; /admin endpoints will reject every request");
    }

    let app_state = AppState::new(gateway.clone(), Arc::clone(&policy), cli.admin_token.clone());
    let app = build_router(app_state, gateway);

    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🌐 Server listening on http://{}", addr);
    info!("🔌 Admin API at http://localhost:{}/admin/", cli.port);
    info!("🔀 Forwarding endpoint at http://localhost:{}/<target-or-alias>", cli.port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState, gateway: GatewayState) -> Router {
    // The auth layer wraps the whole nest, so unknown /admin paths also
    // require the token.
    let protected_api = Router::<AppState>::new()
        .nest("/admin", api::router())
        .layer(middleware::from_fn_with_state(state.clone(), api::auth::require_admin));

    let public_routes = Router::<AppState>::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics_text));

    // Exact routes win over the forwarding wildcard, keeping the service
    // endpoints reachable.
    protected_api
        .merge(public_routes)
        .with_state(state)
        .merge(gateway_router(gateway))
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, axum::Json(serde_json::json!({"status": "ok"})))
}

async fn metrics_text() -> String {
    metrics::render()
}
