//! wfd-daemon entry point.
//!
//! Intentionally thin: tracing setup, config load, engine wiring, middleware,
//! serve. Route handlers live in `routes.rs`; shared state in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use wfd_audit::JsonlAuditWriter;
use wfd_config::EngineConfig;
use wfd_daemon::{routes, state};
use wfd_remote_http::HttpRemoteStore;
use wfd_runtime::{system_clock, CollectionEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cfg = load_config()?;
    info!(
        interval_min = cfg.sensor_reporting_interval_minutes,
        window_ms = cfg.attribution_window_ms(),
        cooldown_ms = cfg.cooldown_ms,
        "engine config loaded"
    );

    let audit_path =
        std::env::var("WFD_AUDIT_PATH").unwrap_or_else(|_| "data/audit/engine.jsonl".to_string());
    let audit = JsonlAuditWriter::new(&audit_path)
        .with_context(|| format!("open audit log {audit_path}"))?;
    let remote = HttpRemoteStore::from_config(&cfg.remote).context("build remote store")?;

    let engine = CollectionEngine::new(cfg, Box::new(audit), Box::new(remote), system_clock());
    let shared = Arc::new(state::AppState::new(engine));

    state::spawn_sync_loop(Arc::clone(&shared), Duration::from_secs(30));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8787)));
    info!("wfd-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Layered config paths from `WFD_CONFIG` (comma-separated, later wins).
/// Unset means defaults.
fn load_config() -> anyhow::Result<EngineConfig> {
    match std::env::var("WFD_CONFIG") {
        Ok(paths_raw) => {
            let paths: Vec<&str> = paths_raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            let loaded = wfd_config::load_layered_yaml(&paths)?;
            info!(config_hash = %loaded.config_hash, "layered config loaded");
            EngineConfig::from_value(&loaded.config_json)
        }
        Err(_) => Ok(EngineConfig::default()),
    }
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("WFD_BIND").ok()?.parse().ok()
}

fn cors_localhost_only() -> CorsLayer {
    CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
