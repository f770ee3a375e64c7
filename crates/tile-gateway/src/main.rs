mod config;
mod intercept;
mod message;

use axum::routing::{any, get, post};
use axum::Router;
use config::Config;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use intercept::{intercept_handler, AppState};
use message::{message_handler, stats_handler};
use std::path::Path;
use std::sync::Arc;
use tile_store::CacheStorage;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load config once at startup; handlers receive it through AppState
    let config = if Path::new("config.toml").exists() {
        match Config::load(Path::new("config.toml")) {
            Ok(c) => {
                tracing::info!("loaded config from config.toml");
                c
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load config.toml, using defaults");
                Config::default_config()
            }
        }
    } else {
        tracing::info!("no config.toml found, using defaults");
        Config::default_config()
    };

    // Install Prometheus metrics recorder
    let prom_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("prometheus recorder");

    // Build HTTP client for upstream fetches
    let client = Client::builder(TokioExecutor::new()).build_http();

    let state = Arc::new(AppState {
        storage: CacheStorage::new(),
        client,
        config: config.clone(),
    });

    // Shutdown token for graceful shutdown
    let shutdown = CancellationToken::new();

    // Admin router: page messages, stats, Prometheus scrape (separate port)
    let admin_router = Router::new()
        .route("/api/message", post(message_handler))
        .route("/api/stats", get(stats_handler))
        .route(
            "/metrics",
            get(move || {
                let h = prom_handle.clone();
                async move { h.render() }
            }),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    // Gateway router: every path goes through the intercept (main port)
    let gateway_router = Router::new()
        .route("/{*path}", any(intercept_handler))
        .route("/", any(intercept_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let gateway_addr = config.server.listen_addr.clone();
    let admin_addr = config.server.admin_addr.clone();

    tracing::info!(
        gateway = %gateway_addr,
        admin = %admin_addr,
        upstream = %config.upstream.url,
        store = %config.cache.store_name(),
        ttl_millis = config.cache.ttl_millis,
        verbose = config.cache.verbose,
        "tile gateway starting"
    );

    let gateway_listener = tokio::net::TcpListener::bind(&gateway_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind gateway to {gateway_addr}: {e}"));

    let admin_listener = tokio::net::TcpListener::bind(&admin_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind admin to {admin_addr}: {e}"));

    // Spawn shutdown signal handler
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal(shutdown_clone).await;
    });

    // Run both servers with graceful shutdown
    let gateway_shutdown = shutdown.clone();
    let admin_shutdown = shutdown.clone();

    let gateway_future = axum::serve(gateway_listener, gateway_router)
        .with_graceful_shutdown(gateway_shutdown.cancelled_owned());

    let admin_future = axum::serve(admin_listener, admin_router)
        .with_graceful_shutdown(admin_shutdown.cancelled_owned());

    tokio::select! {
        result = gateway_future => {
            if let Err(e) = result {
                tracing::error!(error = %e, "gateway server error");
            }
        }
        result = admin_future => {
            if let Err(e) = result {
                tracing::error!(error = %e, "admin server error");
            }
        }
    }

    tracing::info!("tile gateway shut down");
}

/// Listen for SIGINT (Ctrl+C) or SIGTERM and cancel the shutdown token.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    tracing::info!("shutdown signal received, draining connections...");
    token.cancel();
}
