use axum::extract::Path;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use rand::Rng;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

async fn get_tile(Path((z, x, y)): Path<(u32, u32, u32)>) -> impl IntoResponse {
    // Simulate tile-server latency (5-20ms)
    let delay = rand::thread_rng().gen_range(5..=20);
    tokio::time::sleep(Duration::from_millis(delay)).await;

    // Synthetic payload; the gateway treats bodies as opaque bytes.
    // no-store exercises the gateway's indifference to server cache directives.
    let body = format!("tile z={z} x={x} y={y} latency={delay}ms").into_bytes();
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app = Router::new()
        .route("/tiles/{z}/{x}/{y}", get(get_tile))
        .route("/health", get(health));

    let addr = "0.0.0.0:3000";
    tracing::info!(addr, "demo tile backend starting");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
