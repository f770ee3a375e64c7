use crate::intercept::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tile_store::storage::purge_expired;

/// The one recognized maintenance action. Anything else is ignored.
pub const PURGE_EXPIRED_TILES: &str = "PURGE_EXPIRED_TILES";

#[derive(Debug, Deserialize)]
pub struct PageMessage {
    pub action: String,
}

/// Parse a message payload. A payload that is not valid JSON is a no-op
/// with a logged warning, never a crash.
pub fn parse_message(payload: &str) -> Option<PageMessage> {
    match serde_json::from_str(payload) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!(error = %e, "discarding malformed message payload");
            None
        }
    }
}

/// POST /api/message — JSON-encoded string payload from the controlling
/// page, e.g. `{"action":"PURGE_EXPIRED_TILES"}`.
pub async fn message_handler(
    State(state): State<Arc<AppState>>,
    payload: String,
) -> impl IntoResponse {
    let Some(message) = parse_message(&payload) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "malformed message payload"})),
        );
    };

    match message.action.as_str() {
        PURGE_EXPIRED_TILES => {
            let store = state.storage.open(&state.config.cache.store_name());
            let purged = purge_expired(&store, Utc::now());
            metrics::counter!("tilegate_purged_entries_total").increment(purged as u64);
            tracing::info!(purged, remaining = store.len(), "purge sweep finished");

            (
                StatusCode::OK,
                Json(serde_json::json!({"action": message.action, "purged": purged})),
            )
        }
        other => {
            tracing::debug!(action = %other, "ignoring unrecognized message action");
            (
                StatusCode::OK,
                Json(serde_json::json!({"action": other, "ignored": true})),
            )
        }
    }
}

/// GET /api/stats — one-shot view of the store.
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_name = state.config.cache.store_name();
    let store = state.storage.open(&store_name);

    Json(serde_json::json!({
        "store": store_name,
        "entries": store.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::Duration;
    use hyper_util::client::legacy::Client;
    use hyper_util::rt::TokioExecutor;
    use tile_store::expiry::format_http_date;
    use tile_store::{CacheStorage, StoredResponse, EXPIRES_HEADER};

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            storage: CacheStorage::new(),
            client: Client::builder(TokioExecutor::new()).build_http(),
            config: Config::default_config(),
        })
    }

    fn entry_expiring_in(millis: i64) -> StoredResponse {
        StoredResponse {
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![(
                EXPIRES_HEADER.to_string(),
                format_http_date(Utc::now() + Duration::milliseconds(millis)),
            )],
            body: bytes::Bytes::from_static(b"tile"),
        }
    }

    #[test]
    fn parse_accepts_purge_action() {
        let message = parse_message(r#"{"action":"PURGE_EXPIRED_TILES"}"#).unwrap();
        assert_eq!(message.action, PURGE_EXPIRED_TILES);
    }

    #[test]
    fn parse_rejects_malformed_payloads() {
        assert!(parse_message("not json").is_none());
        assert!(parse_message("").is_none());
        assert!(parse_message(r#"{"no_action": true}"#).is_none());
    }

    #[tokio::test]
    async fn purge_message_deletes_only_expired_entries() {
        let state = test_state();
        let store = state.storage.open("cache-tiles");
        store.put("/expired".into(), entry_expiring_in(-60_000));
        store.put("/fresh".into(), entry_expiring_in(3_600_000));

        let response = message_handler(
            State(Arc::clone(&state)),
            r#"{"action":"PURGE_EXPIRED_TILES"}"#.to_string(),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(store.match_key("/expired").is_none());
        assert!(store.match_key("/fresh").is_some());
    }

    #[tokio::test]
    async fn unrecognized_action_deletes_nothing() {
        let state = test_state();
        let store = state.storage.open("cache-tiles");
        store.put("/expired".into(), entry_expiring_in(-60_000));

        let response = message_handler(
            State(Arc::clone(&state)),
            r#"{"action":"NOOP"}"#.to_string(),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn malformed_payload_is_a_bad_request_noop() {
        let state = test_state();
        let store = state.storage.open("cache-tiles");
        store.put("/expired".into(), entry_expiring_in(-60_000));

        let response = message_handler(State(Arc::clone(&state)), "{broken".to_string())
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.len(), 1);
    }
}
