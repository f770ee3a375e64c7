use crate::config::Config;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use std::sync::Arc;
use tile_store::expiry::{format_http_date, is_fresh};
use tile_store::{CacheStorage, StoredResponse, EXPIRES_HEADER};

pub type HttpClient = Client<hyper_util::client::legacy::connect::HttpConnector, Body>;

/// Shared application state passed to all handlers.
pub struct AppState {
    pub storage: CacheStorage,
    pub client: HttpClient,
    pub config: Config,
}

/// Axum entry point: maps the incoming request onto the upstream URL and
/// delegates to [`intercept`]. The returned future is the only completion
/// signal for the event.
pub async fn intercept_handler(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
) -> Response<Body> {
    let upstream_url = format!(
        "{}{}",
        state.config.upstream.url.trim_end_matches('/'),
        req.uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    );

    intercept(&state, &upstream_url, Utc::now()).await
}

/// Answer one intercepted request: serve the stored entry while it is
/// fresh, otherwise fetch the resource live by URL, stamp it with
/// `sw-cache-expires = now + ttl`, store it under the key, and return the
/// live response.
///
/// The upstream fetch is a plain GET on the URL — the original request
/// object is never forwarded. An upstream failure propagates as 502 with
/// nothing written; there is no stale-on-error fallback.
pub async fn intercept(state: &AppState, url: &str, now: DateTime<Utc>) -> Response<Body> {
    let store = state.storage.open(&state.config.cache.store_name());
    let verbose = state.config.cache.verbose;

    match store.match_key(url) {
        Some(entry) if is_fresh(&entry, now) => {
            if verbose {
                tracing::debug!(url, "serving from cache");
            }
            metrics::counter!("tilegate_cache_hits_total").increment(1);
            return response_from_entry(&entry);
        }
        Some(_) => {
            metrics::counter!("tilegate_cache_stale_total").increment(1);
        }
        None => {
            metrics::counter!("tilegate_cache_misses_total").increment(1);
        }
    }

    if verbose {
        tracing::debug!(url, "no fresh entry, using network");
    }

    let upstream_req = match Request::builder()
        .method(Method::GET)
        .uri(url)
        .body(Body::empty())
    {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, url, "failed to build upstream request");
            return bad_gateway();
        }
    };

    let live = match state.client.request(upstream_req).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!(error = %e, url, "upstream fetch failed");
            metrics::counter!("tilegate_upstream_failures_total").increment(1);
            return bad_gateway();
        }
    };

    let status = live.status();
    let headers = live.headers().clone();

    let body_bytes = match live.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::error!(error = %e, url, "failed to read upstream response body");
            metrics::counter!("tilegate_upstream_failures_total").increment(1);
            return bad_gateway();
        }
    };

    // Stamp and store, overwriting any stale entry under this key. The
    // store gets a copy; the live bytes go back to the caller.
    let expires = now + Duration::milliseconds(state.config.cache.ttl_millis as i64);
    let mut stored_headers = end_to_end_headers(&headers);
    stored_headers.push((EXPIRES_HEADER.to_string(), format_http_date(expires)));

    store.put(
        url.to_string(),
        StoredResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers: stored_headers,
            body: body_bytes.clone(),
        },
    );

    if verbose {
        tracing::debug!(url, expires = %format_http_date(expires), "cached until expiry");
    }

    let mut response = Response::builder().status(status);
    for (key, value) in headers.iter() {
        let k = key.as_str();
        if k == "transfer-encoding" || k == "connection" {
            continue;
        }
        response = response.header(key, value);
    }

    response.body(Body::from(body_bytes)).unwrap()
}

/// Rebuild an HTTP response from a stored entry, verbatim — including the
/// `sw-cache-expires` header written at store time.
fn response_from_entry(entry: &StoredResponse) -> Response<Body> {
    let status = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);
    let mut response = Response::builder().status(status);

    for (key, value) in &entry.headers {
        if let Ok(v) = HeaderValue::from_str(value) {
            response = response.header(key.as_str(), v);
        }
    }

    response.body(Body::from(entry.body.clone())).unwrap()
}

/// Copy end-to-end headers into storable form, dropping hop-by-hop headers
/// that must not be replayed on a later connection.
fn end_to_end_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(k, _)| {
            let k = k.as_str();
            k != "transfer-encoding" && k != "connection"
        })
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect()
}

fn bad_gateway() -> Response<Body> {
    Response::builder()
        .status(StatusCode::BAD_GATEWAY)
        .body(Body::from("Bad Gateway"))
        .unwrap()
}
