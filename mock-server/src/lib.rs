//! Test server for the dispatcher.
//!
//! Routes:
//! - `ANY /status/{code}`: responds with `code`; body from `?body=`, else the
//!   canonical reason phrase.
//! - `ANY /echo`: JSON `{ method, headers, body }` of the received request.
//! - `GET /delay/{ms}`: sleeps `ms` milliseconds, then `slept {ms}`.
//! - `GET /multiline`: a body with colons and line breaks.
//! - `GET /bytes/{n}`: `n` bytes of `large_body`.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, Method, StatusCode},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Body served by `/multiline`.
pub const MULTILINE_BODY: &str = "first: line\nsecond:: line\n\nkey: value: more\n";

/// What `/echo` saw. Header names are lowercase; repeated headers are joined
/// with `, `.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Deterministic body of `len` bytes served by `/bytes/{n}`: lines of
/// `key: value` text, so it exercises the log delimiters at any size.
pub fn large_body(len: usize) -> String {
    "line: 0123456789abcdef\n".chars().cycle().take(len).collect()
}

pub fn app() -> Router {
    Router::new()
        .route("/status/{code}", any(status))
        .route("/echo", any(echo))
        .route("/delay/{ms}", get(delay))
        .route("/multiline", get(multiline))
        .route("/bytes/{n}", get(sized_body))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "mock server listening");
    }
    axum::serve(listener, app()).await
}

async fn status(
    Path(code): Path<u16>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let Ok(status) = StatusCode::from_u16(code) else {
        return (StatusCode::BAD_REQUEST, format!("invalid status {code}"));
    };
    let body = query
        .get("body")
        .cloned()
        .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
    (status, body)
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        seen.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    Json(Echo {
        method: method.to_string(),
        headers: seen,
        body,
    })
}

async fn delay(Path(ms): Path<u64>) -> String {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    format!("slept {ms}")
}

async fn multiline() -> &'static str {
    MULTILINE_BODY
}

async fn sized_body(Path(n): Path<usize>) -> String {
    large_body(n)
}
