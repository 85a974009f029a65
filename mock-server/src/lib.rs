//! Fixture HTTP server for exercising the request dispatcher end to end.
//!
//! Every route serves a fixed response shape (JSON, plain text, empty,
//! binary, multipart, failing status) so that each response-kind branch of
//! the dispatcher can be driven over real HTTP. `/echo` reflects the received
//! request back as JSON so callers can assert on merged headers and encoded
//! bodies.

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;

pub const FORM_BOUNDARY: &str = "fixture-boundary";
pub const FORM_CONTENT_TYPE: &str = "multipart/form-data; boundary=fixture-boundary";
pub const FIXTURE_BYTES: &[u8] = &[0x00, 0x9f, 0x92, 0x96, 0xff];

/// What `/echo` observed about the incoming request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub content_type: Option<String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/json", get(json_body))
        .route("/plain", get(plain_body))
        .route("/plain-json", get(plain_json_body))
        .route("/empty", get(empty_body))
        .route("/bytes", get(bytes_body))
        .route("/form", get(form_body))
        .route("/status/{code}", get(status))
        .route("/echo", any(echo))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Multipart body served by `/form`: one text field and one file field.
pub fn form_fixture() -> String {
    format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"name\"\r\n\
         \r\n\
         shiblin\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"avatar\"; filename=\"avatar.txt\"\r\n\
         Content-Type: text/plain\r\n\
         \r\n\
         raw-avatar\r\n\
         --{b}--\r\n",
        b = FORM_BOUNDARY
    )
}

async fn json_body() -> Json<serde_json::Value> {
    Json(json!({ "message": "hello" }))
}

async fn plain_body() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "hello")
}

async fn plain_json_body() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], r#"{"ok":true}"#)
}

async fn empty_body() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "")
}

async fn bytes_body() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        FIXTURE_BYTES.to_vec(),
    )
}

async fn form_body() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, FORM_CONTENT_TYPE)], form_fixture())
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let content_type = headers.get(header::CONTENT_TYPE.as_str()).cloned();
    tracing::debug!(%method, ?content_type, len = body.len(), "echo");
    Json(Echo {
        method: method.to_string(),
        headers,
        content_type,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
