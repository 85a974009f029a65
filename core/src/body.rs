//! Body-encoding decision for outgoing payloads.
//!
//! The decision is evaluated in a fixed order:
//! 1. a multipart form is sent as multipart, whatever the headers say;
//! 2. a content-type of exactly `application/x-www-form-urlencoded` selects
//!    url-encoding;
//! 3. everything else is JSON, and `content-type: application/json` is added
//!    when no content-type is present.

use serde_json::Value;
use url::form_urlencoded;

use crate::error::{RequestError, Result};
use crate::headers::{self, HeaderSet};
use crate::http::RequestBody;
use crate::types::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Multipart,
    UrlEncoded,
    Json,
}

impl BodyEncoding {
    pub fn select(payload: &Payload, headers: &HeaderSet) -> Self {
        if matches!(payload, Payload::Form(_)) {
            BodyEncoding::Multipart
        } else if headers.get(headers::CONTENT_TYPE) == Some(headers::FORM_URLENCODED) {
            BodyEncoding::UrlEncoded
        } else {
            BodyEncoding::Json
        }
    }
}

/// Encode `payload` for the wire, adding a JSON content-type to `headers`
/// when the JSON branch is taken and none is set.
pub(crate) fn encode(payload: &Payload, headers: &mut HeaderSet) -> Result<RequestBody> {
    match (BodyEncoding::select(payload, headers), payload) {
        (BodyEncoding::Multipart, Payload::Form(form)) => Ok(RequestBody::Multipart(form.clone())),
        (BodyEncoding::UrlEncoded, payload) => url_encode(payload).map(RequestBody::Text),
        (_, payload) => {
            if !headers.contains(headers::CONTENT_TYPE) {
                headers.insert(headers::CONTENT_TYPE, headers::APPLICATION_JSON);
            }
            json_encode(payload).map(RequestBody::Text)
        }
    }
}

fn json_encode(payload: &Payload) -> Result<String> {
    let encoded = match payload {
        Payload::Json(value) => serde_json::to_string(value),
        Payload::Text(text) => serde_json::to_string(text),
        Payload::Form(_) => {
            return Err(RequestError::Encode(
                "multipart form cannot be sent as JSON".to_string(),
            ))
        }
    };
    encoded.map_err(|e| RequestError::Encode(e.to_string()))
}

fn url_encode(payload: &Payload) -> Result<String> {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    match payload {
        // Re-serializing normalizes the escaping; a leading '?' is dropped.
        Payload::Text(text) => {
            let query = text.strip_prefix('?').unwrap_or(text);
            serializer.extend_pairs(form_urlencoded::parse(query.as_bytes()));
        }
        Payload::Json(Value::Object(fields)) => {
            for (name, value) in fields {
                serializer.append_pair(name, &form_value(value));
            }
        }
        Payload::Json(other) => {
            return Err(RequestError::Encode(format!(
                "url-encoded payload must be an object or a query string, got {other}"
            )))
        }
        Payload::Form(_) => {
            return Err(RequestError::Encode(
                "multipart form cannot be url-encoded".to_string(),
            ))
        }
    }
    Ok(serializer.finish())
}

/// Strings go out raw, arrays comma-joined, everything else as JSON text.
fn form_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(form_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}
