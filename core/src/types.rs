//! Per-call configuration, payloads, and decoded response values.
//!
//! # Design
//! `RequestConfig` deserializes from the same JSON shape callers already use
//! (`url`, `method`, `data`, `headers`, `responseType`). A JSON string `data`
//! is a pre-encoded form string; any other JSON value is a structured
//! payload. Multipart forms cannot come from JSON and are attached with
//! `RequestConfig::data`.
//!
//! `response_type` stays a string until dispatch so an unknown kind is
//! reported by the dispatcher like any other request error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{RequestError, Result};
use crate::headers::HeaderSet;
use crate::http::HttpMethod;

/// A file part of a multipart form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text(String),
    File(FormFile),
}

/// Ordered multipart form. Names may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    parts: Vec<(String, FormPart)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: append a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, FormPart::Text(value.into()));
        self
    }

    /// Builder-style: append a file field.
    pub fn file(mut self, name: impl Into<String>, file: FormFile) -> Self {
        self.append(name, FormPart::File(file));
        self
    }

    pub fn append(&mut self, name: impl Into<String>, part: FormPart) {
        self.parts.push((name.into(), part));
    }

    /// First part with the given name.
    pub fn get(&self, name: &str) -> Option<&FormPart> {
        self.parts
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, part)| part)
    }

    /// First text part with the given name.
    pub fn get_text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FormPart::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormPart)> {
        self.parts.iter().map(|(name, part)| (name.as_str(), part))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl IntoIterator for FormData {
    type Item = (String, FormPart);
    type IntoIter = std::vec::IntoIter<(String, FormPart)>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.into_iter()
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Structured value, sent as JSON or url-encoded depending on headers.
    Json(Value),
    /// Pre-encoded form string such as `"a=1&b=2"`.
    Text(String),
    /// Multipart form, always sent as multipart.
    Form(FormData),
}

impl Payload {
    /// Payloads that mean "no body": `null`, `false`, zero, and the empty
    /// string. A multipart form always carries a body, even when empty.
    pub fn is_blank(&self) -> bool {
        match self {
            Payload::Json(Value::Null) | Payload::Json(Value::Bool(false)) => true,
            Payload::Json(Value::Number(n)) => n.as_f64() == Some(0.0),
            Payload::Json(Value::String(text)) | Payload::Text(text) => text.is_empty(),
            Payload::Json(_) | Payload::Form(_) => false,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<FormData> for Payload {
    fn from(form: FormData) -> Self {
        Payload::Form(form)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

/// Expected shape of a successful response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    #[default]
    Json,
    Blob,
    Text,
    FormData,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Json => "json",
            ResponseKind::Blob => "blob",
            ResponseKind::Text => "text",
            ResponseKind::FormData => "formData",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseKind {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(ResponseKind::Json),
            "blob" => Ok(ResponseKind::Blob),
            "text" => Ok(ResponseKind::Text),
            "formData" => Ok(ResponseKind::FormData),
            other => Err(RequestError::UnsupportedResponseKind(other.to_owned())),
        }
    }
}

impl From<ResponseKind> for String {
    fn from(kind: ResponseKind) -> Self {
        kind.as_str().to_owned()
    }
}

/// Decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseValue {
    Json(Value),
    Blob(Vec<u8>),
    Text(String),
    FormData(FormData),
}

impl ResponseValue {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            ResponseValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ResponseValue::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&FormData> {
        match self {
            ResponseValue::FormData(form) => Some(form),
            _ => None,
        }
    }
}

/// Configuration for a single call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, deserialize_with = "deserialize_payload")]
    pub data: Option<Payload>,
    /// Per-call headers, laid over the dispatcher's global headers.
    #[serde(default)]
    pub headers: HeaderSet,
    #[serde(default = "default_response_type")]
    pub response_type: String,
}

impl RequestConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::default(),
            data: None,
            headers: HeaderSet::new(),
            response_type: default_response_type(),
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Attach any serializable value as a structured payload.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(|e| RequestError::Encode(e.to_string()))?;
        self.data = Some(Payload::Json(value));
        Ok(self)
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Accepts a `ResponseKind` or any kind name, e.g. `"text"`.
    pub fn response_type(mut self, kind: impl Into<String>) -> Self {
        self.response_type = kind.into();
        self
    }
}

/// Initial state for a `Dispatcher`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatcherDefaults {
    #[serde(default)]
    pub headers: HeaderSet,
}

impl DispatcherDefaults {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RequestError::Decode(format!("dispatcher defaults: {e}")))
    }
}

fn default_response_type() -> String {
    ResponseKind::Json.into()
}

fn deserialize_payload<'de, D>(deserializer: D) -> std::result::Result<Option<Payload>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(|value| match value {
        Value::String(text) => Payload::Text(text),
        other => Payload::Json(other),
    }))
}
