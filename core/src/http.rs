//! HTTP transport types for the dispatcher's I/O boundary.
//!
//! # Design
//! Requests and responses are plain data. The dispatcher builds an
//! `HttpRequest` and consumes an `HttpResponse`; a `Transport` performs the
//! round-trip in between. All fields are owned so values move freely across
//! task and thread boundaries.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::types::FormData;

/// HTTP method for a request. Defaults to `GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    /// Method names are matched case-insensitively, so `"post"` is `Post`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [HttpMethod; 7] = [
            HttpMethod::Get,
            HttpMethod::Head,
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Patch,
            HttpMethod::Delete,
            HttpMethod::Options,
        ];
        ALL.into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported HTTP method: {s}"))
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Encoded request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// JSON or url-encoded text; the content-type header says which.
    Text(String),
    /// Multipart form handed to the transport verbatim. The transport picks
    /// the boundary and writes the matching content-type.
    Multipart(FormData),
}

impl RequestBody {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RequestBody::Text(text) => Some(text),
            RequestBody::Multipart(_) => None,
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by `Dispatcher::prepare`. Header names are lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by a `Transport` after executing an `HttpRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Reason phrase, e.g. `"Not Found"`. May be empty.
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The content-type header, or `""` when the response has none.
    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or_default()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
