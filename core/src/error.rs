//! Error type shared by the dispatcher and its transports.
//!
//! # Design
//! A non-2xx status is not a transport failure: transports hand it back as a
//! normal `HttpResponse` and the dispatcher turns it into `Transport`, which
//! keeps the status code and reason phrase. Everything the transport itself
//! could not do (connect, resolve, write headers) lands in `Network`.

use crate::types::ResponseKind;

pub type Result<T> = std::result::Result<T, RequestError>;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The server answered with a status outside 200-299.
    #[error("HTTP error! Status: {status} - {status_text}")]
    Transport { status: u16, status_text: String },

    /// The transport could not complete the round-trip.
    #[error("network failure: {0}")]
    Network(String),

    /// The body did not decode as the declared response kind.
    #[error("decoding failed: {0}")]
    Decode(String),

    #[error("Unsupported responseType: {0}")]
    UnsupportedResponseKind(String),

    /// `formData` was declared but the response is not multipart.
    #[error("Expected {expected} response but got {content_type}")]
    UnexpectedContentType {
        expected: ResponseKind,
        content_type: String,
    },

    /// The payload could not be encoded for the selected body encoding.
    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<multer::Error> for RequestError {
    fn from(e: multer::Error) -> Self {
        Self::Decode(format!("multipart: {e}"))
    }
}
