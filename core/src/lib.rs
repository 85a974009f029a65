//! Request dispatcher with global headers and lifecycle hooks.
//!
//! # Overview
//! A `Dispatcher` turns a per-call `RequestConfig` into a plain-data
//! `HttpRequest`, hands it to a `Transport` for the single network round-trip,
//! and classifies the returned `HttpResponse` by the declared response kind.
//!
//! # Design
//! - The dispatcher never touches the network itself. `Transport` is the only
//!   I/O seam; `ReqwestTransport` (feature `reqwest`) is the production
//!   implementation and tests plug in their own.
//! - Global headers and the two hook slots live on the `Dispatcher` instance,
//!   not in module-level statics. Independent clients get independent
//!   dispatchers.
//! - Body encoding is an explicit `BodyEncoding` decision evaluated in fixed
//!   priority order: multipart, url-encoded, JSON.
//! - `send` and `send_blocking` share a single dispatch implementation.

pub mod body;
pub mod client;
mod decode;
pub mod error;
pub mod headers;
pub mod http;
#[cfg(test)]
mod test_util;
#[cfg(feature = "reqwest")]
pub mod reqwest_transport;
pub mod transport;
pub mod types;

pub use body::BodyEncoding;
pub use client::{Dispatcher, Hook};
pub use error::{RequestError, Result};
pub use headers::HeaderSet;
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};
#[cfg(feature = "reqwest")]
pub use reqwest_transport::{ReqwestTransport, TransportSettings};
pub use transport::Transport;
pub use types::{
    DispatcherDefaults, FormData, FormFile, FormPart, Payload, RequestConfig, ResponseKind,
    ResponseValue,
};
