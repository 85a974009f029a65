//! The dispatcher's single I/O seam.

use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse};

/// Executes one HTTP round-trip.
///
/// Implementations return non-2xx responses as ordinary `HttpResponse`
/// values; only failures to complete the exchange are errors, reported as
/// `RequestError::Network`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}
