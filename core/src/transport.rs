//! The network seam.
//!
//! The core never opens a socket itself. A [`Transport`] receives a fully
//! built [`HttpRequest`] and hands back the raw [`HttpResponse`]; everything
//! else (middleware, decoding, progress routing, cancellation bookkeeping)
//! stays on this side of the seam. Implementations typically convert the
//! request with [`HttpRequest::to_http`] and feed it to their HTTP library.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::progress::{CallContext, CallToken};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one round-trip. Upload or download progress, if the transport
    /// can measure it, goes to `call.report`.
    ///
    /// # Errors
    /// Transport failures should be wrapped with [`ApiError::transport`] so
    /// callers can downcast to the underlying error type.
    async fn send(&self, request: HttpRequest, call: CallContext) -> Result<HttpResponse, ApiError>;

    /// Abort the in-flight send for `token`. Called at most once per call,
    /// before the caller has seen a result. The send may have finished an
    /// instant earlier, so unknown tokens must be ignored.
    fn cancel(&self, _token: CallToken) {}
}
