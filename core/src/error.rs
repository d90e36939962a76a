//! Error types for the API client.
//!
//! # Design
//! Every failure of a call surfaces as one `ApiError` on the call's future.
//! `FallbackDecode` is a designed control-flow path rather than a bug: the
//! body decoded fine into the configured error type, and that decoded value
//! travels in the error for programmatic inspection. Transport errors are
//! boxed unchanged so callers can downcast to the transport's own type.

use std::any::Any;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::http::HttpResponse;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// All errors produced while building, dispatching or decoding a request.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    /// The request URI cannot be turned into an absolute URL.
    #[error("missing URL")]
    MissingUrl,

    /// Query parameters or a request body failed to encode.
    #[error("coding error: {0}")]
    Coding(String),

    /// The response body could not be decoded into the expected type.
    #[error("decoding error: {source}")]
    Decoding {
        #[source]
        source: serde_json::Error,
        body: Bytes,
    },

    /// Non-2xx response whose body decoded into the fallback type.
    #[error("HTTP {status}: response decoded as fallback value {fallback:?}")]
    FallbackDecode { status: u16, fallback: FallbackPayload },

    /// An unwrap envelope had no decodable key, or more than one.
    #[error("resource extraction error: {0}")]
    ResourceExtraction(String),

    /// A status filter rejected the response.
    #[error("status code {status} didn't fall within the given range")]
    InvalidStatusCode {
        status: u16,
        response: Box<HttpResponse>,
    },

    #[error("no response")]
    NoResponse,

    #[error("no data")]
    NoData,

    /// The reachability monitor reported no connectivity; nothing was sent.
    #[error("internet connection is not available")]
    NoInternetConnection,

    /// The transport did not answer within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The call was cancelled before it completed.
    #[error("request cancelled")]
    Cancelled,

    /// Error raised by the transport, passed through unchanged.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ApiError::Transport(err.into())
    }

    pub(crate) fn decoding(source: serde_json::Error, body: &Bytes) -> Self {
        ApiError::Decoding {
            source,
            body: body.clone(),
        }
    }

    /// The decoded fallback value, if this is a `FallbackDecode` of type `E`.
    pub fn fallback<E: 'static>(&self) -> Option<&E> {
        match self {
            ApiError::FallbackDecode { fallback, .. } => fallback.downcast_ref(),
            _ => None,
        }
    }
}

/// Type-erased fallback value carried by [`ApiError::FallbackDecode`].
pub struct FallbackPayload {
    value: Box<dyn Any + Send + Sync>,
    rendered: String,
}

impl FallbackPayload {
    pub fn new<E: fmt::Debug + Send + Sync + 'static>(value: E) -> Self {
        Self {
            rendered: format!("{value:?}"),
            value: Box::new(value),
        }
    }

    pub fn downcast_ref<E: 'static>(&self) -> Option<&E> {
        self.value.downcast_ref()
    }

    /// Take the value out as `E`, or get the payload back on type mismatch.
    pub fn downcast<E: 'static>(self) -> Result<E, Self> {
        let rendered = self.rendered;
        self.value
            .downcast::<E>()
            .map(|v| *v)
            .map_err(|value| Self { value, rendered })
    }
}

impl fmt::Debug for FallbackPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}
