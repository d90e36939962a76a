//! Request bodies.
//!
//! A body is encoded eagerly when it is constructed, so a request always
//! holds concrete bytes and two requests can compare their bodies byte for
//! byte. Each body also carries the headers it implies, which the owning
//! request merges into its own headers whenever the body is set.

use bytes::Bytes;
use serde::Serialize;

use crate::error::ApiError;
use crate::headers::HeaderMap;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum HttpBody {
    #[default]
    Empty,
    /// Caller-supplied bytes sent as-is.
    Raw {
        data: Bytes,
        additional_headers: HeaderMap,
    },
    /// A value serialized by the JSON encoder.
    Encoded {
        data: Bytes,
        additional_headers: HeaderMap,
    },
}

impl HttpBody {
    pub fn raw(data: impl Into<Bytes>) -> Self {
        HttpBody::Raw {
            data: data.into(),
            additional_headers: HeaderMap::new(),
        }
    }

    pub fn raw_with_headers(data: impl Into<Bytes>, additional_headers: HeaderMap) -> Self {
        HttpBody::Raw {
            data: data.into(),
            additional_headers,
        }
    }

    /// Serialize `value` as JSON and tag the body `Content-Type: application/json`.
    ///
    /// # Errors
    /// Returns [`ApiError::Coding`] if serialization fails.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        let data = serde_json::to_vec(value).map_err(|e| ApiError::Coding(e.to_string()))?;
        Ok(HttpBody::Encoded {
            data: Bytes::from(data),
            additional_headers: HeaderMap::new().with(CONTENT_TYPE, APPLICATION_JSON),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    pub fn bytes(&self) -> Bytes {
        match self {
            HttpBody::Empty => Bytes::new(),
            HttpBody::Raw { data, .. } | HttpBody::Encoded { data, .. } => data.clone(),
        }
    }

    pub fn additional_headers(&self) -> Option<&HeaderMap> {
        match self {
            HttpBody::Empty => None,
            HttpBody::Raw {
                additional_headers, ..
            }
            | HttpBody::Encoded {
                additional_headers, ..
            } => Some(additional_headers),
        }
    }
}
