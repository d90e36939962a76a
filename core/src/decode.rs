//! Response decode policies.
//!
//! # Design
//! A [`DecodePolicy`] says how a raw [`HttpResponse`] becomes the caller's
//! value. There are three shapes:
//!
//! - **Raw**: decode the whole body as `T`.
//! - **Fallback**: on a 2xx status use the wrapped policy; otherwise decode
//!   the body as a caller-chosen error type and fail the call with
//!   [`ApiError::FallbackDecode`] carrying that value.
//! - **Unwrap**: the body is a JSON object wrapping the resource. With a key,
//!   decode exactly that entry. Without one, decode every entry as `T` and
//!   require exactly one success.
//!
//! The decode functions are stored type-erased, so a policy can be built once
//! and cloned cheaply into every request that needs it.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{ApiError, FallbackPayload};
use crate::http::HttpResponse;

type DecodeFn<T> = Arc<dyn Fn(&Bytes) -> Result<T, ApiError> + Send + Sync>;
type UnwrapFn<T> = Arc<dyn Fn(&str, &Bytes) -> Result<T, ApiError> + Send + Sync>;
type FallbackFn = Arc<dyn Fn(u16, &Bytes) -> ApiError + Send + Sync>;
type FinalizeFn<T, U> = Arc<dyn Fn(T) -> Result<U, ApiError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeKind {
    Raw,
    Fallback,
    Unwrap,
}

pub enum DecodePolicy<T> {
    Raw(DecodeFn<T>),
    Fallback {
        success: Box<DecodePolicy<T>>,
        fallback: FallbackFn,
    },
    Unwrap {
        /// Empty means "find the single decodable entry".
        key: String,
        extract: UnwrapFn<T>,
    },
}

impl<T: DeserializeOwned + 'static> DecodePolicy<T> {
    /// Decode the whole body as JSON `T`.
    pub fn raw() -> Self {
        DecodePolicy::Raw(Arc::new(|body: &Bytes| {
            serde_json::from_slice::<T>(body).map_err(|e| ApiError::decoding(e, body))
        }))
    }

    /// Decode the resource wrapped in a JSON object envelope. Pass `""` to
    /// pick whichever single entry decodes as `T`.
    pub fn unwrap(key: impl Into<String>) -> Self {
        DecodePolicy::Unwrap {
            key: key.into(),
            extract: Arc::new(unwrap_envelope::<T>),
        }
    }
}

impl DecodePolicy<Bytes> {
    /// Hand the body back untouched.
    pub fn bytes() -> Self {
        DecodePolicy::Raw(Arc::new(|body: &Bytes| -> Result<Bytes, ApiError> {
            Ok(body.clone())
        }))
    }
}

impl DecodePolicy<()> {
    /// Ignore the body.
    pub fn empty() -> Self {
        DecodePolicy::Raw(Arc::new(|_: &Bytes| -> Result<(), ApiError> { Ok(()) }))
    }
}

impl<T: 'static> DecodePolicy<T> {
    /// Decode the whole body with `decode` instead of JSON.
    pub fn custom<F>(decode: F) -> Self
    where
        F: Fn(&Bytes) -> Result<T, ApiError> + Send + Sync + 'static,
    {
        DecodePolicy::Raw(Arc::new(decode))
    }

    /// Wrap this policy so that non-2xx responses decode as `E` and fail the
    /// call with [`ApiError::FallbackDecode`].
    ///
    /// A non-2xx body that does not decode as `E` fails with
    /// [`ApiError::Decoding`] instead.
    pub fn with_fallback<E>(self) -> Self
    where
        E: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        DecodePolicy::Fallback {
            success: Box::new(self),
            fallback: Arc::new(|status: u16, body: &Bytes| -> ApiError {
                match serde_json::from_slice::<E>(body) {
                    Ok(value) => ApiError::FallbackDecode {
                        status,
                        fallback: FallbackPayload::new(value),
                    },
                    Err(e) => ApiError::decoding(e, body),
                }
            }),
        }
    }

    /// Post-process the decoded value.
    pub fn finalize<U, F>(self, f: F) -> DecodePolicy<U>
    where
        U: 'static,
        F: Fn(T) -> Result<U, ApiError> + Send + Sync + 'static,
    {
        self.map_with(Arc::new(f))
    }

    fn map_with<U: 'static>(self, f: FinalizeFn<T, U>) -> DecodePolicy<U> {
        match self {
            DecodePolicy::Raw(decode) => {
                DecodePolicy::Raw(Arc::new(move |body: &Bytes| f(decode(body)?)))
            }
            DecodePolicy::Fallback { success, fallback } => DecodePolicy::Fallback {
                success: Box::new(success.map_with(f)),
                fallback,
            },
            DecodePolicy::Unwrap { key, extract } => DecodePolicy::Unwrap {
                key,
                extract: Arc::new(move |key: &str, body: &Bytes| f(extract(key, body)?)),
            },
        }
    }
}

impl<T> DecodePolicy<T> {
    pub fn kind(&self) -> DecodeKind {
        match self {
            DecodePolicy::Raw(_) => DecodeKind::Raw,
            DecodePolicy::Fallback { .. } => DecodeKind::Fallback,
            DecodePolicy::Unwrap { .. } => DecodeKind::Unwrap,
        }
    }

    /// # Errors
    /// Whatever the policy produces: [`ApiError::Decoding`],
    /// [`ApiError::FallbackDecode`] or [`ApiError::ResourceExtraction`], or an
    /// error returned by a finalize step.
    pub fn decode(&self, response: &HttpResponse) -> Result<T, ApiError> {
        trace!(kind = ?self.kind(), status = response.status(), "decoding response");
        match self {
            DecodePolicy::Raw(decode) => decode(response.body()),
            DecodePolicy::Fallback { success, fallback } => {
                if response.is_success() {
                    success.decode(response)
                } else {
                    Err(fallback(response.status(), response.body()))
                }
            }
            DecodePolicy::Unwrap { key, extract } => extract(key, response.body()),
        }
    }
}

impl<T> Clone for DecodePolicy<T> {
    fn clone(&self) -> Self {
        match self {
            DecodePolicy::Raw(decode) => DecodePolicy::Raw(Arc::clone(decode)),
            DecodePolicy::Fallback { success, fallback } => DecodePolicy::Fallback {
                success: success.clone(),
                fallback: Arc::clone(fallback),
            },
            DecodePolicy::Unwrap { key, extract } => DecodePolicy::Unwrap {
                key: key.clone(),
                extract: Arc::clone(extract),
            },
        }
    }
}

impl<T> fmt::Debug for DecodePolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodePolicy::Raw(_) => f.write_str("Raw"),
            DecodePolicy::Fallback { success, .. } => {
                f.debug_struct("Fallback").field("success", success).finish()
            }
            DecodePolicy::Unwrap { key, .. } => f.debug_struct("Unwrap").field("key", key).finish(),
        }
    }
}

fn unwrap_envelope<T: DeserializeOwned>(key: &str, body: &Bytes) -> Result<T, ApiError> {
    let envelope: Map<String, Value> =
        serde_json::from_slice(body).map_err(|e| ApiError::decoding(e, body))?;
    let target = type_name::<T>();

    if !key.is_empty() {
        let value = envelope.get(key).ok_or_else(|| {
            ApiError::ResourceExtraction(format!(
                "failed to unwrap {target}: no entry with key `{key}`"
            ))
        })?;
        return <T as Deserialize>::deserialize(value).map_err(|e| {
            ApiError::ResourceExtraction(format!(
                "failed to unwrap {target}: entry `{key}` did not decode: {e}"
            ))
        });
    }

    let mut decoded: Vec<T> = envelope
        .values()
        .filter_map(|value| <T as Deserialize>::deserialize(value).ok())
        .collect();
    if decoded.len() > 1 {
        return Err(ApiError::ResourceExtraction(format!(
            "decoded {} entries as {target} where exactly one was expected; set an unwrap key",
            decoded.len()
        )));
    }
    decoded.pop().ok_or_else(|| {
        ApiError::ResourceExtraction(format!("no entry in the envelope decoded as {target}"))
    })
}
