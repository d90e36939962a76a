//! Structured HTTP request building and response decoding.
//!
//! # Overview
//! Requests are plain values: a method, a [`Uri`], a [`HeaderMap`] and an
//! [`HttpBody`]. They are built immutably, compared structurally and can be
//! rendered as `curl` commands. Sending goes through [`ApiClient`], which
//! runs the request through a middleware chain, hands it to a pluggable
//! [`Transport`] and decodes the response with the request's
//! [`DecodePolicy`].
//!
//! # Design
//! - The core never performs I/O itself. The [`Transport`] trait is the only
//!   seam to the network, so tests swap in fakes and hosts pick their own
//!   HTTP library.
//! - Decode policies are values. A request carries its policy, so the client
//!   stays generic and one policy can be shared by many requests.
//! - Each dispatch gets its own [`CallToken`]; progress and cancellation are
//!   keyed by it rather than by request identity.
//! - Errors are a single [`ApiError`] enum; fallback payloads travel inside
//!   it type-erased and are recovered with [`ApiError::fallback`].

pub mod body;
pub mod client;
pub mod config;
pub mod decode;
pub mod endpoint;
pub mod error;
pub mod headers;
pub mod http;
pub mod middleware;
pub mod path;
pub mod progress;
pub mod query;
pub mod reachability;
pub mod transport;
pub mod uri;

pub use body::HttpBody;
pub use client::{ApiClient, ApiClientBuilder, Call};
pub use config::ClientConfig;
pub use decode::{DecodeKind, DecodePolicy};
pub use endpoint::{ApiRequest, Endpoint};
pub use error::{ApiError, FallbackPayload};
pub use headers::HeaderMap;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use middleware::{
    BasicResponder, DefaultHeadersMiddleware, LoggingMiddleware, Middleware, Middlewares, Position,
    Responder,
};
pub use path::{PathBuilder, PathComponent};
pub use progress::{CallContext, CallToken, ProgressSink};
pub use query::{ArrayEncoding, BoolEncoding, QueryOptions};
pub use reachability::{AlwaysReachable, NetworkMonitor, Reachability};
pub use transport::Transport;
pub use uri::Uri;
