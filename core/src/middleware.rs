//! Chain-of-responsibility middleware.
//!
//! # Design
//! A [`Responder`] turns a request into a response. A [`Middleware`] gets
//! the request plus the rest of the chain as `next` and decides what to do
//! with it: forward once, forward several times, transform the request or
//! the response, or answer by itself without calling `next` at all.
//!
//! [`make_responder`] folds a list of middleware around a terminal
//! responder so that the first middleware in the list is outermost: it sees
//! the request first and the response last. The terminal responder is the
//! transport call and is always supplied by the dispatcher.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::headers::HeaderMap;
use crate::http::{HttpRequest, HttpResponse};

#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn respond(
        &self,
        request: HttpRequest,
        next: &dyn Responder,
    ) -> Result<HttpResponse, ApiError>;
}

/// Compose `middlewares` around `terminal`; `middlewares[0]` runs first.
pub fn make_responder(
    middlewares: &[Arc<dyn Middleware>],
    terminal: Arc<dyn Responder>,
) -> Arc<dyn Responder> {
    middlewares.iter().rev().fold(terminal, |next, middleware| {
        Arc::new(MiddlewareResponder {
            middleware: Arc::clone(middleware),
            next,
        })
    })
}

struct MiddlewareResponder {
    middleware: Arc<dyn Middleware>,
    next: Arc<dyn Responder>,
}

#[async_trait]
impl Responder for MiddlewareResponder {
    async fn respond(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.middleware.respond(request, self.next.as_ref()).await
    }
}

type RespondFn =
    dyn Fn(HttpRequest) -> BoxFuture<'static, Result<HttpResponse, ApiError>> + Send + Sync;

/// Closure-backed [`Responder`].
pub struct BasicResponder {
    closure: Box<RespondFn>,
}

impl BasicResponder {
    pub fn new<F, Fut>(closure: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, ApiError>> + Send + 'static,
    {
        Self {
            closure: Box::new(move |request| Box::pin(closure(request))),
        }
    }
}

#[async_trait]
impl Responder for BasicResponder {
    async fn respond(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        (self.closure)(request).await
    }
}

/// Where [`Middlewares::add`] places a middleware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Position {
    /// Outermost: runs before everything already registered.
    Beginning,
    /// Innermost: runs after everything already registered, right before
    /// the transport.
    #[default]
    End,
}

/// Ordered middleware registry.
#[derive(Clone, Default)]
pub struct Middlewares {
    storage: Vec<Arc<dyn Middleware>>,
}

impl Middlewares {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, middleware: Arc<dyn Middleware>, position: Position) {
        match position {
            Position::Beginning => self.storage.insert(0, middleware),
            Position::End => self.storage.push(middleware),
        }
    }

    /// Append `middlewares` in order, innermost last.
    pub fn extend(&mut self, middlewares: impl IntoIterator<Item = Arc<dyn Middleware>>) {
        self.storage.extend(middlewares);
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn resolve(&self) -> &[Arc<dyn Middleware>] {
        &self.storage
    }
}

/// Logs every request on the way in and its outcome on the way out.
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    curl: bool,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log outgoing requests as `curl` commands.
    #[must_use]
    pub fn with_curl(mut self) -> Self {
        self.curl = true;
        self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn respond(
        &self,
        request: HttpRequest,
        next: &dyn Responder,
    ) -> Result<HttpResponse, ApiError> {
        let method = request.method().clone();
        let uri = request.uri().clone();
        if self.curl {
            debug!(curl = %request.curl(), "outgoing request");
        } else {
            debug!(%method, %uri, headers = %request.headers(), "outgoing request");
        }

        let started = Instant::now();
        let result = next.respond(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(response) => debug!(
                %method,
                %uri,
                status = response.status(),
                bytes = response.body().len(),
                elapsed_ms,
                "response received"
            ),
            Err(error) => warn!(%method, %uri, %error, elapsed_ms, "request failed"),
        }
        result
    }
}

/// Adds each configured header to requests that do not already carry it.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeadersMiddleware {
    headers: HeaderMap,
}

impl DefaultHeadersMiddleware {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }
}

#[async_trait]
impl Middleware for DefaultHeadersMiddleware {
    async fn respond(
        &self,
        mut request: HttpRequest,
        next: &dyn Responder,
    ) -> Result<HttpResponse, ApiError> {
        for (name, value) in self.headers.iter() {
            if !request.headers().contains(name) {
                request.headers_mut().add(name, value);
            }
        }
        next.respond(request).await
    }
}
