//! Dispatch coordinator.
//!
//! # Design
//! `ApiClient` is a cheap handle around shared state: the transport, the
//! reachability monitor, the ordered middleware list, the progress table and
//! the configuration. Every `send` runs in three steps:
//!
//! 1. Check reachability synchronously. When offline, the returned call
//!    resolves to `NoInternetConnection` and nothing else happens.
//! 2. Spawn a task that feeds the request through the middleware chain. The
//!    innermost responder invokes the transport under the configured timeout.
//! 3. Decode the final response with the request's policy.
//!
//! The returned [`Call`] is a future over that task. Cancelling it (or
//! dropping it before completion) deregisters progress, tells the transport
//! to abort exactly once, and resolves the future to `Cancelled`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::endpoint::{ApiRequest, Endpoint};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::middleware::{self, DefaultHeadersMiddleware, Middleware, Middlewares, Position, Responder};
use crate::progress::{CallContext, CallToken, ProgressSink, ProgressTable};
use crate::reachability::{AlwaysReachable, Reachability};
use crate::transport::Transport;

/// Handle for sending [`ApiRequest`]s. Clones share all state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    reachability: Arc<dyn Reachability>,
    middlewares: Middlewares,
    progress: Arc<ProgressTable>,
    config: ClientConfig,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.reachability.stop();
    }
}

impl ApiClient {
    pub fn builder(transport: Arc<dyn Transport>) -> ApiClientBuilder {
        ApiClientBuilder::new(transport)
    }

    /// A client with default configuration, no middleware and no
    /// reachability gate.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::builder(transport).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Number of calls currently routing progress to a sink.
    pub fn progress_in_flight(&self) -> usize {
        self.inner.progress.len()
    }

    /// Dispatch `request`. Progress fractions go to `progress` while the
    /// call is in flight.
    ///
    /// Must be called within a Tokio runtime.
    pub fn send<T: Send + 'static>(
        &self,
        request: ApiRequest<T>,
        progress: Option<ProgressSink>,
    ) -> Call<T> {
        let token = CallToken::new();
        if !self.inner.reachability.is_connected() {
            warn!(%token, uri = %request.request().uri(), "network unreachable, request not sent");
            return Call::ready(token, Err(ApiError::NoInternetConnection), Arc::clone(&self.inner));
        }

        let registration = progress.map(|sink| self.inner.progress.register(token, sink));
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let _registration = registration;
            inner.dispatch(request, token).await
        });
        Call::running(token, task, Arc::clone(&self.inner))
    }

    /// Send and await in one step.
    pub async fn execute<T: Send + 'static>(&self, request: ApiRequest<T>) -> Result<T, ApiError> {
        self.send(request, None).await
    }

    pub fn send_endpoint<E>(&self, endpoint: &E, progress: Option<ProgressSink>) -> Call<E::Output>
    where
        E: Endpoint,
        E::Output: Send + 'static,
    {
        self.send(endpoint.api_request(), progress)
    }
}

impl ClientInner {
    async fn dispatch<T>(&self, request: ApiRequest<T>, token: CallToken) -> Result<T, ApiError> {
        let (http_request, policy) = request.into_parts();
        debug!(
            %token,
            method = %http_request.method(),
            uri = %http_request.uri(),
            "dispatching request"
        );

        let terminal: Arc<dyn Responder> = Arc::new(TransportResponder {
            transport: Arc::clone(&self.transport),
            call: CallContext::new(Arc::clone(&self.progress), token),
            timeout: self.config.timeout,
        });
        let chain = middleware::make_responder(self.middlewares.resolve(), terminal);
        let response = chain.respond(http_request).await?;

        debug!(%token, status = response.status(), policy = ?policy.kind(), "response received");
        policy.decode(&response)
    }
}

/// Innermost responder: the transport call under the configured timeout.
struct TransportResponder {
    transport: Arc<dyn Transport>,
    call: CallContext,
    timeout: Option<Duration>,
}

#[async_trait]
impl Responder for TransportResponder {
    async fn respond(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let send = self.transport.send(request, self.call.clone());
        let Some(limit) = self.timeout else {
            return send.await;
        };
        match tokio::time::timeout(limit, send).await {
            Ok(result) => result,
            Err(_) => {
                let token = self.call.token();
                warn!(%token, ?limit, "request timed out");
                self.transport.cancel(token);
                Err(ApiError::Timeout(limit))
            }
        }
    }
}

pub struct ApiClientBuilder {
    transport: Arc<dyn Transport>,
    reachability: Arc<dyn Reachability>,
    middlewares: Middlewares,
    config: ClientConfig,
}

impl ApiClientBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            reachability: Arc::new(AlwaysReachable),
            middlewares: Middlewares::new(),
            config: ClientConfig::default(),
        }
    }

    #[must_use]
    pub fn reachability(mut self, reachability: Arc<dyn Reachability>) -> Self {
        self.reachability = reachability;
        self
    }

    #[must_use]
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>, position: Position) -> Self {
        self.middlewares.add(middleware, position);
        self
    }

    #[must_use]
    pub fn middlewares(mut self, middlewares: Middlewares) -> Self {
        self.middlewares = middlewares;
        self
    }

    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the client and start the reachability monitor.
    pub fn build(self) -> ApiClient {
        let mut middlewares = self.middlewares;
        if !self.config.default_headers.is_empty() {
            middlewares.add(
                Arc::new(DefaultHeadersMiddleware::new(self.config.default_headers.clone())),
                Position::Beginning,
            );
        }
        self.reachability.start();
        ApiClient {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                reachability: self.reachability,
                middlewares,
                progress: Arc::new(ProgressTable::new()),
                config: self.config,
            }),
        }
    }
}

/// An in-flight call. Await it for the decoded result.
///
/// Dropping a call that has not resolved cancels it.
#[must_use = "dropping a call cancels it"]
pub struct Call<T> {
    token: CallToken,
    state: CallState<T>,
    client: Arc<ClientInner>,
    cancelled: AtomicBool,
    done: bool,
}

enum CallState<T> {
    Ready(Option<Result<T, ApiError>>),
    Running(JoinHandle<Result<T, ApiError>>),
}

impl<T> Call<T> {
    fn ready(token: CallToken, result: Result<T, ApiError>, client: Arc<ClientInner>) -> Self {
        Self {
            token,
            state: CallState::Ready(Some(result)),
            client,
            cancelled: AtomicBool::new(false),
            done: false,
        }
    }

    fn running(token: CallToken, task: JoinHandle<Result<T, ApiError>>, client: Arc<ClientInner>) -> Self {
        Self {
            token,
            state: CallState::Running(task),
            client,
            cancelled: AtomicBool::new(false),
            done: false,
        }
    }

    pub fn token(&self) -> CallToken {
        self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stop the call. Idempotent; a no-op once the call has completed.
    ///
    /// Once this marks the call cancelled, awaiting it yields
    /// [`ApiError::Cancelled`] even if the task won the race to finish.
    pub fn cancel(&self) {
        if self.done {
            return;
        }
        let CallState::Running(task) = &self.state else {
            return;
        };
        if task.is_finished() {
            return;
        }
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.client.progress.deregister(self.token);
        self.client.transport.cancel(self.token);
        task.abort();
        debug!(token = %self.token, "call cancelled");
    }
}

impl<T> Unpin for Call<T> {}

impl<T> Future for Call<T> {
    type Output = Result<T, ApiError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let output = match &mut this.state {
            CallState::Ready(result) => match result.take() {
                Some(result) => result,
                None => panic!("`Call` polled after completion"),
            },
            CallState::Running(task) => match ready!(Pin::new(task).poll(cx)) {
                Ok(_) if this.cancelled.load(Ordering::Acquire) => Err(ApiError::Cancelled),
                Ok(result) => result,
                Err(err) if err.is_cancelled() => Err(ApiError::Cancelled),
                Err(err) => std::panic::resume_unwind(err.into_panic()),
            },
        };
        this.done = true;
        Poll::Ready(output)
    }
}

impl<T> Drop for Call<T> {
    fn drop(&mut self) {
        if !self.done {
            self.cancel();
        }
    }
}
