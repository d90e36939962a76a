//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port and drives it through
//! `ApiClient` with a ureq-backed `Transport`. The transport converts each
//! request with `HttpRequest::to_http`, runs it on the blocking pool, and
//! hands back the raw response, leaving status interpretation and decoding
//! to the core. DTOs are defined here independently from the mock-server
//! crate so schema drift shows up as a test failure.

use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;

use apiclient_core::{
    uri::scheme, ApiClient, ApiError, ApiRequest, CallContext, ClientConfig, DecodePolicy, HttpBody,
    HttpMethod, HttpRequest, HttpResponse, LoggingMiddleware, Position, QueryOptions, Transport,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Widget {
    id: Uuid,
    name: String,
    size: u32,
}

#[derive(Debug, Serialize)]
struct NewWidget<'a> {
    name: &'a str,
    size: u32,
}

#[derive(Debug, Deserialize)]
struct Problem {
    code: String,
    message: String,
}

/// Runs requests with ureq on the blocking pool.
///
/// Status-code-as-error is disabled so 4xx/5xx responses come back as data
/// and the decode policy decides what they mean.
struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn send(&self, request: HttpRequest, call: CallContext) -> Result<HttpResponse, ApiError> {
        let wire = request.to_http()?;
        let agent = self.agent.clone();

        let response = tokio::task::spawn_blocking(move || -> Result<_, ureq::Error> {
            let (parts, body) = wire.into_parts();
            let response = if body.is_empty() {
                agent.run(http::Request::from_parts(parts, ()))?
            } else {
                agent.run(http::Request::from_parts(parts, body))?
            };
            let (parts, mut body) = response.into_parts();
            let bytes = body.read_to_vec()?;
            Ok(http::Response::from_parts(parts, bytes))
        })
        .await
        .map_err(ApiError::transport)?
        .map_err(ApiError::transport)?;

        call.report(1.0);
        Ok(HttpResponse::from_http(request, response))
    }
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    addr
}

fn base(addr: SocketAddr) -> HttpRequest {
    HttpRequest::new()
        .with_scheme(scheme::HTTP)
        .with_host(&addr.ip().to_string())
        .with_port(addr.port())
}

fn client() -> ApiClient {
    init_tracing();
    ApiClient::builder(Arc::new(UreqTransport::new()))
        .middleware(Arc::new(LoggingMiddleware::new().with_curl()), Position::End)
        .build()
}

fn widget_policy() -> DecodePolicy<Widget> {
    DecodePolicy::raw().with_fallback::<Problem>()
}

#[tokio::test(flavor = "multi_thread")]
async fn widget_lifecycle() {
    let addr = start_server();
    let client = client();

    // Step 1: create.
    let create = base(addr)
        .with_method(HttpMethod::Post)
        .with_path(["widgets"])
        .with_body(HttpBody::json(&NewWidget { name: "gear", size: 2 }).unwrap());
    let created = client
        .execute(ApiRequest::new(create, widget_policy()))
        .await
        .unwrap();
    assert_eq!(created.name, "gear");
    assert_eq!(created.size, 2);
    let id = created.id.to_string();

    // Step 2: get it back.
    let get = base(addr).with_path(["widgets", id.as_str()]);
    let fetched = client
        .execute(ApiRequest::new(get.clone(), widget_policy()))
        .await
        .unwrap();
    assert_eq!(fetched, created);

    // Step 3: unwrap by key from the envelope.
    let envelope = base(addr).with_path(["widgets", id.as_str(), "envelope"]);
    let unwrapped: Widget = client
        .execute(ApiRequest::new(
            envelope,
            DecodePolicy::unwrap("widget").with_fallback::<Problem>(),
        ))
        .await
        .unwrap();
    assert_eq!(unwrapped, created);

    // Step 4: the index holds one widget under an unknown key.
    let index = base(addr).with_path(["widgets", "index"]);
    let only = client
        .execute(ApiRequest::new(index.clone(), DecodePolicy::<Widget>::unwrap("")))
        .await
        .unwrap();
    assert_eq!(only, created);

    // Step 5: a second widget makes the index ambiguous.
    let second = base(addr)
        .with_method(HttpMethod::Post)
        .with_path(["widgets"])
        .with_body(HttpBody::json(&NewWidget { name: "cog", size: 1 }).unwrap());
    client
        .execute(ApiRequest::new(second, widget_policy()))
        .await
        .unwrap();
    let err = client
        .execute(ApiRequest::new(index, DecodePolicy::<Widget>::unwrap("")))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ResourceExtraction(_)), "{err:?}");

    // Step 6: list with a query filter.
    let list = base(addr)
        .with_path(["widgets"])
        .add_query(&serde_json::json!({ "min_size": 2 }), QueryOptions::default())
        .unwrap();
    let widgets = client
        .execute(ApiRequest::new(list, DecodePolicy::<Vec<Widget>>::raw()))
        .await
        .unwrap();
    assert_eq!(widgets, vec![created.clone()]);

    // Step 7: partial update.
    let update = base(addr)
        .with_method(HttpMethod::Put)
        .with_path(["widgets", id.as_str()])
        .with_body(HttpBody::json(&serde_json::json!({ "size": 9 })).unwrap());
    let updated = client
        .execute(ApiRequest::new(update, widget_policy()))
        .await
        .unwrap();
    assert_eq!(updated.name, "gear");
    assert_eq!(updated.size, 9);

    // Step 8: delete.
    let delete = base(addr)
        .with_method(HttpMethod::Delete)
        .with_path(["widgets", id.as_str()]);
    client
        .execute(ApiRequest::new(
            delete,
            DecodePolicy::empty().with_fallback::<Problem>(),
        ))
        .await
        .unwrap();

    // Step 9: get after delete is a problem body.
    let err = client
        .execute(ApiRequest::new(get, widget_policy()))
        .await
        .unwrap_err();
    match &err {
        ApiError::FallbackDecode { status, .. } => assert_eq!(*status, 404),
        other => panic!("expected fallback error, got {other:?}"),
    }
    let problem = err.fallback::<Problem>().unwrap();
    assert_eq!(problem.code, "not_found");
    assert!(problem.message.contains(&id));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_payload_decodes_problem() {
    let addr = start_server();
    let client = client();

    let create = base(addr)
        .with_method(HttpMethod::Post)
        .with_path(["widgets"])
        .with_body(HttpBody::json(&NewWidget { name: " ", size: 0 }).unwrap());
    let err = client
        .execute(ApiRequest::new(create, widget_policy()))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::FallbackDecode { status: 400, .. }));
    assert_eq!(err.fallback::<Problem>().unwrap().code, "invalid_name");
}

#[tokio::test(flavor = "multi_thread")]
async fn query_and_headers_reach_the_server() {
    #[derive(Serialize)]
    struct Search<'a> {
        term: &'a str,
        tags: Vec<&'a str>,
        exact: bool,
    }

    let addr = start_server();
    init_tracing();
    let client = ApiClient::builder(Arc::new(UreqTransport::new()))
        .config(ClientConfig::default().with_default_header("X-Client", "widgets-e2e"))
        .build();

    let search = Search {
        term: "a&b c",
        tags: vec!["x", "y"],
        exact: true,
    };
    let echo = base(addr)
        .with_path(["echo"])
        .with_header("X-Trace", "t-1")
        .add_query(&search, QueryOptions::default())
        .unwrap();
    let body = client
        .execute(ApiRequest::new(echo, DecodePolicy::<Value>::raw()))
        .await
        .unwrap();

    assert_eq!(body["method"], "GET");
    assert_eq!(body["query"], "exact=1&tags=x&tags=y&term=a%26b%20c");
    assert_eq!(body["headers"]["x-trace"][0], "t-1");
    assert_eq!(body["headers"]["x-client"][0], "widgets-e2e");
}

#[tokio::test(flavor = "multi_thread")]
async fn progress_is_reported_and_released() {
    let addr = start_server();
    let client = client();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let request = ApiRequest::new(base(addr).with_path(["echo"]), DecodePolicy::bytes());
    let call = client.send(request, Some(tx));
    call.await.unwrap();

    assert_eq!(rx.recv().await, Some(1.0));
    assert_eq!(client.progress_in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_response_times_out() {
    let addr = start_server();
    init_tracing();
    let client = ApiClient::builder(Arc::new(UreqTransport::new()))
        .timeout(Some(Duration::from_millis(50)))
        .build();

    let slow = base(addr)
        .with_path(["slow"])
        .with_query(["ms=300"]);
    let err = client
        .execute(ApiRequest::new(slow, DecodePolicy::<Value>::raw()))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn relative_request_is_missing_url() {
    let client = client();

    let err = client
        .execute(ApiRequest::new(
            HttpRequest::with_url("/widgets"),
            DecodePolicy::<Value>::raw(),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::MissingUrl));
}

#[test]
fn structurally_equal_requests_are_equal_across_ids() {
    let a = base("127.0.0.1:8080".parse().unwrap()).with_path(["widgets"]);
    let b = base("127.0.0.1:8080".parse().unwrap()).with_path(["widgets"]);

    assert_ne!(a.id(), b.id());
    assert_eq!(a, b);
    assert_eq!(a.uri().to_string(), "http://127.0.0.1:8080/widgets");
}
