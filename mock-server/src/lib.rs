//! In-memory widget API used to exercise the client end to end.
//!
//! Besides plain CRUD it serves the response shapes the client has to cope
//! with: problem bodies on failure, resources wrapped in object envelopes,
//! an echo of the received request, and a deliberately slow endpoint.

use std::{collections::BTreeMap, collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: Uuid,
    pub name: String,
    pub size: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateWidget {
    pub name: String,
    #[serde(default)]
    pub size: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWidget {
    pub name: Option<String>,
    pub size: Option<u32>,
}

/// Body of every non-2xx response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub name: Option<String>,
    pub min_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SlowParams {
    #[serde(default)]
    pub ms: u64,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Widget>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/widgets", get(list_widgets).post(create_widget))
        .route("/widgets/index", get(widget_index))
        .route(
            "/widgets/{id}",
            get(get_widget).put(update_widget).delete(delete_widget),
        )
        .route("/widgets/{id}/envelope", get(widget_envelope))
        .route("/echo", get(echo).post(echo))
        .route("/slow", get(slow))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn problem(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = Problem {
        code: code.to_string(),
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

fn not_found(id: Uuid) -> Response {
    problem(StatusCode::NOT_FOUND, "not_found", format!("widget {id} does not exist"))
}

async fn list_widgets(State(db): State<Db>, Query(params): Query<ListParams>) -> Json<Vec<Widget>> {
    let widgets = db.read().await;
    let mut matching: Vec<Widget> = widgets
        .values()
        .filter(|w| params.name.as_ref().map_or(true, |name| &w.name == name))
        .filter(|w| params.min_size.map_or(true, |min| w.size >= min))
        .cloned()
        .collect();
    matching.sort_by(|a, b| a.name.cmp(&b.name));
    Json(matching)
}

async fn create_widget(State(db): State<Db>, Json(input): Json<CreateWidget>) -> Response {
    if input.name.trim().is_empty() {
        return problem(StatusCode::BAD_REQUEST, "invalid_name", "name must not be empty");
    }
    let widget = Widget {
        id: Uuid::new_v4(),
        name: input.name,
        size: input.size,
    };
    db.write().await.insert(widget.id, widget.clone());
    (StatusCode::CREATED, Json(widget)).into_response()
}

async fn get_widget(State(db): State<Db>, Path(id): Path<Uuid>) -> Response {
    match db.read().await.get(&id) {
        Some(widget) => Json(widget.clone()).into_response(),
        None => not_found(id),
    }
}

async fn update_widget(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateWidget>,
) -> Response {
    let mut widgets = db.write().await;
    let Some(widget) = widgets.get_mut(&id) else {
        return not_found(id);
    };
    if let Some(name) = input.name {
        widget.name = name;
    }
    if let Some(size) = input.size {
        widget.size = size;
    }
    Json(widget.clone()).into_response()
}

async fn delete_widget(State(db): State<Db>, Path(id): Path<Uuid>) -> Response {
    match db.write().await.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(id),
    }
}

/// `{"widget": {...}, "meta": {...}}`
async fn widget_envelope(State(db): State<Db>, Path(id): Path<Uuid>) -> Response {
    match db.read().await.get(&id) {
        Some(widget) => Json(json!({
            "widget": widget,
            "meta": { "version": 1 },
        }))
        .into_response(),
        None => not_found(id),
    }
}

/// Every widget keyed by id.
async fn widget_index(State(db): State<Db>) -> Json<BTreeMap<String, Widget>> {
    let widgets = db.read().await;
    Json(
        widgets
            .values()
            .map(|w| (w.id.to_string(), w.clone()))
            .collect(),
    )
}

/// Reflect the received method, raw query and headers.
async fn echo(method: Method, RawQuery(query): RawQuery, headers: HeaderMap) -> Json<Value> {
    let mut received: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &headers {
        received
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    Json(json!({
        "method": method.as_str(),
        "query": query,
        "headers": received,
    }))
}

async fn slow(Query(params): Query<SlowParams>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(params.ms)).await;
    Json(json!({ "slept_ms": params.ms }))
}
