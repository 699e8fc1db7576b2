//! In-process stand-in for the model daemon's HTTP API.
//!
//! [`FakeDaemon`] binds an axum router to an ephemeral localhost port and
//! serves `/api/tags`, `/api/pull`, `/api/delete`, `/api/show` and
//! `/api/generate`. It can also misbehave on purpose (HTTP errors, broken
//! JSON, slow replies) so probe classification can be tested end to end.
//! The server stops when the value is dropped.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// A model the fake daemon reports in its inventory.
#[derive(Debug, Clone)]
pub struct FakeModel {
    pub name: String,
    pub size: u64,
    pub family: String,
    pub modified_at: String,
}

impl FakeModel {
    pub fn new(name: &str, size: u64, family: &str) -> Self {
        Self {
            name: name.to_string(),
            size,
            family: family.to_string(),
            modified_at: "2024-01-15T10:30:00.123456789Z".to_string(),
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "model": self.name,
            "size": self.size,
            "modified_at": self.modified_at,
            "details": { "family": self.family, "format": "gguf" },
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Healthy,
    Failing(StatusCode),
    Malformed,
    Slow(Duration),
}

#[derive(Debug)]
struct FakeState {
    behavior: Behavior,
    models: Mutex<Vec<FakeModel>>,
    pulled: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeState {
    /// Apply the configured misbehavior. `Some` short-circuits the handler.
    async fn gate(&self) -> Option<Response> {
        match self.behavior {
            Behavior::Healthy => None,
            Behavior::Failing(code) => Some((code, "internal error").into_response()),
            Behavior::Malformed => Some(
                (
                    StatusCode::OK,
                    [("content-type", "application/json")],
                    "{\"models\": [not json",
                )
                    .into_response(),
            ),
            Behavior::Slow(delay) => {
                tokio::time::sleep(delay).await;
                None
            }
        }
    }
}

pub struct FakeDaemon {
    addr: SocketAddr,
    state: Arc<FakeState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FakeDaemon {
    /// A well-behaved daemon serving `models`.
    pub async fn healthy(models: Vec<FakeModel>) -> Self {
        Self::spawn(Behavior::Healthy, models).await
    }

    /// Every endpoint answers with `status`.
    pub async fn failing(status: u16) -> Self {
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::spawn(Behavior::Failing(code), Vec::new()).await
    }

    /// Every endpoint answers 200 with a body that is not valid JSON.
    pub async fn malformed() -> Self {
        Self::spawn(Behavior::Malformed, Vec::new()).await
    }

    /// Every endpoint waits `delay` before answering normally.
    pub async fn slow(delay: Duration) -> Self {
        Self::spawn(Behavior::Slow(delay), Vec::new()).await
    }

    async fn spawn(behavior: Behavior, models: Vec<FakeModel>) -> Self {
        let state = Arc::new(FakeState {
            behavior,
            models: Mutex::new(models),
            pulled: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake daemon");
        let addr = listener.local_addr().expect("fake daemon has no address");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tracing::debug!(%addr, ?behavior, "fake daemon listening");

        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Names passed to `/api/pull`, in order.
    pub fn pulled(&self) -> Vec<String> {
        self.state.pulled.lock().unwrap().clone()
    }

    /// Names successfully removed through `/api/delete`, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.state.deleted.lock().unwrap().clone()
    }

    pub fn model_names(&self) -> Vec<String> {
        self.state
            .models
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.name.clone())
            .collect()
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// A localhost URL with nothing listening on it.
pub async fn unused_local_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind probe port");
    let addr = listener.local_addr().expect("listener has no address");
    drop(listener);
    format!("http://{addr}")
}

fn router(state: Arc<FakeState>) -> Router {
    Router::new()
        .route("/api/tags", get(handle_tags))
        .route("/api/pull", post(handle_pull))
        .route("/api/delete", delete(handle_delete))
        .route("/api/show", post(handle_show))
        .route("/api/generate", post(handle_generate))
        .with_state(state)
}

#[derive(Deserialize)]
struct NameBody {
    name: String,
}

#[derive(Deserialize)]
struct GenerateBody {
    model: String,
    prompt: String,
}

fn not_found(name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("model '{name}' not found") })),
    )
        .into_response()
}

async fn handle_tags(State(state): State<Arc<FakeState>>) -> Response {
    if let Some(resp) = state.gate().await {
        return resp;
    }
    let models: Vec<Value> = state
        .models
        .lock()
        .unwrap()
        .iter()
        .map(FakeModel::to_json)
        .collect();
    Json(json!({ "models": models })).into_response()
}

async fn handle_pull(State(state): State<Arc<FakeState>>, Json(body): Json<NameBody>) -> Response {
    if let Some(resp) = state.gate().await {
        return resp;
    }
    state.pulled.lock().unwrap().push(body.name.clone());
    {
        let mut models = state.models.lock().unwrap();
        if !models.iter().any(|m| m.name == body.name) {
            models.push(FakeModel::new(&body.name, 1024, "unknown"));
        }
    }
    Json(json!({ "status": "success" })).into_response()
}

async fn handle_delete(
    State(state): State<Arc<FakeState>>,
    Json(body): Json<NameBody>,
) -> Response {
    if let Some(resp) = state.gate().await {
        return resp;
    }
    let removed = {
        let mut models = state.models.lock().unwrap();
        let before = models.len();
        models.retain(|m| m.name != body.name);
        models.len() != before
    };
    if !removed {
        return not_found(&body.name);
    }
    state.deleted.lock().unwrap().push(body.name);
    StatusCode::OK.into_response()
}

async fn handle_show(State(state): State<Arc<FakeState>>, Json(body): Json<NameBody>) -> Response {
    if let Some(resp) = state.gate().await {
        return resp;
    }
    let model = state
        .models
        .lock()
        .unwrap()
        .iter()
        .find(|m| m.name == body.name)
        .cloned();
    match model {
        Some(m) => Json(json!({
            "modelfile": format!("FROM {}", m.name),
            "parameters": "stop \"User:\"",
            "template": "{{ .Prompt }}",
            "details": { "family": m.family, "parameter_size": "7B" },
        }))
        .into_response(),
        None => not_found(&body.name),
    }
}

async fn handle_generate(
    State(state): State<Arc<FakeState>>,
    Json(body): Json<GenerateBody>,
) -> Response {
    if let Some(resp) = state.gate().await {
        return resp;
    }
    let known = state
        .models
        .lock()
        .unwrap()
        .iter()
        .any(|m| m.name == body.model);
    if !known {
        return not_found(&body.model);
    }
    Json(json!({
        "model": body.model,
        "response": format!("echo: {}", body.prompt),
        "done": true,
    }))
    .into_response()
}
