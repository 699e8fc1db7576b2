#![deny(unsafe_code)]

//! Browser front-end: an axum router serving one HTML page and a JSON API
//! over the daemon client, prober and lifecycle controller.

pub mod types;

use std::future::Future;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use chrono::Utc;
use herdctl_config::AppConfig;
use herdctl_core::chat::build_chat_prompt;
use herdctl_core::diagnostics::{server_issues, server_logs};
use herdctl_core::{
    DaemonClient, LifecycleAction, LifecycleController, OperationResult, Prober, ServerStatus,
    StatusSource,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

use types::*;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Shared state accessible to all route handlers.
pub struct WebState {
    pub client: Arc<DaemonClient>,
    pub prober: Prober,
    pub controller: Arc<LifecycleController>,
}

impl WebState {
    pub fn from_config(config: &AppConfig) -> Self {
        let controller = LifecycleController::from_config(&config.lifecycle);
        Self::with_controller(config, Arc::new(controller))
    }

    pub fn with_controller(config: &AppConfig, controller: Arc<LifecycleController>) -> Self {
        let client = Arc::new(DaemonClient::from_config(&config.daemon));
        Self {
            prober: Prober::new(client.clone(), config.daemon.probe_timeout()),
            client,
            controller,
        }
    }

    async fn probe(&self) -> ServerStatus {
        self.prober.probe().await
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// A failure reported inline with HTTP 200.
fn soft_failure(error: impl Into<String>) -> ApiError {
    (StatusCode::OK, Json(ErrorResponse::new(error)))
}

fn failure(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(error)))
}

/// Build the axum router with all routes.
pub fn router(state: Arc<WebState>) -> axum::Router {
    axum::Router::new()
        .route("/", get(handle_index))
        .route("/api/models", get(handle_models))
        .route("/api/download", post(handle_download))
        .route("/api/delete", post(handle_delete))
        .route("/api/info/{model_name}", get(handle_info))
        .route("/api/generate", post(handle_generate))
        .route("/api/server/status", get(handle_status))
        .route("/api/server/logs", get(handle_logs))
        .route("/api/server/errors", get(handle_errors))
        .route("/api/server/start", post(handle_start))
        .route("/api/server/stop", post(handle_stop))
        .route("/api/server/restart", post(handle_restart))
        .with_state(state)
}

/// Serve the router on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<WebState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "web server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_index() -> Html<String> {
    Html(INDEX_HTML.replace(
        "{{VERSION}}",
        &herdctl_core::build_info::version_string(),
    ))
}

async fn handle_models(State(state): State<Arc<WebState>>) -> ApiResult<ModelsResponse> {
    let models = state
        .client
        .list_models()
        .await
        .map_err(|e| soft_failure(e.to_string()))?;
    Ok(Json(ModelsResponse {
        success: true,
        models: models.iter().map(ModelView::from).collect(),
    }))
}

async fn handle_download(
    State(state): State<Arc<WebState>>,
    Json(req): Json<ModelNameRequest>,
) -> ApiResult<MessageResponse> {
    let name = req
        .name()
        .ok_or_else(|| soft_failure("Model name is required"))?
        .to_string();

    let client = state.client.clone();
    let model = name.clone();
    tokio::spawn(async move {
        match client.pull_model(&model).await {
            Ok(()) => info!(%model, "download finished"),
            Err(e) => warn!(%model, error = %e, "download failed"),
        }
    });

    info!(model = %name, "download started");
    Ok(Json(MessageResponse::new(format!(
        "Download started for {name}"
    ))))
}

async fn handle_delete(
    State(state): State<Arc<WebState>>,
    Json(req): Json<ModelNameRequest>,
) -> ApiResult<MessageResponse> {
    let name = req
        .name()
        .ok_or_else(|| soft_failure("Model name is required"))?;
    state
        .client
        .delete_model(name)
        .await
        .map_err(|e| soft_failure(e.to_string()))?;
    info!(model = %name, "model deleted");
    Ok(Json(MessageResponse::new(format!(
        "Model {name} deleted successfully"
    ))))
}

async fn handle_info(
    State(state): State<Arc<WebState>>,
    Path(model_name): Path<String>,
) -> ApiResult<InfoResponse> {
    let info = state
        .client
        .show_model(&model_name)
        .await
        .map_err(|e| soft_failure(e.to_string()))?;
    Ok(Json(InfoResponse {
        success: true,
        info,
    }))
}

async fn handle_generate(
    State(state): State<Arc<WebState>>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<GenerateResponse> {
    let (Some(model), Some(prompt)) = (
        req.model.as_deref().filter(|m| !m.is_empty()),
        req.prompt.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "Model and prompt are required",
        ));
    };

    let full_prompt = build_chat_prompt(&req.history, prompt);
    let response = state
        .client
        .generate(model, &full_prompt)
        .await
        .map_err(|e| {
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to generate response: {e}"),
            )
        })?;
    Ok(Json(GenerateResponse {
        success: true,
        response,
    }))
}

async fn handle_status(State(state): State<Arc<WebState>>) -> Json<StatusResponse> {
    let status = state.probe().await;
    Json(StatusResponse::new(&status, state.controller.is_busy()))
}

async fn handle_logs(State(state): State<Arc<WebState>>) -> Json<LogsResponse> {
    let status = state.probe().await;
    Json(LogsResponse {
        success: true,
        logs: server_logs(&status, state.client.base_url(), Utc::now()),
    })
}

async fn handle_errors(State(state): State<Arc<WebState>>) -> Json<ErrorsResponse> {
    let status = state.probe().await;
    Json(ErrorsResponse {
        success: true,
        errors: server_issues(&status, state.client.base_url(), Utc::now()),
    })
}

async fn handle_start(state: State<Arc<WebState>>) -> ApiResult<LifecycleResponse> {
    run_lifecycle(state, LifecycleAction::Start).await
}

async fn handle_stop(state: State<Arc<WebState>>) -> ApiResult<LifecycleResponse> {
    run_lifecycle(state, LifecycleAction::Stop).await
}

async fn handle_restart(state: State<Arc<WebState>>) -> ApiResult<LifecycleResponse> {
    run_lifecycle(state, LifecycleAction::Restart).await
}

async fn run_lifecycle(
    State(state): State<Arc<WebState>>,
    action: LifecycleAction,
) -> ApiResult<LifecycleResponse> {
    let Some(task) = state.controller.try_spawn(action) else {
        return Err(failure(
            StatusCode::CONFLICT,
            "Another server operation is in progress",
        ));
    };

    info!(%action, "lifecycle requested via web");
    let result = task.await.unwrap_or_else(|e| {
        OperationResult::failed(format!("{action} task did not complete: {e}"))
    });
    if !result.success() {
        warn!(%action, %result, "lifecycle operation failed");
    }
    Ok(Json(LifecycleResponse {
        action: action.as_str(),
        result,
    }))
}
