//! HTTP route handlers.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{AuthMode, Config};
use crate::files::LocalFileStorage;
use crate::rubric::{RubricValidation, ScoreValidation};
use crate::store::{create_task_store, TaskStoreType};
use crate::workflow::TaskService;

use super::auth;
use super::error::ApiError;
use super::tasks as tasks_api;
use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Workflow operations over the configured store
    pub tasks: TaskService,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = create_task_store(&config).await?;
    tracing::info!(
        store = ?config.store_type,
        persistent = store.is_persistent(),
        "Task store initialized"
    );

    let files = Arc::new(LocalFileStorage::new(config.data_dir.join("files")));
    tracing::info!("Attachment storage at {}", files.root().display());

    let state = Arc::new(AppState {
        config: config.clone(),
        tasks: TaskService::new(store, files),
    });

    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/rubric/validate", post(validate_rubric))
        .route("/api/scores/validate", post(validate_scores))
        .nest("/api/tasks", tasks_api::routes())
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wait for SIGTERM/SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let auth_mode = match state.config.auth.auth_mode(state.config.dev_mode) {
        AuthMode::Disabled => "disabled",
        AuthMode::Jwt => "jwt",
    };
    let task_store = match state.config.store_type {
        TaskStoreType::Memory => "memory",
        TaskStoreType::Sqlite => "sqlite",
        TaskStoreType::Airtable => "airtable",
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
        auth_required: state.config.auth.auth_required(state.config.dev_mode),
        auth_mode: auth_mode.to_string(),
        task_store: task_store.to_string(),
        persistent: state.tasks.store().is_persistent(),
    })
}

/// Check a rubric without saving it.
async fn validate_rubric(
    State(state): State<Arc<AppState>>,
    req: Result<Json<RubricRequest>, JsonRejection>,
) -> Result<Json<RubricValidation>, ApiError> {
    let Json(req) = req?;
    Ok(Json(state.tasks.validate_rubric(&raw_json(&req.rubric))))
}

/// Check a score sheet against a rubric without saving it.
async fn validate_scores(
    State(state): State<Arc<AppState>>,
    req: Result<Json<ValidateScoresRequest>, JsonRejection>,
) -> Result<Json<ScoreValidation>, ApiError> {
    let Json(req) = req?;
    Ok(Json(
        state
            .tasks
            .validate_scores(&raw_json(&req.scores), &raw_json(&req.rubric)),
    ))
}
