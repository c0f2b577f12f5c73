//! Task workflow API endpoints.
//!
//! - List / create tasks
//! - Get a task and its alignment history
//! - Submit rubric versions, human scores and model scores
//!
//! Malformed paths and bodies are answered with the usual JSON error body.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path, State,
    },
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::ApiError;
use super::routes::AppState;
use super::types::{raw_json, RubricRequest, ScoresRequest};
use crate::alignment::AlignmentHistory;
use crate::task::{EvalModel, Task};
use crate::workflow::{CreateTaskInput, TaskMutation};

/// Create task routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks))
        .route("/", post(create_task))
        .route("/:id", get(get_task))
        .route("/:id/alignment", get(get_alignment_history))
        .route("/:id/rubric/v1", post(update_rubric_v1))
        .route("/:id/rubric/enhanced", post(update_rubric_enhanced))
        .route("/:id/human-eval/:model", post(update_human_eval))
        .route("/:id/model-eval/:model", post(update_model_eval))
}

fn parse_model(model: &str) -> Result<EvalModel, ApiError> {
    model.parse().map_err(ApiError::bad_request)
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.tasks.list(&user.email).await?))
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    input: Result<Json<CreateTaskInput>, JsonRejection>,
) -> Result<Json<TaskMutation>, ApiError> {
    let Json(input) = input?;
    Ok(Json(state.tasks.create(&user.email, input).await?))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Task>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.tasks.get(&user.email, &id).await?))
}

async fn get_alignment_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<AlignmentHistory>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.tasks.alignment_history(&user.email, &id).await?))
}

async fn update_rubric_v1(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<String>, PathRejection>,
    req: Result<Json<RubricRequest>, JsonRejection>,
) -> Result<Json<TaskMutation>, ApiError> {
    let (Path(id), Json(req)) = (id?, req?);
    let rubric = raw_json(&req.rubric);
    Ok(Json(
        state.tasks.update_rubric_v1(&user.email, &id, &rubric).await?,
    ))
}

async fn update_rubric_enhanced(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<String>, PathRejection>,
    req: Result<Json<RubricRequest>, JsonRejection>,
) -> Result<Json<TaskMutation>, ApiError> {
    let (Path(id), Json(req)) = (id?, req?);
    let rubric = raw_json(&req.rubric);
    Ok(Json(
        state
            .tasks
            .update_rubric_enhanced(&user.email, &id, &rubric)
            .await?,
    ))
}

async fn update_human_eval(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<(String, String)>, PathRejection>,
    req: Result<Json<ScoresRequest>, JsonRejection>,
) -> Result<Json<TaskMutation>, ApiError> {
    let (Path((id, model)), Json(req)) = (path?, req?);
    let model = parse_model(&model)?;
    let scores = raw_json(&req.scores);
    Ok(Json(
        state
            .tasks
            .update_human_eval(&user.email, &id, model, &scores)
            .await?,
    ))
}

async fn update_model_eval(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<(String, String)>, PathRejection>,
    req: Result<Json<ScoresRequest>, JsonRejection>,
) -> Result<Json<TaskMutation>, ApiError> {
    let (Path((id, model)), Json(req)) = (path?, req?);
    let model = parse_model(&model)?;
    let scores = raw_json(&req.scores);
    Ok(Json(
        state
            .tasks
            .update_model_eval(&user.email, &id, model, &scores)
            .await?,
    ))
}
