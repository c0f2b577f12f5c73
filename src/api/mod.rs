//! HTTP API for rubric-align.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/auth/login` - Exchange email + password for a JWT
//! - `POST /api/rubric/validate` - Check a rubric without saving it
//! - `POST /api/scores/validate` - Check scores against a rubric
//! - `GET /api/tasks` - List the caller's tasks
//! - `POST /api/tasks` - Create a task
//! - `GET /api/tasks/{id}` - Get a task
//! - `GET /api/tasks/{id}/alignment` - Alignment history
//! - `POST /api/tasks/{id}/rubric/v1` - Submit the first rubric
//! - `POST /api/tasks/{id}/rubric/enhanced` - Submit an enhanced rubric
//! - `POST /api/tasks/{id}/human-eval/{model}` - Submit trainer scores
//! - `POST /api/tasks/{id}/model-eval/{model}` - Submit model scores

mod auth;
mod error;
mod routes;
mod tasks;
pub mod types;

pub use auth::AuthUser;
pub use error::ApiError;
pub use routes::{router, serve, AppState};
pub use types::*;
