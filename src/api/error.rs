//! JSON error responses.
//!
//! Every error body is `{code, message, details?}` where `code` is one of
//! `BAD_REQUEST`, `UNAUTHORIZED`, `NOT_FOUND`, `CONFLICT` or
//! `INTERNAL_SERVER_ERROR`.

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::workflow::WorkflowError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest {
        message: String,
        details: Option<Value>,
    },
    Unauthorized(String),
    NotFound(String),
    Conflict {
        message: String,
        details: Option<Value>,
    },
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            details: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict { .. } => "CONFLICT",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (message, details) = match &self {
            ApiError::BadRequest { message, details } | ApiError::Conflict { message, details } => {
                (message.as_str(), details.as_ref())
            }
            ApiError::Unauthorized(message)
            | ApiError::NotFound(message)
            | ApiError::Internal(message) => (message.as_str(), None),
        };
        let body = ErrorBody {
            code,
            message,
            details,
        };
        (status, Json(body)).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err {
            WorkflowError::Validation(errors) => ApiError::BadRequest {
                message,
                details: Some(json!(errors)),
            },
            WorkflowError::InvalidState(e) => ApiError::BadRequest {
                message,
                details: Some(json!({
                    "step": e.step,
                    "current": e.current,
                    "allowed": e.allowed,
                })),
            },
            WorkflowError::AlreadyAligned(_)
            | WorkflowError::MissingHumanScores(_)
            | WorkflowError::Version(_) => ApiError::bad_request(message),
            WorkflowError::NotFound(_) => ApiError::NotFound(message),
            WorkflowError::IncompleteTaskExists { task_id, status } => ApiError::Conflict {
                message,
                details: Some(json!({
                    "taskId": task_id,
                    "status": status,
                    "label": status.label(),
                    "nextStep": status.next_step(),
                })),
            },
            WorkflowError::MissingRubric { .. }
            | WorkflowError::Store(_)
            | WorkflowError::Files(_) => {
                tracing::error!(error = %message, "Task operation failed");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use crate::task::TaskStatus;

    #[test]
    fn test_workflow_error_mapping() {
        let err: ApiError = WorkflowError::Validation(vec!["a".into(), "b".into()]).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = WorkflowError::IncompleteTaskExists {
            task_id: "t1".to_string(),
            status: TaskStatus::RubricV1,
        }
        .into();
        assert_eq!(err.code(), "CONFLICT");
        match err {
            ApiError::Conflict { message, details } => {
                assert!(message.starts_with("INCOMPLETE_TASK_EXISTS:t1:Rubric_V1:"));
                let details = details.unwrap();
                assert_eq!(details["nextStep"], json!({ "step": "rubricEnhanced" }));
            }
            other => panic!("unexpected {:?}", other),
        }

        let err: ApiError = WorkflowError::Store(StoreError::Remote("boom".into())).into();
        match err {
            ApiError::Internal(message) => assert!(!message.contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
