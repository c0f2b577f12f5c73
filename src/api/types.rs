//! API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Whether the server is running in dev mode (auth disabled)
    pub dev_mode: bool,

    /// Whether auth is required for API requests (dev_mode=false)
    pub auth_required: bool,

    /// Authentication mode ("disabled", "jwt")
    pub auth_mode: String,

    /// Task store backend ("memory", "sqlite", "airtable")
    pub task_store: String,

    /// Whether tasks survive a restart
    pub persistent: bool,
}

/// Login request for trainer auth.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response containing a JWT for API authentication.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Expiration as unix seconds.
    pub exp: i64,
}

/// A rubric document, either as a JSON string or an inline object.
///
/// Kept as raw text: parsing into a map would silently merge duplicate keys.
#[derive(Debug, Clone, Deserialize)]
pub struct RubricRequest {
    pub rubric: Box<RawValue>,
}

/// A score sheet, either as a JSON string or an inline object.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoresRequest {
    pub scores: Box<RawValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateScoresRequest {
    pub scores: Box<RawValue>,
    pub rubric: Box<RawValue>,
}

/// The JSON text of a document that may have been sent as a string.
///
/// Inline documents are returned exactly as the client wrote them; JSON
/// strings are unescaped to the document they carry.
pub fn raw_json(value: &RawValue) -> String {
    let text = value.get();
    if text.starts_with('"') {
        if let Ok(inner) = serde_json::from_str::<String>(text) {
            return inner;
        }
    }
    text.to_string()
}
