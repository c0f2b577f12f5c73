//! JWT auth for trainers.
//!
//! - A trainer submits their email and the shared password to `/api/auth/login`
//! - Server returns a JWT (subject = trainer email) valid for `JWT_TTL_DAYS`
//! - When `DEV_MODE=false`, all task endpoints require `Authorization: Bearer <jwt>`
//! - In dev mode the trainer is read from the `X-Trainer-Email` header
//!
//! The authenticated trainer is passed to handlers as `Extension<AuthUser>`.
//!
//! # Security notes
//! - There is one shared password. Anyone who holds it can sign in as any
//!   trainer email; per-trainer credentials are not implemented.
//! - Use a strong `JWT_SECRET` and `TRAINER_PASSWORD` in production.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;

use super::error::ApiError;
use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse};

/// Header carrying the trainer identity in dev mode.
pub const DEV_TRAINER_HEADER: &str = "x-trainer-email";

/// Trainer used in dev mode when no header is sent.
pub const DEV_TRAINER_EMAIL: &str = "dev@localhost";

/// The caller, as established by [`require_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub email: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Trainer email
    sub: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a_bytes.len() {
        diff |= a_bytes[i] ^ b_bytes[i];
    }
    diff == 0
}

fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(email)
}

pub(crate) fn issue_jwt(secret: &str, email: &str, ttl_days: i64) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: email.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    req: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = req?;
    let email = normalize_email(&req.email)
        .ok_or_else(|| ApiError::bad_request("A valid email is required"))?;

    let expected = state
        .config
        .auth
        .trainer_password
        .as_deref()
        .unwrap_or("");

    if expected.is_empty() || !constant_time_eq(req.password.trim(), expected) {
        return Err(ApiError::Unauthorized("Invalid email or password".to_string()));
    }

    let secret = state.config.auth.jwt_secret.as_deref().ok_or_else(|| {
        tracing::error!("Login attempted without JWT_SECRET configured");
        ApiError::Internal("JWT_SECRET not configured".to_string())
    })?;

    let (token, exp) = issue_jwt(secret, &email, state.config.auth.jwt_ttl_days)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(trainer = %email, "Trainer logged in");
    Ok(Json(LoginResponse { token, exp }))
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Dev mode => identity from header, no token checks.
    if state.config.dev_mode {
        let email = req
            .headers()
            .get(DEV_TRAINER_HEADER)
            .and_then(|h| h.to_str().ok())
            .and_then(normalize_email)
            .unwrap_or_else(|| DEV_TRAINER_EMAIL.to_string());
        req.extensions_mut().insert(AuthUser { email });
        return next.run(req).await;
    }

    // If auth isn't configured, fail closed in non-dev mode.
    let secret = match state.config.auth.jwt_secret.as_deref() {
        Some(s) => s,
        None => {
            return ApiError::Internal("JWT_SECRET not configured".to_string()).into_response();
        }
    };

    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return ApiError::Unauthorized("Missing Authorization header".to_string())
            .into_response();
    }

    match verify_jwt(token, secret) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthUser { email: claims.sub });
            next.run(req).await
        }
        Err(_) => ApiError::Unauthorized("Invalid or expired token".to_string()).into_response(),
    }
}
