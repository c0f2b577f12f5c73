//! Configuration management for rubric-align.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `DEV_MODE` - Optional. Disables JWT checks; the trainer is taken from
//!   the `X-Trainer-Email` header. Defaults to `false`.
//! - `JWT_SECRET` - Required unless `DEV_MODE` is set.
//! - `JWT_TTL_DAYS` - Optional. Token lifetime. Defaults to `30`.
//! - `TRAINER_PASSWORD` - Optional. Shared password accepted by `/api/auth/login`.
//! - `TASK_STORE` - Optional. `memory`, `sqlite` or `airtable`. Defaults to `sqlite`.
//! - `DATA_DIR` - Optional. SQLite database and attachment root. Defaults to `./data`.
//! - `AIRTABLE_API_KEY`, `AIRTABLE_BASE_ID` - Required when `TASK_STORE=airtable`.
//! - `AIRTABLE_TABLE` - Optional. Defaults to `Tasks`.
//! - `AIRTABLE_API_URL` - Optional. Defaults to `https://api.airtable.com`.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::TaskStoreType;
use crate::util::env_var_bool;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// How requests are authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Dev mode: caller identity comes from a header.
    Disabled,
    /// Bearer JWT issued by `/api/auth/login`.
    Jwt,
}

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub jwt_ttl_days: i64,
    pub trainer_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_ttl_days: 30,
            trainer_password: None,
        }
    }
}

impl AuthConfig {
    pub fn auth_mode(&self, dev_mode: bool) -> AuthMode {
        if dev_mode {
            AuthMode::Disabled
        } else {
            AuthMode::Jwt
        }
    }

    pub fn auth_required(&self, dev_mode: bool) -> bool {
        self.auth_mode(dev_mode) == AuthMode::Jwt
    }
}

/// Airtable connection settings.
#[derive(Debug, Clone)]
pub struct AirtableConfig {
    pub api_key: String,
    pub base_id: String,
    pub table: String,
    pub api_url: String,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Skip authentication
    pub dev_mode: bool,

    pub auth: AuthConfig,

    /// Which task store backend to use
    pub store_type: TaskStoreType,

    /// Root for the SQLite database and uploaded attachments
    pub data_dir: PathBuf,

    /// Present when `store_type` is Airtable
    pub airtable: Option<AirtableConfig>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `JWT_SECRET` is not set outside
    /// dev mode, or if Airtable is selected without credentials.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let dev_mode = env_var_bool("DEV_MODE", false);

        let jwt_ttl_days = std::env::var("JWT_TTL_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("JWT_TTL_DAYS".to_string(), format!("{}", e)))?;

        let auth = AuthConfig {
            jwt_secret: std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            jwt_ttl_days,
            trainer_password: std::env::var("TRAINER_PASSWORD")
                .ok()
                .filter(|s| !s.is_empty()),
        };

        if auth.auth_required(dev_mode) && auth.jwt_secret.is_none() {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        let store_type = match std::env::var("TASK_STORE") {
            Ok(value) => TaskStoreType::parse(&value)
                .ok_or_else(|| ConfigError::InvalidValue("TASK_STORE".to_string(), value))?,
            Err(_) => TaskStoreType::default(),
        };

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let airtable = if store_type == TaskStoreType::Airtable {
            Some(AirtableConfig {
                api_key: required_var("AIRTABLE_API_KEY")?,
                base_id: required_var("AIRTABLE_BASE_ID")?,
                table: std::env::var("AIRTABLE_TABLE").unwrap_or_else(|_| "Tasks".to_string()),
                api_url: std::env::var("AIRTABLE_API_URL")
                    .unwrap_or_else(|_| "https://api.airtable.com".to_string()),
            })
        } else {
            None
        };

        Ok(Self {
            host,
            port,
            dev_mode,
            auth,
            store_type,
            data_dir,
            airtable,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(data_dir: PathBuf, store_type: TaskStoreType) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            dev_mode: true,
            auth: AuthConfig::default(),
            store_type,
            data_dir,
            airtable: None,
        }
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}
