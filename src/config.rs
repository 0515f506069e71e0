//! Configuration management for the CRM assistant.
//!
//! Configuration can be set via environment variables:
//! - `GEMINI_API_KEY` - Required. API key for the Gemini endpoint.
//! - `DEFAULT_MODEL` - Optional. Model identifier. Defaults to `gemini-3-pro-preview`.
//! - `GEMINI_BASE_URL` - Optional. Endpoint base URL (useful for proxies and tests).
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `15`.
//! - `DATABASE_PATH` - Optional. SQLite file for records and chat sessions.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Timeout for model calls. Defaults to `120`.
//! - `DEV_MODE` - Optional. Disables token auth and uses `DEV_USER` as the caller.
//! - `DEV_USER` - Optional. Caller identity in dev mode. Defaults to `Administrator`.
//! - `JWT_SECRET` - Required outside dev mode. HS256 secret for caller tokens.
//! - `AGENT_READABLE_DOCTYPES` - Optional. Comma list of record types the agent may read, or `*`.
//! - `AGENT_WRITABLE_DOCTYPES` - Optional. Comma list of record types the agent may modify, or `*`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

use crate::records::schema::BUILTIN_DOCTYPES;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

/// Default Gemini REST base URL.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default loop budget.
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Which record types a class of tool calls may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoctypeAllowList {
    /// Every record type the store knows about.
    Any,
    /// Only the named record types.
    Only(BTreeSet<String>),
}

impl DoctypeAllowList {
    /// Parse `*` or a comma-separated list of record type names.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value == "*" {
            return Self::Any;
        }
        Self::Only(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
        )
    }

    pub fn allows(&self, doctype: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(set) => set.contains(doctype),
        }
    }
}

/// Per-record-type gate applied to every tool call.
#[derive(Debug, Clone)]
pub struct ToolPolicy {
    /// Record types readable through `get_list`, `get_doc` and `get_meta`.
    pub readable: DoctypeAllowList,
    /// Record types mutable through `create_doc`, `update_doc` and `delete_doc`.
    pub writable: DoctypeAllowList,
}

impl Default for ToolPolicy {
    fn default() -> Self {
        Self {
            readable: DoctypeAllowList::Any,
            writable: DoctypeAllowList::Only(
                BUILTIN_DOCTYPES.iter().map(|d| d.to_string()).collect(),
            ),
        }
    }
}

/// API auth configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for verifying caller JWTs.
    pub jwt_secret: Option<String>,

    /// Identity assumed for every request in dev mode.
    pub dev_user: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            dev_user: "Administrator".to_string(),
        }
    }
}

impl AuthConfig {
    /// Whether a bearer token is required for API requests. Outside dev mode
    /// it always is, even when no secret is configured.
    pub fn auth_required(&self, dev_mode: bool) -> bool {
        !dev_mode
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key
    pub api_key: String,

    /// Model identifier
    pub default_model: String,

    /// Gemini REST base URL
    pub gemini_base_url: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// SQLite database for records and chat sessions
    pub database_path: PathBuf,

    /// Timeout applied to each model call
    pub request_timeout_secs: u64,

    /// Development mode (disables auth)
    pub dev_mode: bool,

    /// API auth configuration
    pub auth: AuthConfig,

    /// Record-type allow-lists for tool execution
    pub tool_policy: ToolPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GEMINI_API_KEY` is not set, or if
    /// `JWT_SECRET` is not set outside dev mode.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let gemini_base_url = std::env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_env("PORT", 3000u16)?;
        let max_iterations = parse_env("MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS)?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let request_timeout_secs = parse_env("REQUEST_TIMEOUT_SECS", 120u64)?;

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("crm-assistant.db"));

        let dev_mode = std::env::var("DEV_MODE")
            .ok()
            .map(|v| parse_bool(&v).map_err(|e| ConfigError::InvalidValue("DEV_MODE".to_string(), e)))
            .transpose()?
            // In debug builds, default to dev_mode=true; in release, default to false.
            .unwrap_or(cfg!(debug_assertions));

        let auth = AuthConfig {
            jwt_secret: std::env::var("JWT_SECRET").ok(),
            dev_user: std::env::var("DEV_USER").unwrap_or_else(|_| "Administrator".to_string()),
        };

        if !dev_mode && auth.jwt_secret.is_none() {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        let mut tool_policy = ToolPolicy::default();
        if let Ok(v) = std::env::var("AGENT_READABLE_DOCTYPES") {
            tool_policy.readable = DoctypeAllowList::parse(&v);
        }
        if let Ok(v) = std::env::var("AGENT_WRITABLE_DOCTYPES") {
            tool_policy.writable = DoctypeAllowList::parse(&v);
        }

        Ok(Self {
            api_key,
            default_model,
            gemini_base_url,
            host,
            port,
            max_iterations,
            database_path,
            request_timeout_secs,
            dev_mode,
            auth,
            tool_policy,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String, database_path: PathBuf) -> Self {
        Self {
            api_key,
            default_model,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            database_path,
            request_timeout_secs: 120,
            dev_mode: true,
            auth: AuthConfig::default(),
            tool_policy: ToolPolicy::default(),
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}
