//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use homgar_config::ConfigError;
use homgar_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the HomGar cloud")]
    #[diagnostic(
        code(homgar::connection_failed),
        help("Check your network connection and api_base_url.\nDetail: {reason}")
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(homgar::auth_failed),
        help("Verify email, password and area_code in your config or HOMGAR_* variables.")
    )]
    AuthFailed { message: String },

    #[error("No credentials configured")]
    #[diagnostic(
        code(homgar::no_credentials),
        help(
            "Set email and password in {path}\n\
             Or export HOMGAR_EMAIL and HOMGAR_PASSWORD."
        )
    )]
    NoCredentials { path: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device '{key}' not found")]
    #[diagnostic(
        code(homgar::not_found),
        help("Run: homgar devices to see available device keys")
    )]
    DeviceNotFound { key: String },

    #[error("Zone command for '{key}' was not accepted")]
    #[diagnostic(
        code(homgar::zone_rejected),
        help("Only multi-zone timers accept zone commands. Run with -v for details.")
    )]
    ZoneRejected { key: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(homgar::api_error))]
    ApiError { code: i64, message: String },

    #[error("{0}")]
    #[diagnostic(code(homgar::core))]
    Core(String),

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(homgar::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(homgar::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    #[diagnostic(code(homgar::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials => Self::NoCredentials {
                path: homgar_config::config_path().display().to_string(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UpdateFailed { source } => Self::from(*source),
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::ConnectionFailed { reason } => Self::ConnectionFailed { reason },
            CoreError::Api { code, message } => Self::ApiError { code, message },
            CoreError::DeviceNotFound { key } => Self::DeviceNotFound { key },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            other => Self::Core(other.to_string()),
        }
    }
}
