// ── Core error types ──
//
// User-facing errors from homgar-core. Consumers never see HTTP
// statuses or JSON failures directly; the `From<homgar_api::Error>`
// impl folds transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cannot reach the HomGar cloud: {reason}")]
    ConnectionFailed { reason: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    /// A poll cycle failed as a whole; the previous table is kept.
    #[error("Update failed: {source}")]
    UpdateFailed {
        #[source]
        source: Box<CoreError>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {key}")]
    DeviceNotFound { key: String },

    #[error("Invalid zone {zone} for device {key}")]
    InvalidZone { key: String, zone: u8 },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Coordinator is not running")]
    CoordinatorStopped,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wrap as the single "update failed" condition of a poll cycle.
    pub fn update_failed(self) -> Self {
        match self {
            already @ Self::UpdateFailed { .. } => already,
            other => Self::UpdateFailed {
                source: Box::new(other),
            },
        }
    }

    /// The cloud error code, looking through `UpdateFailed`.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } => Some(*code),
            Self::UpdateFailed { source } => source.api_code(),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<homgar_api::Error> for CoreError {
    fn from(err: homgar_api::Error) -> Self {
        match err {
            homgar_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            homgar_api::Error::Transport(ref e) => {
                if e.is_timeout() || e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        code: e.status().map_or(0, |s| i64::from(s.as_u16())),
                        message: e.to_string(),
                    }
                }
            }
            homgar_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            homgar_api::Error::HttpClient(reason) => CoreError::Internal(reason),
            homgar_api::Error::Api { code, message } => CoreError::Api { code, message },
            homgar_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            homgar_api::Error::PushConnect(reason) => CoreError::ConnectionFailed {
                reason: format!("push connection failed: {reason}"),
            },
            homgar_api::Error::NoSubscription => {
                CoreError::Internal("no push subscription has been issued".into())
            }
        }
    }
}
