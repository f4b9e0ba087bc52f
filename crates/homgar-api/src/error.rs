use thiserror::Error;

/// Top-level error type for the `homgar-api` crate.
///
/// Covers every failure mode of the cloud surface: authentication,
/// transport, the `{code, msg, data}` envelope, and the MQTT push channel.
/// `homgar-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed or no session is available for an authenticated call.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),

    // ── Cloud API ───────────────────────────────────────────────────
    /// Error reported by the cloud (`code != 0` in the envelope, or a
    /// non-success HTTP status, in which case `code` is the status).
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Push ────────────────────────────────────────────────────────
    /// The MQTT push connection could not be set up.
    #[error("Push connection failed: {0}")]
    PushConnect(String),

    /// A push operation was requested before a subscription was issued.
    #[error("No push subscription has been issued")]
    NoSubscription,
}

impl Error {
    /// Returns `true` if the session is likely stale and a fresh login
    /// might resolve the failure.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Authentication { .. } => true,
            Self::Api { code, .. } => *code == 401,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::PushConnect(_) => true,
            Self::Api { code, .. } => (500..600).contains(code),
            _ => false,
        }
    }

    /// Extract the cloud error code, if available.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}
