// Cloud authentication
//
// Email/password login for a bearer token with an absolute expiry. The
// password never leaves the process in clear text: the cloud expects its
// MD5 hex digest. Sessions are cached and reused until they come within
// an hour of expiring.

use std::fmt;

use chrono::Utc;
use md5::{Digest, Md5};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::HomgarClient;
use crate::error::Error;
use crate::models::{LoginData, LoginRequest};

/// Area code used by the mobile app when none is configured.
pub const DEFAULT_AREA_CODE: &str = "31";

/// A session is refreshed once it is this close to expiring.
pub const SESSION_REFRESH_MARGIN_SECS: i64 = 60 * 60;

/// Account credentials.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
    pub area_code: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
            area_code: DEFAULT_AREA_CODE.to_owned(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("area_code", &self.area_code)
            .finish()
    }
}

/// Persistable session blob: `{email, token, token_expires, refresh_token}`.
///
/// `token_expires` is an absolute Unix timestamp in seconds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCache {
    pub email: String,
    pub token: String,
    pub token_expires: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl AuthCache {
    /// Whether a fresh login is required for `email` at time `now` (epoch secs).
    pub fn needs_login(&self, email: &str, now: i64) -> bool {
        self.email != email
            || self.token.is_empty()
            || self.token_expires - now < SESSION_REFRESH_MARGIN_SECS
    }
}

impl fmt::Debug for AuthCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCache")
            .field("email", &self.email)
            .field("token", &"[REDACTED]")
            .field("token_expires", &self.token_expires)
            .finish_non_exhaustive()
    }
}

/// MD5 hex digest of the password, as the login endpoint expects it.
pub fn hash_password(password: &SecretString) -> String {
    format!("{:x}", Md5::digest(password.expose_secret().as_bytes()))
}

/// Random 16-byte hex identifier for this client install.
fn random_device_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl HomgarClient {
    /// Log in with email/password.
    ///
    /// On success the session token is stored on the client and used for
    /// all subsequent requests; the returned cache can be persisted.
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthCache, Error> {
        let url = self.api_url("/auth/basic/app/login")?;
        debug!(email = %credentials.email, "logging in");

        let body = LoginRequest {
            area_code: &credentials.area_code,
            phone_or_email: &credentials.email,
            password: hash_password(&credentials.password),
            device_id: random_device_id(),
        };

        let data: LoginData = self.post(url, &body).await.map_err(|e| match e {
            Error::Api { code, message } => Error::Authentication {
                message: format!("login rejected ({code}): {message}"),
            },
            other => other,
        })?;

        let cache = AuthCache {
            email: credentials.email.clone(),
            token: data.token,
            token_expires: Utc::now().timestamp() + data.token_expired,
            refresh_token: data.refresh_token,
        };
        self.set_session(Some(cache.clone()));

        info!(expires = cache.token_expires, "login successful");
        Ok(cache)
    }

    /// Reuse the current session unless it belongs to someone else or
    /// expires within the refresh margin; otherwise log in again.
    pub async fn ensure_session(&self, credentials: &Credentials) -> Result<AuthCache, Error> {
        let now = Utc::now().timestamp();
        match self.session() {
            Some(cache) if !cache.needs_login(&credentials.email, now) => Ok(cache),
            _ => self.login(credentials).await,
        }
    }
}
