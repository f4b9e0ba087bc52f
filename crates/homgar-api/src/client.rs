// HomGar cloud HTTP client
//
// Wraps `reqwest::Client` with URL construction, session-token injection
// and `{code, msg, data}` envelope unwrapping. Endpoint groups (auth,
// devices, push subscription) are implemented as inherent methods in
// separate files to keep this module focused on transport mechanics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::auth::AuthCache;
use crate::error::Error;
use crate::models::ApiResponse;
use crate::transport::TransportConfig;

/// Default cloud endpoint used by the mobile app.
pub const DEFAULT_BASE_URL: &str = "https://region3.homgarus.com";

/// Header carrying the session token.
const AUTH_HEADER: &str = "auth";

/// Raw HTTP client for the HomGar cloud API.
///
/// All methods return the unwrapped `data` payload; the envelope is
/// stripped before the caller sees it and a non-zero `code` becomes
/// [`Error::Api`].
pub struct HomgarClient {
    http: reqwest::Client,
    base_url: Url,
    /// Current session, if logged in (or restored from a cache).
    session: RwLock<Option<AuthCache>>,
    /// Sequence number for control commands, shared by every caller.
    command_seq: AtomicU64,
}

impl HomgarClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// The caller is responsible for the `lang` / `appCode` default headers
    /// if the cloud should see them.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            session: RwLock::new(None),
            command_seq: AtomicU64::new(0),
        }
    }

    /// The cloud base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Session management ───────────────────────────────────────────

    /// Snapshot of the current session (for persisting the auth cache).
    pub fn session(&self) -> Option<AuthCache> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install a previously persisted session.
    pub fn restore_session(&self, cache: AuthCache) {
        debug!(email = %cache.email, "restoring cached session");
        self.set_session(Some(cache));
    }

    /// Forget the current session.
    pub fn clear_session(&self) {
        self.set_session(None);
    }

    pub(crate) fn set_session(&self, cache: Option<AuthCache>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = cache;
    }

    fn token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.token.clone())
    }

    /// Next control-command sequence number (starts at 1).
    pub(crate) fn next_command_seq(&self) -> u64 {
        self.command_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an API path such as `/app/device/getDeviceStatus`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and unwrap the envelope.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_envelope(resp).await
    }

    /// Send a POST request with JSON body and unwrap the envelope.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", url);

        let resp = self
            .authorize(self.http.post(url).json(body))
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_envelope(resp).await
    }

    /// Attach the session token, if any.
    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token() {
            Some(token) => builder.header(AUTH_HEADER, token),
            None => builder,
        }
    }
}

/// Parse the `{code, msg, data}` envelope, returning `data` on success
/// or an [`Error::Api`] if `code != 0`.
///
/// A missing or `null` `data` is handed to `T` as JSON `null`, so callers
/// that do not care about the payload can ask for `Value` or `()`.
async fn parse_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let preview: String = body.chars().take(200).collect();
        return Err(Error::Api {
            code: i64::from(status.as_u16()),
            message: format!("HTTP {status}: {preview}"),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;
    trace!(len = body.len(), "response body received");

    let envelope: ApiResponse<Value> = serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.clone(),
        }
    })?;

    if envelope.code != 0 {
        return Err(Error::Api {
            code: envelope.code,
            message: envelope
                .msg
                .unwrap_or_else(|| format!("code={}", envelope.code)),
        });
    }

    serde_json::from_value(envelope.data.unwrap_or(Value::Null)).map_err(|e| {
        Error::Deserialization {
            message: e.to_string(),
            body,
        }
    })
}
