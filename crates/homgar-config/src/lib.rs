//! Configuration for the homgar CLI.
//!
//! Layered loading (serialized defaults, TOML file, `HOMGAR_` environment),
//! validation, translation to `homgar_core::CoordinatorConfig`, and the
//! on-disk auth cache that lets runs reuse a cloud session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use homgar_core::{AuthCache, CoordinatorConfig, Credentials};

/// Default cloud API root.
pub const DEFAULT_API_BASE_URL: &str = "https://region3.homgarus.com";

/// Default account area code.
pub const DEFAULT_AREA_CODE: &str = "31";

/// Prefix of the environment overrides (`HOMGAR_EMAIL`, ...).
pub const ENV_PREFIX: &str = "HOMGAR_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured (set email and password, or HOMGAR_EMAIL / HOMGAR_PASSWORD)")]
    NoCredentials,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("auth cache encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// Effective configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Account e-mail.
    pub email: Option<String>,

    /// Account password. Never written back out.
    #[serde(default, skip_serializing)]
    pub password: Option<SecretString>,

    #[serde(default = "default_area_code")]
    pub area_code: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_renewal_interval")]
    pub renewal_interval_secs: u64,

    #[serde(default = "default_renewal_retry")]
    pub renewal_retry_secs: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_push_enabled")]
    pub push_enabled: bool,

    /// Where the auth cache lives; defaults to the data dir.
    pub auth_cache_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            area_code: default_area_code(),
            api_base_url: default_api_base_url(),
            poll_interval_secs: default_poll_interval(),
            renewal_interval_secs: default_renewal_interval(),
            renewal_retry_secs: default_renewal_retry(),
            timeout_secs: default_timeout(),
            push_enabled: default_push_enabled(),
            auth_cache_path: None,
        }
    }
}

fn default_area_code() -> String {
    DEFAULT_AREA_CODE.into()
}
fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.into()
}
fn default_poll_interval() -> u64 {
    30
}
fn default_renewal_interval() -> u64 {
    300
}
fn default_renewal_retry() -> u64 {
    60
}
fn default_timeout() -> u64 {
    30
}
fn default_push_enabled() -> bool {
    true
}

impl Config {
    /// Check the fields a coordinator needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credentials()?;

        let url: url::Url = self
            .api_base_url
            .parse::<url::Url>()
            .map_err(|e| ConfigError::validation("api_base_url", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::validation(
                "api_base_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        for (field, value) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("renewal_interval_secs", self.renewal_interval_secs),
            ("renewal_retry_secs", self.renewal_retry_secs),
            ("timeout_secs", self.timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::validation(field, "must be greater than zero"));
            }
        }
        Ok(())
    }

    /// Account credentials; empty values count as missing.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let email = self
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(ConfigError::NoCredentials)?;
        let password = self
            .password
            .as_ref()
            .filter(|p| !p.expose_secret().is_empty())
            .ok_or(ConfigError::NoCredentials)?;

        let mut credentials = Credentials::new(email, password.clone());
        credentials.area_code.clone_from(&self.area_code);
        Ok(credentials)
    }

    /// Build the coordinator configuration.
    pub fn to_coordinator_config(&self) -> Result<CoordinatorConfig, ConfigError> {
        self.validate()?;

        let mut config = CoordinatorConfig::new(self.credentials()?);
        config.base_url.clone_from(&self.api_base_url);
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.poll_interval_secs = self.poll_interval_secs;
        config.renewal_interval_secs = self.renewal_interval_secs;
        config.renewal_retry_secs = self.renewal_retry_secs;
        config.push_enabled = self.push_enabled;
        Ok(config)
    }

    /// Auth cache location: the configured path or the default.
    pub fn auth_cache_path(&self) -> PathBuf {
        self.auth_cache_path
            .clone()
            .unwrap_or_else(default_auth_cache_path)
    }

    /// Render as TOML. The password is never included.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "homgar", "homgar")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default auth cache location in the platform data dir.
pub fn default_auth_cache_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share").join("auth.json"),
        |dirs| dirs.data_dir().join("auth.json"),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("homgar");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// The provider stack: defaults, then `path`, then `HOMGAR_*`.
pub fn config_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX))
}

/// Load config from `path` (a missing file is fine) and the environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = config_figment(path).extract()?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Load config from the canonical path and the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

// ── Auth cache ──────────────────────────────────────────────────────

/// Read the auth cache. A missing or unreadable file yields `None`.
pub fn load_auth_cache(path: &Path) -> Option<AuthCache> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read auth cache");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring corrupt auth cache");
            None
        }
    }
}

/// Write the auth cache, creating parent directories. The file is
/// readable by the owner only on Unix.
pub fn save_auth_cache(path: &Path, cache: &AuthCache) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(cache)?;
    std::fs::write(path, json)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    debug!(path = %path.display(), "auth cache saved");
    Ok(())
}
