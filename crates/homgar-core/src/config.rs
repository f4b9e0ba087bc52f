// ── Runtime coordinator configuration ──
//
// Describes how to reach the cloud and how often to poll and renew.
// Carries credential data but never touches disk; the CLI builds a
// `CoordinatorConfig` from `homgar-config` and hands it in.

use std::time::Duration;

use homgar_api::{Credentials, DEFAULT_BASE_URL};

/// Configuration for one coordinator instance.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Cloud API root (e.g. `https://region3.homgarus.com`).
    pub base_url: String,
    pub credentials: Credentials,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Poll tick period (seconds).
    pub poll_interval_secs: u64,
    /// How often the renewal loop checks subscription expiry (seconds).
    pub renewal_interval_secs: u64,
    /// Back-off after a failed renewal (seconds).
    pub renewal_retry_secs: u64,
    /// Whether to run the push channel at all.
    pub push_enabled: bool,
    /// How long a fresh push link may take to report connected.
    pub push_health_timeout: Duration,
}

impl CoordinatorConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            credentials,
            timeout: Duration::from_secs(30),
            poll_interval_secs: 30,
            renewal_interval_secs: 300,
            renewal_retry_secs: 60,
            push_enabled: true,
            push_health_timeout: Duration::from_secs(10),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn renewal_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_interval_secs)
    }

    pub fn renewal_retry(&self) -> Duration {
        Duration::from_secs(self.renewal_retry_secs)
    }
}
