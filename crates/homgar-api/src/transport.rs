// Shared transport configuration for building the reqwest::Client.
//
// Every cloud request carries the same `lang` / `appCode` headers, so
// they are installed once as client defaults instead of per request.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::Error;

/// Language tag sent with every request.
const LANG: &str = "en";

/// Application code the cloud expects from the mobile app.
const APP_CODE: &str = "1";

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("homgar/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl TransportConfig {
    /// Config with a custom request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .default_headers(default_headers())
            .build()
            .map_err(|e| Error::HttpClient(format!("failed to build HTTP client: {e}")))
    }
}

/// Headers attached to every cloud request.
pub(crate) fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("lang", HeaderValue::from_static(LANG));
    headers.insert("appCode", HeaderValue::from_static(APP_CODE));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_headers_carry_app_identity() {
        let headers = default_headers();
        assert_eq!(headers.get("lang").map(HeaderValue::as_bytes), Some(&b"en"[..]));
        assert_eq!(headers.get("appCode").map(HeaderValue::as_bytes), Some(&b"1"[..]));
    }

    #[test]
    fn timeout_override() {
        let config = TransportConfig::default().with_timeout(Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.build_client().is_ok());
    }
}
