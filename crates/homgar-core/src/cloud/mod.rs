// ── Cloud client ──
//
// Domain-level facade over `homgar_api`: session handling, enumeration
// into the device model, per-hub status polling, and (in `push`) the
// push-subscription lifecycle. Owns the single push link of the process.

mod observer;
mod push;

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use homgar_api::{
    AuthCache, Credentials, HomgarClient, MqttConnector, PushConnector, Subscription,
    TransportConfig, WorkModeCommand,
};

use crate::config::CoordinatorConfig;
use crate::error::CoreError;
use crate::model::{Home, Hub, StatusFragment};

pub use observer::{ObserverError, PushObserver};
pub use push::SubscriptionScope;

use observer::ObserverRegistry;
use push::ActivePush;

/// Authenticated access to the HomGar cloud.
///
/// Generic over the push transport so the push lifecycle can run
/// against a fake connector in tests.
pub struct CloudClient<P: PushConnector = MqttConnector> {
    api: HomgarClient,
    credentials: Credentials,
    connector: P,
    /// Current push subscription; replaced on issue and on renewal.
    subscription: ArcSwapOption<Subscription>,
    /// Scope of the last issued subscription, reused for renewal.
    scope: ArcSwapOption<SubscriptionScope>,
    /// The one push link of this client. Held only to inspect or swap
    /// the slot, never across a renewal's network calls.
    push: Mutex<Option<ActivePush>>,
    /// Serializes renewals.
    renewal: Mutex<()>,
    observers: Arc<ObserverRegistry>,
    health_timeout: std::time::Duration,
    cancel: CancellationToken,
}

impl CloudClient<MqttConnector> {
    /// Build a client for the MQTT push transport.
    pub fn new(config: &CoordinatorConfig) -> Result<Self, CoreError> {
        Self::with_connector(config, MqttConnector::default())
    }
}

impl<P: PushConnector> CloudClient<P> {
    /// Build a client with a custom push connector.
    pub fn with_connector(config: &CoordinatorConfig, connector: P) -> Result<Self, CoreError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| CoreError::Config {
            message: format!("invalid api_base_url {:?}: {e}", config.base_url),
        })?;
        let transport = TransportConfig::default().with_timeout(config.timeout);
        let api = HomgarClient::new(base_url, &transport)?;
        Ok(Self::with_api(
            api,
            config.credentials.clone(),
            connector,
            config.push_health_timeout,
        ))
    }

    /// Wrap an existing API client.
    pub fn with_api(
        api: HomgarClient,
        credentials: Credentials,
        connector: P,
        health_timeout: std::time::Duration,
    ) -> Self {
        Self {
            api,
            credentials,
            connector,
            subscription: ArcSwapOption::empty(),
            scope: ArcSwapOption::empty(),
            push: Mutex::new(None),
            renewal: Mutex::new(()),
            observers: Arc::default(),
            health_timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// The raw API client.
    pub fn api(&self) -> &HomgarClient {
        &self.api
    }

    pub fn email(&self) -> &str {
        &self.credentials.email
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Log in unconditionally.
    pub async fn authenticate(&self) -> Result<AuthCache, CoreError> {
        Ok(self.api.login(&self.credentials).await?)
    }

    /// Reuse the session unless it is missing, belongs to another
    /// account, or expires within the hour.
    pub async fn ensure_session(&self) -> Result<AuthCache, CoreError> {
        Ok(self.api.ensure_session(&self.credentials).await?)
    }

    /// The current session, for persisting.
    pub fn session(&self) -> Option<AuthCache> {
        self.api.session()
    }

    /// Install a persisted session. Ignored when it belongs to another
    /// account.
    pub fn restore_session(&self, cache: AuthCache) {
        if cache.email == self.credentials.email {
            self.api.restore_session(cache);
        } else {
            debug!("cached session belongs to another account, ignoring");
        }
    }

    // ── Enumeration and polling ──────────────────────────────────────

    pub async fn list_homes(&self) -> Result<Vec<Home>, CoreError> {
        let homes = self.api.list_homes().await?;
        Ok(homes.into_iter().map(Home::from).collect())
    }

    /// Hubs of a home with their supported sub-devices.
    pub async fn list_hubs(&self, home_id: i64) -> Result<Vec<Hub>, CoreError> {
        let hubs = self.api.list_hubs(home_id).await?;
        Ok(hubs.into_iter().map(Hub::from).collect())
    }

    /// Fetch the hub's status document and apply it to the hub and its
    /// sub-devices. Returns how many fragments were applied.
    pub async fn poll_status(&self, hub: &mut Hub) -> Result<usize, CoreError> {
        let doc = self.api.device_status(hub.mid()).await?;
        let received = doc.sub_device_status.len();
        let applied = hub.apply_status(doc.sub_device_status.into_iter().map(StatusFragment::from));
        debug!(hub = hub.mid(), received, applied, "applied hub status");
        Ok(applied)
    }

    // ── Control ──────────────────────────────────────────────────────

    /// Send one work-mode command.
    pub async fn control_work_mode(&self, command: &WorkModeCommand) -> Result<(), CoreError> {
        let response = self.api.control_work_mode(command).await?;
        info!(
            mid = command.mid,
            addr = command.addr,
            port = command.port,
            mode = command.mode,
            duration = command.duration,
            "work-mode command accepted"
        );
        debug!(%response, "work-mode response");
        Ok(())
    }

    /// Current push subscription, if one has been issued.
    pub fn subscription(&self) -> Option<Arc<Subscription>> {
        self.subscription.load_full()
    }

    /// `true` with no subscription, or within a minute of its expiry.
    pub fn subscription_expired(&self) -> bool {
        self.subscription
            .load()
            .as_ref()
            .is_none_or(|s| s.is_expired())
    }
}
