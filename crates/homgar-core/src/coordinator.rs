// ── Reconciliation coordinator ──
//
// Merges the poll and push channels into one device table. A poll cycle
// replaces the table wholesale and re-establishes the push channel when
// it is down; push messages merge fields in between. Control commands
// run one at a time on the command task.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use homgar_api::models::SubscribeTarget;
use homgar_api::{MqttConnector, PushConnector, PushMessage};

use crate::cloud::{CloudClient, ObserverError, PushObserver};
use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::CoordinatorConfig;
use crate::convert::PushUpdate;
use crate::error::CoreError;
use crate::model::{Device, Home, Hub, ZoneMode};
use crate::store::{DeviceStore, DeviceTable};
use crate::stream::DeviceTableStream;

const COMMAND_CHANNEL_SIZE: usize = 64;
const PUSH_CHANNEL_SIZE: usize = 256;

// ── Coordinator state ────────────────────────────────────────────────

/// Where the coordinator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CoordinatorState {
    /// Created, no poll cycle has completed.
    Idle,
    /// Running on polling alone; push is disabled.
    Polling,
    /// Push is enabled but no link is open. The next poll cycle retries.
    PushInactive,
    /// A push link is open.
    PushActive,
    /// Stopped for good.
    Shutdown,
}

// ── Coordinator ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Owns the device store,
/// the cloud client with its push link, and the background tasks that
/// keep the table current.
pub struct Coordinator<P: PushConnector = MqttConnector> {
    inner: Arc<CoordinatorInner<P>>,
}

impl<P: PushConnector> Clone for Coordinator<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CoordinatorInner<P: PushConnector> {
    config: CoordinatorConfig,
    store: Arc<DeviceStore>,
    cloud: CloudClient<P>,
    state: watch::Sender<CoordinatorState>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    /// Taken by the command task on start; `Some` means not started.
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    /// Registered with the cloud client; forwards into `push_rx`.
    observer: Arc<dyn PushObserver>,
    push_rx: Mutex<Option<mpsc::Receiver<Arc<PushMessage>>>>,
    /// Held for the duration of one poll cycle.
    cycle: Mutex<()>,
    renewal: Mutex<Option<RenewalTask>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

struct RenewalTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Hands push messages from the dispatcher to the apply task.
struct PushForwarder {
    tx: mpsc::Sender<Arc<PushMessage>>,
}

impl PushObserver for PushForwarder {
    fn on_message(&self, message: &Arc<PushMessage>) -> Result<(), ObserverError> {
        self.tx
            .try_send(Arc::clone(message))
            .map_err(|e| format!("push queue rejected message: {e}").into())
    }
}

impl Coordinator<MqttConnector> {
    /// Create a coordinator using the MQTT push transport. Does not
    /// contact the cloud; call [`start()`](Self::start).
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoreError> {
        let cloud = CloudClient::new(&config)?;
        Ok(Self::with_cloud(config, cloud))
    }
}

impl<P: PushConnector> Coordinator<P> {
    /// Create a coordinator around an existing cloud client.
    pub fn with_cloud(config: CoordinatorConfig, cloud: CloudClient<P>) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Idle);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (push_tx, push_rx) = mpsc::channel(PUSH_CHANNEL_SIZE);

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                store: Arc::new(DeviceStore::new()),
                cloud,
                state,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                observer: Arc::new(PushForwarder { tx: push_tx }),
                push_rx: Mutex::new(Some(push_rx)),
                cycle: Mutex::new(()),
                renewal: Mutex::new(None),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.inner.store
    }

    pub fn cloud(&self) -> &CloudClient<P> {
        &self.inner.cloud
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Run the initial poll cycle, then spawn the background tasks
    /// (periodic refresh, push apply, command processor).
    ///
    /// A failed initial cycle is returned and nothing is spawned; `start`
    /// may be retried. Calling it again once running is a no-op.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.refresh().await?;

        let Some(command_rx) = self.inner.command_rx.lock().await.take() else {
            debug!("coordinator already started");
            return Ok(());
        };
        let push_rx = self.inner.push_rx.lock().await.take();
        let cancel = self.inner.cancel.clone();
        let mut handles = self.inner.task_handles.lock().await;

        let poll_interval = self.inner.config.poll_interval();
        if !poll_interval.is_zero() {
            handles.push(tokio::spawn(refresh_task(
                self.clone(),
                poll_interval,
                cancel.clone(),
            )));
        }
        if let Some(push_rx) = push_rx {
            handles.push(tokio::spawn(push_apply_task(
                Arc::clone(&self.inner.store),
                push_rx,
                cancel.clone(),
            )));
        }
        handles.push(tokio::spawn(command_processor_task(
            self.clone(),
            command_rx,
            cancel,
        )));

        info!(
            devices = self.inner.store.device_count(),
            poll_secs = poll_interval.as_secs(),
            "coordinator started"
        );
        Ok(())
    }

    /// Stop everything: renewal loop, push link, background tasks.
    /// Safe to call repeatedly and before `start`.
    pub async fn shutdown(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner.cancel.cancel();

        // Let an in-flight poll cycle finish; later ones see the cancel.
        drop(self.inner.cycle.lock().await);

        let renewal = self.inner.renewal.lock().await.take();
        if let Some(task) = renewal {
            task.cancel.cancel();
            let _ = task.handle.await;
        }

        self.inner.cloud.close().await;

        let handles: Vec<JoinHandle<()>> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        self.inner.state.send_replace(CoordinatorState::Shutdown);
        info!("coordinator shut down");
    }

    /// Start, run `f`, shut down. The shutdown happens whatever `f`
    /// returns.
    pub async fn run_once<F, Fut, T>(&self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        if let Err(e) = self.start().await {
            self.shutdown().await;
            return Err(e);
        }
        let result = f(self.clone()).await;
        self.shutdown().await;
        result
    }

    // ── Poll cycle ───────────────────────────────────────────────────

    /// Run one poll cycle and replace the device table.
    ///
    /// Any failure leaves the previous table untouched and surfaces as
    /// [`CoreError::UpdateFailed`]. When push is enabled but down, the
    /// cycle then tries to bring it up; that failure is only logged.
    /// Returns the number of devices in the table.
    pub async fn refresh(&self) -> Result<usize, CoreError> {
        let _cycle = self.inner.cycle.lock().await;
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::CoordinatorStopped);
        }

        let (homes, hubs) = match self.poll_cycle().await {
            Ok(polled) => polled,
            Err(e) => {
                warn!(error = %e, "poll cycle failed, keeping previous device table");
                return Err(e.update_failed());
            }
        };

        let home_ids: Vec<i64> = homes.iter().map(|h| h.id).collect();
        let targets: Vec<SubscribeTarget> = hubs.iter().filter_map(Hub::subscribe_target).collect();
        self.inner.store.apply_poll(homes, hubs);
        let devices = self.inner.store.device_count();

        if self.inner.config.push_enabled && !self.inner.cloud.is_push_active().await {
            self.setup_push(&home_ids, targets).await;
        }
        self.publish_state().await;
        Ok(devices)
    }

    async fn poll_cycle(&self) -> Result<(Vec<Home>, Vec<Hub>), CoreError> {
        let cloud = &self.inner.cloud;
        cloud.ensure_session().await?;

        let homes = cloud.list_homes().await?;
        let mut hubs = Vec::new();
        for home in &homes {
            let mut home_hubs = cloud.list_hubs(home.id).await?;
            for hub in &mut home_hubs {
                cloud.poll_status(hub).await?;
            }
            hubs.extend(home_hubs);
        }
        debug!(homes = homes.len(), hubs = hubs.len(), "poll cycle complete");
        Ok((homes, hubs))
    }

    // ── Push channel ─────────────────────────────────────────────────

    /// Issue a subscription (unless the current one still covers the
    /// same hubs), connect, and start the renewal loop. Returns whether
    /// a push link is up afterwards.
    async fn setup_push(&self, home_ids: &[i64], targets: Vec<SubscribeTarget>) -> bool {
        let Some(&home_id) = home_ids.first() else {
            debug!("no homes, push not set up");
            return false;
        };
        if targets.is_empty() {
            debug!("no hubs with a product key, push not set up");
            return false;
        }

        let cloud = &self.inner.cloud;
        let reusable = !cloud.subscription_expired()
            && cloud.subscription_scope().is_some_and(|scope| {
                scope.home_id == home_id && scope.home_ids == home_ids && scope.targets == targets
            });
        if reusable {
            debug!("reusing current push subscription");
        } else if cloud
            .issue_push_subscription(home_id, home_ids, targets)
            .await
            .is_none()
        {
            return false;
        }

        match cloud.connect_push(Arc::clone(&self.inner.observer)).await {
            Ok(_) => {
                info!("push channel established");
                self.start_renewal_task().await;
                true
            }
            Err(e) => {
                warn!(error = %e, "push connect failed, retrying on next poll cycle");
                false
            }
        }
    }

    /// Spawn the subscription renewal loop unless one is already running.
    /// Returns whether a new loop was started.
    pub async fn start_renewal_task(&self) -> bool {
        let mut renewal = self.inner.renewal.lock().await;
        if self.inner.cancel.is_cancelled() {
            return false;
        }
        if renewal.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("renewal loop already running");
            return false;
        }

        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(renewal_loop(self.clone(), cancel.clone()));
        *renewal = Some(RenewalTask { handle, cancel });
        true
    }

    /// Whether a renewal loop is currently running.
    pub async fn is_renewal_running(&self) -> bool {
        self.inner
            .renewal
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    async fn publish_state(&self) {
        let next = if self.inner.cancel.is_cancelled() {
            CoordinatorState::Shutdown
        } else if !self.inner.config.push_enabled {
            CoordinatorState::Polling
        } else if self.inner.cloud.is_push_active().await {
            CoordinatorState::PushActive
        } else {
            CoordinatorState::PushInactive
        };
        self.inner.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                debug!(from = %state, to = %next, "coordinator state changed");
                *state = next;
                true
            }
        });
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Execute a command on the command task and await its result.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        if self.inner.cancel.is_cancelled() || self.inner.command_rx.lock().await.is_some() {
            return Err(CoreError::CoordinatorStopped);
        }

        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::CoordinatorStopped)?;

        rx.await.map_err(|_| CoreError::CoordinatorStopped)?
    }

    /// Switch one zone of a timer. `false` for an unknown device, a
    /// device that is not a timer, a zone outside 1..=4, a stopped
    /// coordinator, or a rejected request.
    pub async fn control_zone(
        &self,
        key: &str,
        zone: u8,
        mode: ZoneMode,
        duration_secs: u32,
    ) -> bool {
        let command = Command::ControlZone {
            key: key.to_owned(),
            zone,
            mode,
            duration_secs,
        };
        match self.execute(command).await {
            Ok(_) => true,
            Err(e) => {
                warn!(key, zone, %mode, error = %e, "zone command failed");
                false
            }
        }
    }

    // ── State observation ────────────────────────────────────────────

    pub fn state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    pub fn device_table(&self) -> DeviceTable {
        self.inner.store.device_table()
    }

    pub fn device(&self, key: &str) -> Option<Arc<Device>> {
        self.inner.store.device(key)
    }

    /// Subscribe to device table updates from both channels.
    pub fn subscribe(&self) -> DeviceTableStream {
        self.inner.store.subscribe_devices()
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Periodically run a poll cycle.
async fn refresh_task<P: PushConnector>(
    coordinator: Coordinator<P>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = coordinator.refresh().await {
                    warn!(error = %e, "periodic refresh failed");
                }
            }
        }
    }
}

/// Apply forwarded push messages to the store.
async fn push_apply_task(
    store: Arc<DeviceStore>,
    mut rx: mpsc::Receiver<Arc<PushMessage>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            message = rx.recv() => {
                let Some(message) = message else { break };
                let Some(update) = PushUpdate::from_message(&message) else {
                    trace!(seq = message.seq, topic = %message.topic, "push message without field updates");
                    continue;
                };
                let applied = store.apply_push(update.mid, &update.fragments);
                debug!(
                    seq = message.seq,
                    mid = update.mid,
                    fields = update.fragments.len(),
                    applied,
                    "applied push update"
                );
            }
        }
    }
}

/// Process commands from the mpsc channel one at a time.
async fn command_processor_task<P: PushConnector>(
    coordinator: Coordinator<P>,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&coordinator, envelope.command).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

async fn route_command<P: PushConnector>(
    coordinator: &Coordinator<P>,
    command: Command,
) -> Result<CommandResult, CoreError> {
    match command {
        Command::ControlZone {
            key,
            zone,
            mode,
            duration_secs,
        } => {
            let device = coordinator
                .device(&key)
                .ok_or_else(|| CoreError::DeviceNotFound { key: key.clone() })?;
            let request = device
                .zone_command(zone, mode, duration_secs)
                .ok_or(CoreError::InvalidZone { key, zone })?;

            let cloud = coordinator.cloud();
            cloud.ensure_session().await?;
            cloud.control_work_mode(&request).await?;
            Ok(CommandResult::Ok)
        }
        Command::Refresh => {
            let devices = coordinator.refresh().await?;
            Ok(CommandResult::Refreshed { devices })
        }
    }
}

/// Renew the push subscription when it expires, while push stays active.
async fn renewal_loop<P: PushConnector>(coordinator: Coordinator<P>, cancel: CancellationToken) {
    let cloud = coordinator.cloud();
    let config = coordinator.config();
    let mut delay = config.renewal_interval();
    debug!(interval_secs = delay.as_secs(), "renewal loop started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
        if !cloud.is_push_active().await {
            debug!("push inactive, renewal loop exiting");
            break;
        }

        delay = config.renewal_interval();
        if !cloud.subscription_expired() {
            continue;
        }

        info!("push subscription expired, renewing");
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            renewed = cloud.renew_and_reconnect() => {
                if let Err(e) = renewed {
                    warn!(error = %e, retry_secs = config.renewal_retry_secs, "push renewal failed");
                    delay = config.renewal_retry();
                }
            }
        }
    }
    debug!("renewal loop exited");
}
