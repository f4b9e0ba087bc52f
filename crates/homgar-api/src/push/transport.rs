//! MQTT push transport with auto-reconnect.
//!
//! [`MqttConnector`] opens a session on the vendor broker with signed
//! [`PushCredentials`] and streams decoded [`PushMessage`]s through a
//! [`tokio::sync::broadcast`] channel. The event loop reconnects on its
//! own with exponential backoff and re-subscribes the topic set on every
//! ConnAck. Connectors sit behind the [`PushConnector`] trait so session
//! lifecycle logic can be exercised without a broker.
//!
//! # Example
//!
//! ```rust,ignore
//! use homgar_api::push::{MqttConnector, PushConnector};
//! use tokio_util::sync::CancellationToken;
//!
//! let link = MqttConnector::default()
//!     .open(subscription.credentials()?, CancellationToken::new())
//!     .await?;
//! let mut rx = link.subscribe();
//! while let Ok(msg) = rx.recv().await {
//!     println!("#{} {}", msg.seq, msg.topic);
//! }
//! link.shutdown();
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::push::message::PushMessage;
use crate::push::subscription::PushCredentials;

// ── Channel capacities ───────────────────────────────────────────────

const MESSAGE_CHANNEL_CAPACITY: usize = 256;
const REQUEST_CHANNEL_CAPACITY: usize = 32;

/// MQTT keep-alive the broker expects.
const KEEP_ALIVE: Duration = Duration::from_secs(120);

// ── PushConnector ────────────────────────────────────────────────────

/// Opens push sessions.
///
/// `open` returns as soon as the session's background task is running;
/// the broker handshake happens asynchronously and is observable through
/// [`PushLink::is_connected`].
pub trait PushConnector: Send + Sync + 'static {
    fn open(
        &self,
        credentials: PushCredentials,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<PushLink, Error>> + Send;
}

// ── PushLink ─────────────────────────────────────────────────────────

/// Handle to one running push session.
///
/// Dropping the handle does not stop the session; call
/// [`shutdown`](Self::shutdown) (or cancel the token it was opened with).
pub struct PushLink {
    messages: broadcast::Receiver<Arc<PushMessage>>,
    connected: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl PushLink {
    /// Assemble a link from the session's channels.
    pub fn new(
        messages: broadcast::Receiver<Arc<PushMessage>>,
        connected: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            messages,
            connected,
            cancel,
        }
    }

    /// Get a new receiver for the message stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PushMessage>> {
        self.messages.resubscribe()
    }

    /// Whether the broker has acknowledged the current connection.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Whether the session has ended (shut down, or its task exited).
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.connected.has_changed().is_err()
    }

    /// Wait until the broker acknowledges the connection, up to `timeout`.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let mut connected = self.connected.clone();
        tokio::time::timeout(timeout, connected.wait_for(|up| *up))
            .await
            .is_ok_and(|res| res.is_ok())
    }

    /// Signal the session task to disconnect and exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for broker reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 60s.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

// ── MqttConnector ────────────────────────────────────────────────────

/// Production connector backed by `rumqttc`.
#[derive(Debug, Clone, Default)]
pub struct MqttConnector {
    reconnect: ReconnectConfig,
}

impl MqttConnector {
    pub fn new(reconnect: ReconnectConfig) -> Self {
        Self { reconnect }
    }
}

impl PushConnector for MqttConnector {
    async fn open(
        &self,
        credentials: PushCredentials,
        cancel: CancellationToken,
    ) -> Result<PushLink, Error> {
        if credentials.host.is_empty() {
            return Err(Error::PushConnect("broker host is empty".into()));
        }

        let mut options = MqttOptions::new(
            credentials.client_id.clone(),
            credentials.host.clone(),
            credentials.port,
        );
        options.set_credentials(credentials.username.clone(), credentials.password.clone());
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);

        let (message_tx, message_rx) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        let (connected_tx, connected_rx) = watch::channel(false);

        tracing::info!(
            host = %credentials.host,
            port = credentials.port,
            "opening push session"
        );

        let reconnect = self.reconnect.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            mqtt_loop(
                options,
                credentials.topics,
                message_tx,
                connected_tx,
                reconnect,
                task_cancel,
            )
            .await;
        });

        Ok(PushLink::new(message_rx, connected_rx, cancel))
    }
}

// ── Background event loop ────────────────────────────────────────────

/// Drive the MQTT event loop: poll → dispatch → on error, backoff → poll.
///
/// rumqttc reconnects on the next `poll()` after an error, so the loop
/// only has to pace retries and re-subscribe after each ConnAck.
async fn mqtt_loop(
    options: MqttOptions,
    topics: Vec<String>,
    message_tx: broadcast::Sender<Arc<PushMessage>>,
    connected_tx: watch::Sender<bool>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("push session connected");
                    attempt = 0;
                    connected_tx.send_replace(true);
                    for topic in &topics {
                        if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                            tracing::warn!(error = %e, topic = %topic, "topic subscribe failed");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match PushMessage::decode(&publish.topic, &publish.payload) {
                        Some(message) => {
                            tracing::debug!(seq = message.seq, topic = %message.topic, "push message received");
                            // No subscribers right now is not an error
                            let _ = message_tx.send(Arc::new(message));
                        }
                        None => tracing::debug!(topic = %publish.topic, "undecodable push payload dropped"),
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    tracing::info!("broker closed the push session");
                    connected_tx.send_replace(false);
                }
                Ok(_) => {}
                Err(e) => {
                    connected_tx.send_replace(false);
                    let delay = calculate_backoff(attempt, &reconnect);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "push connection error, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    connected_tx.send_replace(false);
    match client.try_disconnect() {
        // Give the event loop a moment to flush the DISCONNECT packet.
        Ok(()) => {
            let _ = tokio::time::timeout(Duration::from_secs(1), eventloop.poll()).await;
        }
        Err(e) => tracing::debug!(error = %e, "push disconnect request not delivered"),
    }
    tracing::debug!("push loop exiting");
}

// ── Backoff calculation ──────────────────────────────────────────────

/// `delay = min(initial * 2^attempt, max)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let factor = 2_u32.saturating_pow(attempt.min(16));
    config
        .initial_delay
        .saturating_mul(factor)
        .min(config.max_delay)
}

// ── Tests ────────────────────────────────────────────────────────────
