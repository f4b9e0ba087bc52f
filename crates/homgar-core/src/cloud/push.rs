// ── Push lifecycle ──
//
// Subscription issuance, the single owned push link, and its renewal.
// The `push` mutex guards only the slot holding the link: renewal does
// its network work outside it and locks just to swap links.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use homgar_api::models::SubscribeTarget;
use homgar_api::{PushConnector, PushLink, PushMessage, Subscription};

use super::observer::{ObserverRegistry, PushObserver};
use super::CloudClient;
use crate::error::CoreError;

/// What the last subscription was issued for; renewal reissues it as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionScope {
    pub home_id: i64,
    pub home_ids: Vec<i64>,
    pub targets: Vec<SubscribeTarget>,
}

/// A running link plus the task fanning its messages out to observers.
pub(super) struct ActivePush {
    link: PushLink,
    cancel: CancellationToken,
    dispatcher: JoinHandle<()>,
}

impl ActivePush {
    fn is_live(&self) -> bool {
        !self.link.is_closed() && !self.dispatcher.is_finished()
    }

    /// Shut the link down and wait for the dispatcher to exit, so no
    /// message is delivered after this returns.
    async fn stop(self) {
        self.cancel.cancel();
        self.link.shutdown();
        if let Err(e) = self.dispatcher.await {
            warn!(error = %e, "push dispatcher ended abnormally");
        }
    }
}

impl<P: PushConnector> CloudClient<P> {
    /// Request push credentials for `targets`.
    ///
    /// Failures are logged and reported as `None`; the caller retries on
    /// its next poll cycle.
    pub async fn issue_push_subscription(
        &self,
        home_id: i64,
        home_ids: &[i64],
        targets: Vec<SubscribeTarget>,
    ) -> Option<Arc<Subscription>> {
        if targets.is_empty() {
            debug!(home_id, "no subscribable hubs");
            return None;
        }
        let scope = SubscriptionScope {
            home_id,
            home_ids: home_ids.to_vec(),
            targets: targets.clone(),
        };

        match self.api.subscribe_status(home_id, home_ids, targets).await {
            Ok(subscription) => {
                let subscription = Arc::new(subscription);
                self.subscription.store(Some(Arc::clone(&subscription)));
                self.scope.store(Some(Arc::new(scope)));
                Some(subscription)
            }
            Err(e) => {
                warn!(home_id, error = %e, "push subscription request failed");
                None
            }
        }
    }

    /// Scope of the current subscription.
    pub fn subscription_scope(&self) -> Option<Arc<SubscriptionScope>> {
        self.scope.load_full()
    }

    /// Register `observer` and open the push link for the current
    /// subscription.
    ///
    /// Returns `Ok(false)` without opening anything when a live link
    /// already exists. A closed link is torn down and replaced.
    pub async fn connect_push(&self, observer: Arc<dyn PushObserver>) -> Result<bool, CoreError> {
        self.observers.register(observer);

        let mut active = self.push.lock().await;
        if active.as_ref().is_some_and(ActivePush::is_live) {
            debug!("push link already open");
            return Ok(false);
        }
        if let Some(stale) = active.take() {
            info!("replacing closed push link");
            stale.stop().await;
        }

        let subscription = self
            .subscription
            .load_full()
            .ok_or(homgar_api::Error::NoSubscription)?;
        *active = Some(self.open_link(&subscription).await?);
        Ok(true)
    }

    /// Tear down the push link. Returns `false` when none was open.
    pub async fn disconnect_push(&self) -> bool {
        let Some(active) = self.push.lock().await.take() else {
            return false;
        };
        active.stop().await;
        info!("push link closed");
        true
    }

    /// Reissue the subscription and move onto a link opened with the new
    /// credentials.
    ///
    /// The old link stays up until the new one reports connected within
    /// the health timeout. If it does not, the new link is discarded and
    /// the old link and subscription are kept. Renewals run one at a
    /// time, and readers of the link state never wait on one.
    pub async fn renew_and_reconnect(&self) -> Result<(), CoreError> {
        let _renewing = self.renewal.lock().await;
        let scope = self
            .scope
            .load_full()
            .ok_or(homgar_api::Error::NoSubscription)?;
        if self.cancel.is_cancelled() {
            return Err(CoreError::CoordinatorStopped);
        }

        let fresh = Arc::new(
            self.api
                .subscribe_status(scope.home_id, &scope.home_ids, scope.targets.clone())
                .await?,
        );

        if self.push.lock().await.is_none() {
            debug!("no push link to move, storing renewed subscription");
            self.subscription.store(Some(fresh));
            return Ok(());
        }

        let next = self.open_link(&fresh).await?;
        if !next.link.wait_connected(self.health_timeout).await {
            next.stop().await;
            return Err(CoreError::ConnectionFailed {
                reason: format!(
                    "renewed push link not connected within {}s",
                    self.health_timeout.as_secs()
                ),
            });
        }

        let mut active = self.push.lock().await;
        if self.cancel.is_cancelled() {
            drop(active);
            next.stop().await;
            return Err(CoreError::CoordinatorStopped);
        }
        self.subscription.store(Some(Arc::clone(&fresh)));
        if active.is_none() {
            drop(active);
            debug!("push link closed during renewal, discarding renewed link");
            next.stop().await;
            return Ok(());
        }
        let old = active.replace(next);
        drop(active);

        if let Some(old) = old {
            old.stop().await;
        }
        info!(expires_at_ms = fresh.expires_at_ms, "push subscription renewed");
        Ok(())
    }

    /// Whether a push link is open (it may be between reconnects).
    pub async fn is_push_active(&self) -> bool {
        self.push.lock().await.as_ref().is_some_and(ActivePush::is_live)
    }

    /// Whether the open push link is currently acknowledged by the broker.
    pub async fn is_push_connected(&self) -> bool {
        self.push
            .lock()
            .await
            .as_ref()
            .is_some_and(|p| p.is_live() && p.link.is_connected())
    }

    /// Stop all push activity for good. Later connects open links that
    /// close immediately.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.disconnect_push().await;
    }

    // ── Private helpers ──────────────────────────────────────────────

    async fn open_link(&self, subscription: &Subscription) -> Result<ActivePush, CoreError> {
        let credentials = subscription.credentials()?;
        let cancel = self.cancel.child_token();
        let link = self.connector.open(credentials, cancel.clone()).await?;
        let dispatcher = tokio::spawn(dispatch(
            link.subscribe(),
            Arc::clone(&self.observers),
            cancel.clone(),
        ));
        info!(host = %subscription.host, port = subscription.port, "push link opened");
        Ok(ActivePush {
            link,
            cancel,
            dispatcher,
        })
    }
}

/// Fan messages out to observers until cancelled or the link closes.
async fn dispatch(
    mut messages: broadcast::Receiver<Arc<PushMessage>>,
    observers: Arc<ObserverRegistry>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = messages.recv() => match received {
                Ok(message) => observers.notify(&message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "push dispatcher lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!("push dispatcher exited");
}
