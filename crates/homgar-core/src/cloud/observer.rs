// ── Push observers ──
//
// Explicit observer registration for decoded push messages. Observers
// run synchronously in registration order; an error or panic in one is
// logged and never stops delivery to the rest.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use homgar_api::PushMessage;
use tracing::warn;

/// Error an observer may report for one message.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Receives every decoded push message.
///
/// Called on the push delivery task; implementations should hand work
/// off rather than block.
pub trait PushObserver: Send + Sync {
    fn on_message(&self, message: &Arc<PushMessage>) -> Result<(), ObserverError>;
}

impl<F> PushObserver for F
where
    F: Fn(&Arc<PushMessage>) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_message(&self, message: &Arc<PushMessage>) -> Result<(), ObserverError> {
        self(message)
    }
}

/// Ordered observer list, de-duplicated by identity.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    observers: RwLock<Vec<Arc<dyn PushObserver>>>,
}

impl ObserverRegistry {
    /// Register `observer`. Returns `false` if this exact instance is
    /// already registered.
    pub(crate) fn register(&self, observer: Arc<dyn PushObserver>) -> bool {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver one message to every observer in order.
    pub(crate) fn notify(&self, message: &Arc<PushMessage>) {
        // Snapshot so observers may register others without deadlocking.
        let observers: Vec<Arc<dyn PushObserver>> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (index, observer) in observers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| observer.on_message(message))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(observer = index, seq = message.seq, error = %e, "push observer failed"),
                Err(_) => warn!(observer = index, seq = message.seq, "push observer panicked"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{Map, Value};

    use super::*;

    fn message() -> Arc<PushMessage> {
        Arc::new(PushMessage::from_payload("t", 1, Map::<String, Value>::new()))
    }

    #[test]
    fn register_dedups_by_identity() {
        let registry = ObserverRegistry::default();
        let observer: Arc<dyn PushObserver> =
            Arc::new(|_: &Arc<PushMessage>| -> Result<(), ObserverError> { Ok(()) });

        assert!(registry.register(Arc::clone(&observer)));
        assert!(!registry.register(Arc::clone(&observer)));
        assert_eq!(registry.len(), 1);

        let other: Arc<dyn PushObserver> =
            Arc::new(|_: &Arc<PushMessage>| -> Result<(), ObserverError> { Ok(()) });
        assert!(registry.register(other));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn failing_observers_do_not_block_the_rest() {
        let registry = ObserverRegistry::default();
        let order = Arc::new(Mutex::new(Vec::new()));

        registry.register(Arc::new(|_: &Arc<PushMessage>| -> Result<(), ObserverError> {
            Err("boom".into())
        }));
        registry.register(Arc::new(|_: &Arc<PushMessage>| -> Result<(), ObserverError> {
            panic!("observer bug")
        }));
        let seen = Arc::clone(&order);
        registry.register(Arc::new(move |m: &Arc<PushMessage>| -> Result<(), ObserverError> {
            seen.lock().unwrap_or_else(PoisonError::into_inner).push(m.seq);
            Ok(())
        }));

        registry.notify(&message());
        registry.notify(&message());
        assert_eq!(
            *order.lock().unwrap_or_else(PoisonError::into_inner),
            vec![1, 1]
        );
    }

    #[test]
    fn observers_run_in_registration_order() {
        let registry = ObserverRegistry::default();
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let counter = Arc::clone(&counter);
            let order = Arc::clone(&order);
            registry.register(Arc::new(move |_: &Arc<PushMessage>| -> Result<(), ObserverError> {
                counter.fetch_add(1, Ordering::SeqCst);
                order.lock().unwrap_or_else(PoisonError::into_inner).push(id);
                Ok(())
            }));
        }

        registry.notify(&message());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(
            *order.lock().unwrap_or_else(PoisonError::into_inner),
            vec![0, 1, 2]
        );
    }
}
