// ── Reactive table stream ──
//
// Subscription handle for consuming device-table changes.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::DeviceTable;

/// A subscription to the device table.
///
/// Provides point-in-time snapshot access and change notification via
/// [`changed`](Self::changed) or by converting to a `Stream`.
pub struct DeviceTableStream {
    current: DeviceTable,
    receiver: watch::Receiver<DeviceTable>,
}

impl DeviceTableStream {
    pub(crate) fn new(receiver: watch::Receiver<DeviceTable>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation (or at the last `changed`).
    pub fn current(&self) -> &DeviceTable {
        &self.current
    }

    /// The latest snapshot, which may be newer than `current`.
    pub fn latest(&self) -> DeviceTable {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<DeviceTable> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> DeviceTableWatchStream {
        DeviceTableWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a snapshot per table change.
pub struct DeviceTableWatchStream {
    inner: WatchStream<DeviceTable>,
}

impl Stream for DeviceTableWatchStream {
    type Item = DeviceTable;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
