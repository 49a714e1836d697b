use std::future::Future;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use habit_types::Collection;

use crate::error::DataError;

/// Emitted after every committed write, keyed by the affected owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Data { user_id: Uuid, collection: Collection },
    Profile { user_id: Uuid },
    Pair { user_id: Uuid },
    Invitations { to_email: String },
}

/// Broadcast channel that repositories and the ledger publish to after a
/// commit. Subscriptions re-query when a matching event lands, which is
/// what turns plain CRUD into live snapshots.
#[derive(Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Lossy when nobody listens; a publish never fails.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

/// Live feed of snapshots for one subscription. Dropping the handle is
/// the unsubscribe: the watcher task aborts and its bus receiver is
/// released with it.
pub struct Subscription<T> {
    snapshots: mpsc::UnboundedReceiver<T>,
    errors: mpsc::UnboundedReceiver<DataError>,
    watcher: JoinHandle<()>,
}

#[derive(Debug)]
pub enum SubscriptionEvent<T> {
    Snapshot(T),
    Error(DataError),
}

impl<T> Subscription<T> {
    pub async fn next(&mut self) -> Option<T> {
        self.snapshots.recv().await
    }

    /// Refresh failures ride this side channel; they never terminate the
    /// snapshot stream, which keeps retrying on later changes.
    pub async fn next_error(&mut self) -> Option<DataError> {
        self.errors.recv().await
    }

    /// Merged view for consumers driving both channels from one loop.
    /// Returns `None` once the watcher is gone and drained.
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent<T>> {
        tokio::select! {
            snapshot = self.snapshots.recv() => snapshot.map(SubscriptionEvent::Snapshot),
            err = self.errors.recv() => match err {
                Some(err) => Some(SubscriptionEvent::Error(err)),
                None => self.snapshots.recv().await.map(SubscriptionEvent::Snapshot),
            },
        }
    }

    pub fn try_next(&mut self) -> Option<T> {
        self.snapshots.try_recv().ok()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// Queries once for the initial snapshot, then re-queries after every
/// bus event the filter accepts.
pub(crate) fn spawn_watch<T, M, F, Fut>(
    mut events: broadcast::Receiver<ChangeEvent>,
    matches: M,
    fetch: F,
) -> Subscription<T>
where
    T: Send + 'static,
    M: Fn(&ChangeEvent) -> bool + Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, DataError>> + Send + 'static,
{
    let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
    let (error_tx, error_rx) = mpsc::unbounded_channel();

    let watcher = tokio::spawn(async move {
        loop {
            match fetch().await {
                Ok(snapshot) => {
                    if snapshot_tx.send(snapshot).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!("subscription refresh failed: {}", err);
                    if error_tx.send(err).is_err() {
                        break;
                    }
                }
            }

            // Park until a relevant change lands. Lag only forces an
            // extra refresh, since snapshots are whole-collection.
            loop {
                match events.recv().await {
                    Ok(event) if matches(&event) => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    });

    Subscription {
        snapshots: snapshot_rx,
        errors: error_rx,
        watcher,
    }
}
