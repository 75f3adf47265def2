use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};

/// Trait implemented by payload types that can be carried on the bus.
pub trait BusEvent: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> BusEvent for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

/// Broadcast bus with a retained latest event, so a subscriber that
/// arrives mid-run can read where things stand before streaming.
/// Publishing with no subscribers is fine; the event is only retained.
pub struct StatusBus<E>
where
    E: BusEvent,
{
    sender: broadcast::Sender<E>,
    latest: RwLock<Option<E>>,
}

impl<E> StatusBus<E>
where
    E: BusEvent,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            sender,
            latest: RwLock::new(None),
        })
    }

    pub fn publish(&self, event: E) {
        *self.latest.write() = Some(event.clone());
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn latest(&self) -> Option<E> {
        self.latest.read().clone()
    }
}

/// Materialise an mpsc receiver from a bus subscription so callers can
/// await events without handling broadcast lag semantics directly.
pub fn to_mpsc<E>(bus: Arc<StatusBus<E>>, capacity: usize) -> mpsc::Receiver<E>
where
    E: BusEvent,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    if tx.send(ev).await.is_err() {
                        break;
                    }
                }
                // A lagged subscriber loses events, not the stream.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    out_rx
}
