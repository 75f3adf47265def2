//! Offline command queue.
//!
//! Commands that cannot reach the router are parked here, persisted
//! under `offlineCommandQueue`, and replayed in order once a route is
//! back. A failed delivery rotates to the tail; three failures drop
//! the entry.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use formpilot_core_types::CommandId;
use formpilot_state_store::{StateStore, OFFLINE_QUEUE_KEY};

use crate::command::EngineCommand;
use crate::errors::ControlError;
use crate::handle::ControlHandle;

/// One parked command, in the persisted wire shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub id: CommandId,
    pub command: EngineCommand,
    /// Enqueue time, epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "queued_status")]
    pub status: String,
    #[serde(default, rename = "lastError", skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

fn queued_status() -> String {
    "queued".to_string()
}

/// What a drain pass accomplished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub delivered: usize,
    pub dropped: usize,
    pub pending: usize,
}

pub struct OfflineQueue {
    store: Arc<dyn StateStore>,
    handle: ControlHandle,
    entries: Mutex<VecDeque<QueuedCommand>>,
    draining: AtomicBool,
    online: AtomicBool,
    max_retries: u32,
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl OfflineQueue {
    pub const MAX_RETRIES: u32 = 3;

    /// Open the queue, restoring any entries a previous session parked.
    pub async fn load(
        store: Arc<dyn StateStore>,
        handle: ControlHandle,
    ) -> Result<Self, ControlError> {
        let entries: VecDeque<QueuedCommand> = match store.get(OFFLINE_QUEUE_KEY).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ControlError::QueueStorage(e.to_string()))?,
            None => VecDeque::new(),
        };
        if !entries.is_empty() {
            debug!(pending = entries.len(), "offline queue restored");
        }
        Ok(Self {
            store,
            handle,
            entries: Mutex::new(entries),
            draining: AtomicBool::new(false),
            online: AtomicBool::new(false),
            max_retries: Self::MAX_RETRIES,
        })
    }

    pub async fn enqueue(&self, command: EngineCommand) -> Result<CommandId, ControlError> {
        let entry = QueuedCommand {
            id: CommandId::new(),
            command,
            timestamp: Utc::now().timestamp_millis(),
            retries: 0,
            status: queued_status(),
            last_error: None,
        };
        let id = entry.id.clone();
        self.entries.lock().push_back(entry);
        self.persist().await?;
        debug!(id = %id, "command queued");
        if self.online.load(Ordering::SeqCst) {
            self.drain().await?;
        }
        Ok(id)
    }

    /// Replay everything. Reentrant calls are no-ops while a drain is
    /// in flight.
    pub async fn drain(&self) -> Result<DrainSummary, ControlError> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(self.summary(0, 0));
        }
        let _guard = DrainGuard(&self.draining);

        let mut delivered = 0;
        let mut dropped = 0;
        loop {
            let head = self.entries.lock().front().cloned();
            let Some(entry) = head else { break };

            match self.handle.send(entry.command.clone()).await {
                Ok(_) => {
                    self.entries.lock().pop_front();
                    delivered += 1;
                    debug!(id = %entry.id, "queued command delivered");
                }
                Err(err) => {
                    let mut guard = self.entries.lock();
                    if let Some(mut failed) = guard.pop_front() {
                        failed.retries += 1;
                        failed.last_error = Some(err.to_string());
                        if failed.retries >= self.max_retries {
                            warn!(id = %failed.id, "queued command dropped after max retries");
                            dropped += 1;
                        } else {
                            guard.push_back(failed);
                        }
                    }
                }
            }
        }
        self.persist().await?;
        Ok(self.summary(delivered, dropped))
    }

    /// Connectivity edge: transitioning offline to online drains.
    pub async fn set_online(&self, online: bool) -> Result<DrainSummary, ControlError> {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if online && !was_online {
            return self.drain().await;
        }
        Ok(self.summary(0, 0))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<QueuedCommand> {
        self.entries.lock().iter().cloned().collect()
    }

    pub async fn clear(&self) -> Result<(), ControlError> {
        self.entries.lock().clear();
        self.persist().await
    }

    fn summary(&self, delivered: usize, dropped: usize) -> DrainSummary {
        DrainSummary {
            delivered,
            dropped,
            pending: self.len(),
        }
    }

    async fn persist(&self) -> Result<(), ControlError> {
        let snapshot = self.snapshot();
        let value =
            serde_json::to_value(&snapshot).map_err(|e| ControlError::QueueStorage(e.to_string()))?;
        self.store.put(OFFLINE_QUEUE_KEY, value).await?;
        Ok(())
    }
}
