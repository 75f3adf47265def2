//! Remote command poller.
//!
//! A backend hands out pending commands; the poller walks them through
//! the `pending -> processing -> completed | error` lifecycle, routing
//! each into the engine and writing the reply back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use formpilot_core_types::CommandId;

use crate::command::{CommandReply, EngineCommand};
use crate::errors::ControlError;
use crate::handle::ControlHandle;

/// A command fetched from the backend.
#[derive(Clone, Debug)]
pub struct RemoteCommand {
    pub id: CommandId,
    pub command: EngineCommand,
}

/// Remote command source with the status lifecycle the poller expects.
#[async_trait]
pub trait CommandBackend: Send + Sync {
    /// Commands still in `pending`, oldest first, at most `limit`.
    async fn pending(&self, limit: usize) -> Result<Vec<RemoteCommand>, ControlError>;
    async fn mark_processing(&self, id: &CommandId) -> Result<(), ControlError>;
    async fn complete(&self, id: &CommandId, reply: &CommandReply) -> Result<(), ControlError>;
    async fn fail(&self, id: &CommandId, error: &str) -> Result<(), ControlError>;
}

pub struct CommandPoller {
    backend: Arc<dyn CommandBackend>,
    handle: ControlHandle,
    interval: Duration,
    batch: usize,
}

impl CommandPoller {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
    pub const DEFAULT_BATCH: usize = 5;

    pub fn new(backend: Arc<dyn CommandBackend>, handle: ControlHandle) -> Self {
        Self {
            backend,
            handle,
            interval: Self::DEFAULT_INTERVAL,
            batch: Self::DEFAULT_BATCH,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }

    /// One poll pass; returns how many commands were handled. Backend
    /// fetch failures are logged and skipped, never fatal.
    pub async fn tick(&self) -> usize {
        let commands = match self.backend.pending(self.batch).await {
            Ok(commands) => commands,
            Err(err) => {
                warn!(error = %err, "command fetch failed");
                return 0;
            }
        };
        let mut handled = 0;
        for remote in commands {
            if let Err(err) = self.backend.mark_processing(&remote.id).await {
                warn!(id = %remote.id, error = %err, "mark processing failed");
                continue;
            }
            debug!(id = %remote.id, command = remote.command.name(), "remote command");
            match self.handle.send(remote.command).await {
                Ok(reply) => {
                    if let Err(err) = self.backend.complete(&remote.id, &reply).await {
                        warn!(id = %remote.id, error = %err, "complete failed");
                    }
                }
                Err(err) => {
                    if let Err(err) = self.backend.fail(&remote.id, &err.to_string()).await {
                        warn!(id = %remote.id, error = %err, "fail update failed");
                    }
                }
            }
            handled += 1;
        }
        handled
    }

    /// Poll until cancelled.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(self.interval) => {
                        self.tick().await;
                    }
                }
            }
            debug!("command poller stopped");
        })
    }
}

/// In-memory backend for tests and local runs.
#[derive(Default)]
pub struct MemoryCommandBackend {
    entries: Mutex<Vec<BackendEntry>>,
}

#[derive(Clone, Debug)]
struct BackendEntry {
    id: CommandId,
    command: EngineCommand,
    status: RemoteStatus,
    reply: Option<CommandReply>,
    error: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl MemoryCommandBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: EngineCommand) -> CommandId {
        let id = CommandId::new();
        self.entries.lock().push(BackendEntry {
            id: id.clone(),
            command,
            status: RemoteStatus::Pending,
            reply: None,
            error: None,
        });
        id
    }

    pub fn status_of(&self, id: &CommandId) -> Option<RemoteStatus> {
        self.entries
            .lock()
            .iter()
            .find(|e| &e.id == id)
            .map(|e| e.status)
    }

    pub fn reply_of(&self, id: &CommandId) -> Option<CommandReply> {
        self.entries
            .lock()
            .iter()
            .find(|e| &e.id == id)
            .and_then(|e| e.reply.clone())
    }

    fn update<F: FnOnce(&mut BackendEntry)>(
        &self,
        id: &CommandId,
        apply: F,
    ) -> Result<(), ControlError> {
        let mut guard = self.entries.lock();
        let entry = guard
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| ControlError::Backend(format!("unknown command {id}")))?;
        apply(entry);
        Ok(())
    }
}

#[async_trait]
impl CommandBackend for MemoryCommandBackend {
    async fn pending(&self, limit: usize) -> Result<Vec<RemoteCommand>, ControlError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| e.status == RemoteStatus::Pending)
            .take(limit)
            .map(|e| RemoteCommand {
                id: e.id.clone(),
                command: e.command.clone(),
            })
            .collect())
    }

    async fn mark_processing(&self, id: &CommandId) -> Result<(), ControlError> {
        self.update(id, |e| e.status = RemoteStatus::Processing)
    }

    async fn complete(&self, id: &CommandId, reply: &CommandReply) -> Result<(), ControlError> {
        self.update(id, |e| {
            e.status = RemoteStatus::Completed;
            e.reply = Some(reply.clone());
        })
    }

    async fn fail(&self, id: &CommandId, error: &str) -> Result<(), ControlError> {
        self.update(id, |e| {
            e.status = RemoteStatus::Error;
            e.error = Some(error.to_string());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_router() -> ControlHandle {
        let (handle, mut rx) = ControlHandle::channel(8);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let _ = envelope.reply.send(CommandReply::ok_status("paused"));
            }
        });
        handle
    }

    #[tokio::test]
    async fn tick_walks_the_status_lifecycle() {
        let backend = Arc::new(MemoryCommandBackend::new());
        let id = backend.push(EngineCommand::Pause);
        let poller = CommandPoller::new(backend.clone(), echo_router());

        let handled = poller.tick().await;
        assert_eq!(handled, 1);
        assert_eq!(backend.status_of(&id), Some(RemoteStatus::Completed));
        assert!(backend.reply_of(&id).unwrap().success);
        // Next tick finds nothing pending.
        assert_eq!(poller.tick().await, 0);
    }

    #[tokio::test]
    async fn router_failure_marks_error() {
        let backend = Arc::new(MemoryCommandBackend::new());
        let id = backend.push(EngineCommand::Pause);
        let (handle, rx) = ControlHandle::channel(1);
        drop(rx);
        let poller = CommandPoller::new(backend.clone(), handle);

        poller.tick().await;
        assert_eq!(backend.status_of(&id), Some(RemoteStatus::Error));
    }

    #[tokio::test]
    async fn batch_limit_caps_each_pass() {
        let backend = Arc::new(MemoryCommandBackend::new());
        for _ in 0..7 {
            backend.push(EngineCommand::GetStatus);
        }
        let poller = CommandPoller::new(backend.clone(), echo_router()).with_batch(5);
        assert_eq!(poller.tick().await, 5);
        assert_eq!(poller.tick().await, 2);
    }

    #[tokio::test]
    async fn spawned_poller_stops_on_cancel() {
        let backend = Arc::new(MemoryCommandBackend::new());
        let poller = CommandPoller::new(backend, echo_router())
            .with_interval(Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let task = poller.spawn(cancel.clone());
        cancel.cancel();
        task.await.unwrap();
    }
}
