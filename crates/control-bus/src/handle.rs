use tokio::sync::{mpsc, oneshot};

use formpilot_core_types::CommandId;

use crate::command::{CommandReply, EngineCommand};
use crate::errors::ControlError;

/// A command in flight: the payload plus the oneshot its reply goes
/// back on.
pub struct CommandEnvelope {
    pub id: CommandId,
    pub command: EngineCommand,
    pub reply: oneshot::Sender<CommandReply>,
}

/// Cheap-to-clone sender half of the control channel. Every transport
/// (CLI, offline queue, remote poller) funnels through one of these.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<CommandEnvelope>,
}

impl ControlHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CommandEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Deliver a command and wait for its reply.
    pub async fn send(&self, command: EngineCommand) -> Result<CommandReply, ControlError> {
        let name = command.name();
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = CommandEnvelope {
            id: CommandId::new(),
            command,
            reply: reply_tx,
        };
        self.tx
            .send(envelope)
            .await
            .map_err(|_| ControlError::ChannelClosed)?;
        reply_rx
            .await
            .map_err(|_| ControlError::ReplyDropped(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_round_trips_through_a_router() {
        let (handle, mut rx) = ControlHandle::channel(4);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let reply = match envelope.command {
                    EngineCommand::Pause => CommandReply::ok_status("paused"),
                    _ => CommandReply::rejected("Unknown command"),
                };
                let _ = envelope.reply.send(reply);
            }
        });

        let reply = handle.send(EngineCommand::Pause).await.unwrap();
        assert_eq!(reply.status, Some("paused".into()));
        let reply = handle.send(EngineCommand::Unknown).await.unwrap();
        assert!(!reply.success);
    }

    #[tokio::test]
    async fn closed_router_is_an_error() {
        let (handle, rx) = ControlHandle::channel(1);
        drop(rx);
        assert!(matches!(
            handle.send(EngineCommand::Pause).await,
            Err(ControlError::ChannelClosed)
        ));
    }
}
