use thiserror::Error;

use formpilot_core_types::PilotError;

#[derive(Debug, Error, Clone)]
pub enum ControlError {
    /// The command router hung up; nothing is listening.
    #[error("control channel closed")]
    ChannelClosed,

    /// The router accepted the command but dropped the reply.
    #[error("reply dropped for {0}")]
    ReplyDropped(String),

    /// Remote backend failure (fetch, status update).
    #[error("backend error: {0}")]
    Backend(String),

    /// Persisted queue could not be read or written.
    #[error("queue storage error: {0}")]
    QueueStorage(String),
}

impl From<formpilot_state_store::StoreError> for ControlError {
    fn from(err: formpilot_state_store::StoreError) -> Self {
        ControlError::QueueStorage(err.to_string())
    }
}

impl From<ControlError> for PilotError {
    fn from(value: ControlError) -> Self {
        PilotError::new(value.to_string())
    }
}
