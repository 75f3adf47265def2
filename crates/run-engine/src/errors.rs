//! Error types for the run engine

use thiserror::Error;

use formpilot_control_bus::ControlError;
use formpilot_page_driver::DriverError;
use formpilot_playbooks::PlaybookError;
use formpilot_state_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A run is active; the re-entrancy guard rejected the start
    #[error("automation already running")]
    AlreadyRunning,

    /// The run was cancelled
    #[error("run aborted")]
    Aborted,

    /// The target URL cannot key a run (no host)
    #[error("invalid run target: {0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Playbook(#[from] PlaybookError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether the error ends the whole run rather than one step.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Aborted | EngineError::Store(_) | EngineError::AlreadyRunning
        )
    }
}
