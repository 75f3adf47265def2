//! Command routing: apply control commands to a live engine.
//!
//! One router serves one target page. Every transport funnels
//! [`CommandEnvelope`]s into [`CommandRouter::serve`] over an mpsc
//! channel; replies go back on the envelope's oneshot.
//!
//! The abort command clears the persisted cursor. `manualSetResumeIndex`
//! cancels a live run through the controller instead, so the cursor it
//! just saved survives the restart.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use formpilot_control_bus::{CommandEnvelope, CommandReply, EngineCommand};
use formpilot_core_types::DomainKey;
use formpilot_state_store::{clear_cursor, save_cursor, StoreError};

use crate::errors::EngineError;
use crate::runner::RunEngine;

pub struct CommandRouter {
    engine: Arc<RunEngine>,
    target: Url,
    domain: DomainKey,
}

impl CommandRouter {
    pub fn new(engine: Arc<RunEngine>, target: Url) -> Result<Self, EngineError> {
        let host = target
            .host_str()
            .ok_or_else(|| EngineError::InvalidTarget(target.to_string()))?;
        let domain = DomainKey::from_host(host);
        Ok(Self {
            engine,
            target,
            domain,
        })
    }

    /// Serve envelopes until every sender is gone.
    pub async fn serve(self, mut rx: mpsc::Receiver<CommandEnvelope>) {
        while let Some(envelope) = rx.recv().await {
            debug!(id = %envelope.id, command = envelope.command.name(), "command received");
            let reply = self.handle(envelope.command).await;
            if envelope.reply.send(reply).is_err() {
                debug!(id = %envelope.id, "reply receiver dropped");
            }
        }
    }

    pub async fn handle(&self, command: EngineCommand) -> CommandReply {
        match command {
            EngineCommand::Pause => self.pause(),
            EngineCommand::Resume => self.resume(),
            EngineCommand::Abort => self.abort().await,
            EngineCommand::StartFresh => self.start_fresh().await,
            EngineCommand::TriggerAutomation { data } => self.trigger(data.force_start).await,
            EngineCommand::ManualSetResumeIndex { resume_index } => {
                self.set_resume_index(resume_index).await
            }
            EngineCommand::GetStatus => self.status(),
            EngineCommand::Unknown => CommandReply::rejected("Unknown command"),
        }
    }

    fn pause(&self) -> CommandReply {
        let controller = self.engine.controller();
        if !controller.is_running() {
            return CommandReply::rejected("Automation not running");
        }
        controller.pause();
        CommandReply::ok_status("paused")
    }

    fn resume(&self) -> CommandReply {
        let controller = self.engine.controller();
        if controller.is_running() {
            if controller.is_paused() {
                controller.resume();
                return CommandReply::ok_status("resumed");
            }
            return CommandReply::rejected("Automation not paused");
        }
        // Idle: pick the run back up from the stored cursor.
        self.engine.spawn(self.target.clone(), false);
        CommandReply::ok_status("started")
    }

    async fn abort(&self) -> CommandReply {
        self.engine.controller().abort();
        if let Err(e) = self.drop_cursor().await {
            warn!(error = %e, "cursor clear failed during abort");
        }
        CommandReply::ok_status("aborted")
    }

    async fn start_fresh(&self) -> CommandReply {
        let controller = self.engine.controller();
        if controller.is_running() {
            controller.abort();
            controller.wait_until_stopped().await;
        }
        if let Err(e) = self.drop_cursor().await {
            warn!(error = %e, "cursor clear failed during fresh start");
        }
        self.engine.spawn(self.target.clone(), true);
        CommandReply::ok_message("Fresh start initiated")
    }

    async fn trigger(&self, force: bool) -> CommandReply {
        let controller = self.engine.controller();
        if force {
            if controller.is_running() {
                controller.abort();
                controller.wait_until_stopped().await;
            }
            self.engine.spawn(self.target.clone(), true);
        } else if controller.is_running() {
            debug!("trigger ignored, automation already running");
        } else {
            self.engine.spawn(self.target.clone(), true);
        }
        CommandReply::ok_message("Automation trigger received")
    }

    /// Persist the cursor, then restart any live run behind the reply.
    async fn set_resume_index(&self, index: usize) -> CommandReply {
        if let Err(e) = save_cursor(self.engine.store().as_ref(), &self.domain, index).await {
            return CommandReply::rejected(&e.to_string());
        }
        let engine = Arc::clone(&self.engine);
        let target = self.target.clone();
        tokio::spawn(async move {
            let controller = engine.controller();
            if controller.is_running() {
                controller.abort();
                controller.wait_until_stopped().await;
            }
            engine.spawn(target, false);
        });
        CommandReply::ok_resume_index(index)
    }

    fn status(&self) -> CommandReply {
        let controller = self.engine.controller();
        let snapshot = self.engine.reporter().snapshot();
        CommandReply::snapshot(
            serde_json::to_value(&snapshot).unwrap_or_default(),
            controller.is_running(),
            controller.is_paused(),
            controller.is_aborted(),
        )
    }

    async fn drop_cursor(&self) -> Result<(), StoreError> {
        clear_cursor(self.engine.store().as_ref(), &self.domain).await
    }
}
