//! Run controller: the latches a running loop observes.
//!
//! Pause is a `watch` latch the loop can await; abort is a
//! `CancellationToken` swapped fresh on every run start. The controller
//! never touches persisted state; command handling decides what happens
//! to the resume cursor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::EngineError;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct RunController {
    running: AtomicBool,
    paused: watch::Sender<bool>,
    abort: Mutex<CancellationToken>,
    aborted: AtomicBool,
}

/// Marks the controller running for as long as the run loop holds it.
pub struct RunningGuard {
    controller: Arc<RunController>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.controller.running.store(false, Ordering::SeqCst);
        debug!("run finished, controller released");
    }
}

impl RunController {
    pub fn new() -> Arc<Self> {
        let (paused, _) = watch::channel(false);
        Arc::new(Self {
            running: AtomicBool::new(false),
            paused,
            abort: Mutex::new(CancellationToken::new()),
            aborted: AtomicBool::new(false),
        })
    }

    /// Claim the single run slot. Resets the pause latch and the abort
    /// token so a new run starts clean.
    pub fn try_begin(self: &Arc<Self>) -> Result<RunningGuard, EngineError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::AlreadyRunning);
        }
        self.aborted.store(false, Ordering::SeqCst);
        self.paused.send_replace(false);
        *self.abort.lock() = CancellationToken::new();
        Ok(RunningGuard {
            controller: Arc::clone(self),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Flag the current run aborted and cancel its token.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.abort.lock().cancel();
    }

    /// Token for the run in progress.
    pub fn cancel_token(&self) -> CancellationToken {
        self.abort.lock().clone()
    }

    /// Block while the pause latch is set; aborting wins over resuming.
    pub async fn wait_while_paused(&self, cancel: &CancellationToken) -> Result<(), EngineError> {
        let mut rx = self.paused.subscribe();
        loop {
            if !*rx.borrow_and_update() {
                return Ok(());
            }
            if cancel.is_cancelled() {
                return Err(EngineError::Aborted);
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Aborted),
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Poll until the current run loop has released the run slot.
    pub async fn wait_until_stopped(&self) {
        while self.is_running() {
            sleep(STOP_POLL_INTERVAL).await;
        }
    }
}
