//! Resumable step execution: the run loop, DOM waiter, action
//! dispatch, pause/abort control, and status reporting.
//!
//! A [`RunEngine`] walks the playbook resolved for a target URL against
//! a [`formpilot_page_driver::PageDriver`], persisting a per-domain
//! resume cursor so an interrupted run picks up where it left off. A
//! [`CommandRouter`] applies wire commands (pause, resume, abort, fresh
//! start, manual cursor moves) to the live engine, and a
//! [`StatusReporter`] folds run events into the snapshot those commands
//! report back.

pub mod controller;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod report;
pub mod reporter;
pub mod router;
pub mod runner;
pub mod waiter;

pub use controller::{RunController, RunningGuard};
pub use dispatch::{dispatch_step, Handled, StepCtx};
pub use errors::EngineError;
pub use events::{PauseReason, RunEvent};
pub use report::{RunPhase, RunReport, StepOutcome, StepStatus};
pub use reporter::{StatusReporter, StatusSnapshot};
pub use router::CommandRouter;
pub use runner::{RunEngine, DEFAULT_STEP_GAP};
pub use waiter::{DomWaiter, WaitVerdict, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
