//! Command and status plumbing.
//!
//! Everything that carries intent into the engine or state out of it:
//! wire commands and replies, the mpsc/oneshot control channel, a
//! broadcast status bus with a retained latest event, the persisted
//! offline queue, and the remote command poller.

mod bus;
mod command;
mod errors;
mod handle;
mod poller;
mod queue;

pub use bus::{to_mpsc, BusEvent, StatusBus};
pub use command::{CommandReply, EngineCommand, TriggerData};
pub use errors::ControlError;
pub use handle::{CommandEnvelope, ControlHandle};
pub use poller::{
    CommandBackend, CommandPoller, MemoryCommandBackend, RemoteCommand, RemoteStatus,
};
pub use queue::{DrainSummary, OfflineQueue, QueuedCommand};
