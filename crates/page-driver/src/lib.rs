//! Page interaction seam.
//!
//! The run engine never touches a DOM directly; it speaks [`PageDriver`].
//! Production adapters bridge to a real page, while [`SimPage`] runs the
//! same operations against an in-memory element table for tests and dry
//! runs.

mod driver;
mod errors;
pub mod sim;
mod types;

pub use driver::PageDriver;
pub use errors::DriverError;
pub use sim::{SimElement, SimPage};
pub use types::{ControlKind, FilePayload, LabeledControl, OptionItem};
