//! Persisted run state.
//!
//! One [`StateStore`] seam, two backends: [`MemoryStateStore`] for
//! tests and [`FileStateStore`] for real use. [`keys`] holds the
//! well-known key names and the cursor helpers every other crate
//! reaches for.

pub mod keys;
mod store;

pub use keys::{
    clear_cursor, load_cursor, resume_index_key, save_cursor, BASE64_DATA_KEY, CAMPAIGN_DATA_KEY,
    OFFLINE_QUEUE_KEY,
};
pub use store::{FileStateStore, MemoryStateStore, StateStore, StoreError};
