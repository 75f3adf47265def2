//! Playbooks: declarative form-fill step lists and how they are sourced.
//!
//! A playbook is a JSON array of steps keyed to a page by file name
//! (`{host}.json` or `{host}{path}.json`). Steps reference campaign fields
//! by logical name; the shaping rules in [`shape`] turn those fields into
//! the values that land on the page.

mod campaign;
mod errors;
mod model;
pub mod shape;
mod source;
mod store;

pub use campaign::{image_key_variants, CampaignData, Citation};
pub use errors::{PlaybookError, PlaybookErrorKind};
pub use model::{
    ActionKind, AddressMode, FillMode, IssueSeverity, Playbook, Step, ValidationIssue,
    NAV_SAVE_KEY, RICH_EDITOR_SELECTOR, SKIP_CATEGORY_LABEL, SKIP_CATEGORY_VALUE,
};
pub use source::{candidate_names, normalize_path, DirSource, PlaybookSource};
pub use store::PlaybookStore;
