//! Well-known keys and the typed helpers over them.
//!
//! Key names are wire-compatible with the documents earlier builds
//! persisted, so an existing state file resumes cleanly.

use serde_json::Value;

use formpilot_core_types::DomainKey;

use crate::store::{StateStore, StoreError};

/// Campaign record (fields plus citations).
pub const CAMPAIGN_DATA_KEY: &str = "campaignData";
/// Map of image keys to `data:` URLs for upload steps.
pub const BASE64_DATA_KEY: &str = "base64Data";
/// FIFO of commands waiting for connectivity.
pub const OFFLINE_QUEUE_KEY: &str = "offlineCommandQueue";

/// Per-domain resume cursor key: `resumeIndex_{domain}`.
pub fn resume_index_key(domain: &DomainKey) -> String {
    format!("resumeIndex_{domain}")
}

/// Read the resume cursor. Older documents stored the index as a
/// string; both forms parse.
pub async fn load_cursor(
    store: &dyn StateStore,
    domain: &DomainKey,
) -> Result<Option<usize>, StoreError> {
    let value = store.get(&resume_index_key(domain)).await?;
    Ok(value.as_ref().and_then(cursor_from_value))
}

pub async fn save_cursor(
    store: &dyn StateStore,
    domain: &DomainKey,
    index: usize,
) -> Result<(), StoreError> {
    store
        .put(&resume_index_key(domain), Value::from(index as u64))
        .await
}

pub async fn clear_cursor(store: &dyn StateStore, domain: &DomainKey) -> Result<(), StoreError> {
    store.remove(&resume_index_key(domain)).await
}

fn cursor_from_value(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}
