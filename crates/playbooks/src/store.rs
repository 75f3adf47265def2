use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use url::Url;

use crate::errors::{PlaybookError, PlaybookErrorKind};
use crate::model::Playbook;
use crate::source::{candidate_names, PlaybookSource};

/// Resolves page URLs to playbooks through a [`PlaybookSource`], caching
/// by file name so repeated pages of one site fetch once.
pub struct PlaybookStore {
    source: Arc<dyn PlaybookSource>,
    cache: RwLock<HashMap<String, Arc<Playbook>>>,
}

impl PlaybookStore {
    pub fn new(source: Arc<dyn PlaybookSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// First candidate name with a playbook wins; the general
    /// `{host}.json` shadows path-specific files.
    pub async fn resolve(&self, target: &Url) -> Result<Arc<Playbook>, PlaybookError> {
        let names = candidate_names(target)?;
        for name in &names {
            if let Some(hit) = self.cache.read().get(name).cloned() {
                return Ok(hit);
            }
        }
        for name in &names {
            if let Some(playbook) = self.source.fetch(name).await? {
                debug!(file = %name, steps = playbook.len(), "playbook resolved");
                let playbook = Arc::new(playbook);
                self.cache.write().insert(name.clone(), playbook.clone());
                return Ok(playbook);
            }
        }
        Err(PlaybookErrorKind::NotFound(target.to_string()).into())
    }

    /// Seed or replace a cached playbook under its own name.
    pub fn insert(&self, playbook: Playbook) {
        let mut guard = self.cache.write();
        guard.insert(playbook.name.clone(), Arc::new(playbook));
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }
}
