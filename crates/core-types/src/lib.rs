use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the engine crates.
#[derive(Debug, Error, Clone)]
pub enum PilotError {
    #[error("{message}")]
    Message { message: String },
}

impl PilotError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TabId(pub String);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CommandId(pub String);

impl CommandId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalized host used to key persisted state and playbook file names.
///
/// Normalization lowercases the host and strips a single leading `www.`,
/// so `www.Example.com` and `example.com` share one key.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DomainKey(pub String);

impl DomainKey {
    pub fn from_host(host: &str) -> Self {
        let lowered = host.trim().to_ascii_lowercase();
        let stripped = lowered.strip_prefix("www.").unwrap_or(&lowered);
        Self(stripped.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies where a run executes: which tab, on which domain.
///
/// `mutex_key` names the serialization point for runs sharing one resume
/// cursor. Two tabs on the same domain map to the same key.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunRoute {
    pub tab: TabId,
    pub domain: DomainKey,
    pub mutex_key: String,
}

impl RunRoute {
    pub fn new(tab: TabId, domain: DomainKey) -> Self {
        let mutex_key = format!("domain:{}", domain.0);
        Self {
            tab,
            domain,
            mutex_key,
        }
    }
}

impl fmt::Display for RunRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tab={} domain={} mutex={}",
            self.tab.0, self.domain.0, self.mutex_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_key_strips_www_and_lowercases() {
        assert_eq!(DomainKey::from_host("www.Example.com").as_str(), "example.com");
        assert_eq!(DomainKey::from_host("EXAMPLE.com").as_str(), "example.com");
        assert_eq!(DomainKey::from_host("sub.www.site.org").as_str(), "sub.www.site.org");
    }

    #[test]
    fn domain_key_strips_single_www_prefix_only() {
        assert_eq!(DomainKey::from_host("www.www.odd.net").as_str(), "www.odd.net");
    }

    #[test]
    fn run_route_mutex_key_is_domain_scoped() {
        let a = RunRoute::new(TabId::new(), DomainKey::from_host("www.listings.com"));
        let b = RunRoute::new(TabId::new(), DomainKey::from_host("listings.com"));
        assert_eq!(a.mutex_key, "domain:listings.com");
        assert_eq!(a.mutex_key, b.mutex_key);
        assert_ne!(a.tab, b.tab);
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
