//! Error types for page driver operations

use thiserror::Error;

/// Errors a driver can raise while touching the page.
#[derive(Debug, Error, Clone)]
pub enum DriverError {
    /// Selector matched nothing
    #[error("element not found: {0}")]
    NotFound(String),

    /// Element exists but cannot be driven right now
    #[error("element not interactable: {0}")]
    NotInteractable(String),

    /// Select has no option with the requested value
    #[error("option not found in select: {0}")]
    OptionNotFound(String),

    /// Operation does not apply to this control kind
    #[error("wrong control kind: {0}")]
    WrongKind(String),

    /// File payload could not be decoded
    #[error("bad file payload: {0}")]
    BadPayload(String),

    /// Transport or page bridge failure
    #[error("page i/o error: {0}")]
    PageIo(String),

    /// Internal error (should not happen in normal operation)
    #[error("internal error: {0}")]
    Internal(String),
}

impl DriverError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DriverError::NotFound(_) | DriverError::NotInteractable(_) | DriverError::PageIo(_)
        )
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            DriverError::Internal(_) => 3,
            DriverError::PageIo(_) => 2,
            DriverError::NotFound(_)
            | DriverError::NotInteractable(_)
            | DriverError::OptionNotFound(_) => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_and_severity() {
        assert!(DriverError::NotFound("#x".into()).is_retryable());
        assert!(!DriverError::WrongKind("#x".into()).is_retryable());
        assert_eq!(DriverError::Internal("boom".into()).severity(), 3);
        assert_eq!(DriverError::BadPayload("data:".into()).severity(), 0);
    }
}
