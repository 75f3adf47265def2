use thiserror::Error;

use formpilot_core_types::PilotError;

#[derive(Clone, Debug, Error)]
pub enum PlaybookErrorKind {
    #[error("playbook not found for {0}")]
    NotFound(String),
    #[error("invalid playbook: {0}")]
    Invalid(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("campaign data missing")]
    NoCampaign,
    #[error("io error: {0}")]
    Io(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Debug, Error)]
#[error(transparent)]
pub struct PlaybookError(pub PlaybookErrorKind);

impl PlaybookError {
    pub fn new(kind: PlaybookErrorKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &PlaybookErrorKind {
        &self.0
    }
}

impl From<PlaybookErrorKind> for PlaybookError {
    fn from(kind: PlaybookErrorKind) -> Self {
        PlaybookError(kind)
    }
}

impl From<std::io::Error> for PlaybookError {
    fn from(err: std::io::Error) -> Self {
        PlaybookError(PlaybookErrorKind::Io(err.to_string()))
    }
}

impl From<serde_json::Error> for PlaybookError {
    fn from(err: serde_json::Error) -> Self {
        PlaybookError(PlaybookErrorKind::Invalid(err.to_string()))
    }
}

impl From<PlaybookError> for PilotError {
    fn from(value: PlaybookError) -> Self {
        PilotError::new(value.to_string())
    }
}
