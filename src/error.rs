//! Errors surfaced to settings consumers

use thiserror::Error;

use crate::settings::{PatchError, SocialPlatform};

#[derive(Debug, Error)]
pub enum SyncError {
    /// Another save is still in flight; retry once it resolves
    #[error("save in progress")]
    SaveInProgress,

    /// The patch breaks a write-boundary rule
    #[error("invalid settings: {0}")]
    InvalidPatch(#[from] PatchError),

    #[error("social link url must not be empty")]
    EmptyUrl,

    #[error("{} is already added", .0.display_name())]
    PlatformAlreadyAdded(SocialPlatform),

    #[error("no social link with id '{0}'")]
    UnknownLink(String),

    /// Neither the remote store nor the local fallback took the change
    #[error("failed to save settings: {remote}")]
    Persist {
        remote: String,
        #[source]
        local: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl SyncError {
    /// The distinguishable "busy" signal callers may retry on
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncError::SaveInProgress)
    }
}
