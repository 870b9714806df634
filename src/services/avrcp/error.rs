use super::{media_id::MediaIdError, types::SourceId};

/// Outcome of a browse service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseStatus {
    /// The operation completed
    Success,
    /// The browse service could not be reached or rejected the request
    ConnectionError,
    /// The requested folder could not be listed
    LookupError,
    /// A played item did not start playing in time
    PlaybackTimeoutError,
}

impl BrowseStatus {
    /// Converts the status into a `Result`, mapping failures to [`TargetError::Browse`].
    ///
    /// # Errors
    /// Returns [`TargetError::Browse`] for every status except `Success`.
    pub fn into_result(self) -> Result<(), TargetError> {
        match self {
            BrowseStatus::Success => Ok(()),
            failure => Err(TargetError::Browse(failure)),
        }
    }
}

/// Errors reported by the media framework collaborators.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameworkError {
    /// The browse service refused or failed the connection
    #[error("Connection to {0} failed")]
    ConnectionFailed(String),

    /// An established browse connection was suspended by the service
    #[error("Connection to {0} was suspended")]
    ConnectionSuspended(String),

    /// A folder subscription returned an error
    #[error("Subscription to {parent_id:?} failed: {reason}")]
    SubscriptionFailed {
        /// Folder that was subscribed to
        parent_id: String,
        /// Reason given by the service
        reason: String,
    },

    /// A transport command was rejected by the session
    #[error("Command rejected: {0}")]
    CommandFailed(String),
}

/// Errors that can occur in the AVRCP target service
#[derive(thiserror::Error, Debug)]
pub enum TargetError {
    /// A media id from the remote device could not be decoded
    #[error("Invalid media id: {0}")]
    InvalidMediaId(#[from] MediaIdError),

    /// The source has no browse service
    #[error("Player {0} is not browsable")]
    NoBrowser(SourceId),

    /// An operation needed an active player but none is set
    #[error("No active player")]
    NoActivePlayer,

    /// Every two digit id is already in use
    #[error("No free player id left for {0}")]
    IdsExhausted(String),

    /// A browse operation finished with a non-success status
    #[error("Browse operation failed: {0:?}")]
    Browse(BrowseStatus),

    /// The media framework reported an error
    #[error("Media framework error: {0}")]
    Framework(#[from] FrameworkError),

    /// The service loop is no longer running
    #[error("AVRCP target service has stopped")]
    ServiceStopped,
}
