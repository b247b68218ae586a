//! Failure taxonomy shared by the commands and the refresh loop.
//!
//! Most code propagates `anyhow::Error`; these variants ride inside it so
//! callers can tell systemic failures (no permission, no network) from
//! local ones with `downcast_ref`.

#[derive(thiserror::Error, Debug)]
pub enum CompanionError {
    #[error("Permission to access location was denied")]
    PermissionDenied,

    #[error("Current position is unavailable")]
    PositionUnavailable,

    #[error("No internet connection")]
    NetworkUnavailable,

    #[error("Failed to fetch {what}: {source}")]
    FetchFailed {
        what: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("No candidates to choose from")]
    NoCandidates,

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl CompanionError {
    pub fn fetch_failed(what: impl Into<String>, source: anyhow::Error) -> Self {
        CompanionError::FetchFailed {
            what: what.into(),
            source,
        }
    }

    /// Systemic failures block the command instead of degrading to stale data.
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            CompanionError::PermissionDenied
                | CompanionError::NetworkUnavailable
                | CompanionError::Config(_)
        )
    }
}
