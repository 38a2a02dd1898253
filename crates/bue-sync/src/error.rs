use thiserror::Error;

/// Failure of a single call into the hosted backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unreachable: {0}")]
    Transport(String),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Undecodable backend response: {0}")]
    Decode(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// A remote read that could not produce events. The sync path recovers from
/// this by leaving the cache as it is.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Malformed record at '{path}': {reason}")]
    Malformed { path: String, reason: String },

    #[error("Invalid record key '{0}'")]
    InvalidKey(String),
}

/// Why a saved-relation add/remove did not fully apply. Callers only ever
/// see this as `false`; the detail goes to the log.
#[derive(Error, Debug)]
pub enum RelationWriteError {
    #[error("No network connectivity")]
    Offline,

    #[error("No signed-in user")]
    SignedOut,

    #[error("Invalid record key '{0}'")]
    InvalidKey(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Malformed list at '{path}': {reason}")]
    Malformed { path: String, reason: String },
}

/// Why a profile write was not sent or not accepted.
#[derive(Error, Debug)]
pub enum ProfileWriteError {
    #[error("No network connectivity")]
    Offline,

    #[error("No signed-in user")]
    SignedOut,

    #[error("Invalid record key '{0}'")]
    InvalidKey(String),

    #[error("Field '{0}' is managed by the saved-event relation")]
    ReservedField(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
