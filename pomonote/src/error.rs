use std::path::PathBuf;
use thiserror::Error;

/// Failures of the note-backed stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("front matter error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("malformed note {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("note not found: {0}")]
    NotFound(String),

    #[error("vault index is not loaded yet")]
    IndexNotReady,

    #[error("invalid note handle `{0}`")]
    InvalidHandle(String),

    #[error("store rejected the write: {0}")]
    Rejected(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures surfaced by the timer state machine.
#[derive(Error, Debug)]
pub enum TimerError {
    /// A transition was requested from the wrong phase. Nothing was changed.
    #[error("{0}")]
    InvalidState(&'static str),

    #[error("session store: {0}")]
    Persistence(#[from] StoreError),

    #[error("energy level {0} is out of range 0-5")]
    InvalidEnergy(u8),
}

impl TimerError {
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, TimerError::InvalidState(_))
    }
}
