//! Error taxonomy for console workflows.

use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = ConsoleError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// A form or field constraint was violated; no network call was made
    #[error("{0}")]
    Validation(String),

    /// The remote service answered with a failure status or an unusable body
    #[error("{message}")]
    Remote {
        message: String,
        status: Option<u16>,
        body: Option<serde_json::Value>,
    },

    /// The client-side deadline expired before the remote service answered
    #[error("Request timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },

    /// The creation endpoint succeeded but did not assign an event id
    #[error("No event_id returned from createEvent")]
    MissingEventId,

    #[error("{0}")]
    NoDrafts(String),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("{0}")]
    Auth(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ConsoleError {
    pub fn remote(message: impl Into<String>) -> Self {
        ConsoleError::Remote {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// True for every failure that came from talking to a remote service
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ConsoleError::Remote { .. } | ConsoleError::Timeout { .. } | ConsoleError::MissingEventId
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ConsoleError::Remote { status, .. } => *status,
            _ => None,
        }
    }
}
