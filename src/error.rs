use thiserror::Error;

/// Failure reading or writing a persisted record
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a sent turn failed. Neither variant mutates history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    /// The endpoint answered with an explicit error object; the message is kept verbatim
    #[error("{0}")]
    Declared(String),

    /// No response, or a response of unexpected shape
    #[error("Connection error.")]
    Connectivity,
}

impl TurnError {
    /// Text shown to the user
    pub fn user_message(&self) -> String {
        match self {
            TurnError::Declared(message) => format!("API error: {}", message),
            TurnError::Connectivity => "Connection error.".to_string(),
        }
    }
}

/// Why a submission was not turned into a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("message is empty")]
    Empty,

    #[error("a turn is already in flight")]
    Busy,
}
