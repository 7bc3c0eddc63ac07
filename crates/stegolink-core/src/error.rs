use thiserror::Error;

/// Leading text of every local validation failure; the missing fields follow it.
pub const MISSING_INPUT: &str = "missing required input";

/// Failure taxonomy for one workflow operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Required inputs were absent; detected before any network traffic.
    #[error("{}: {}", MISSING_INPUT, .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    /// The service answered with a structured error message.
    #[error("{0}")]
    Service(String),

    /// The request could not be completed or the response was unusable.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    /// The download sink refused to save a produced file.
    #[error("could not save {filename}: {reason}")]
    Persistence { filename: String, reason: String },
}

impl TransferError {
    /// Decode and persistence failures carry no message meant for the user.
    pub fn is_transport_class(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Decode(_) | Self::Persistence { .. }
        )
    }
}

impl From<base64::DecodeError> for TransferError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport("request timed out".into())
        } else if err.is_connect() {
            Self::Transport("service unreachable".into())
        } else if let Some(status) = err.status() {
            Self::Transport(format!("HTTP {}", status.as_u16()))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
