//! Single-slot status channel shared between a workflow and whatever renders it.

use tokio::sync::watch;

use crate::error::TransferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Idle,
    InProgress,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub kind: StatusKind,
    pub message: String,
}

impl Status {
    pub fn idle() -> Self {
        Self {
            kind: StatusKind::Idle,
            message: String::new(),
        }
    }

    pub fn in_progress(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::InProgress,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Failure,
            message: message.into(),
        }
    }

    /// Failure status for `err`. Service messages are shown verbatim; anything
    /// without a user-facing message falls back to `generic`.
    pub fn from_error(err: &TransferError, generic: &str) -> Self {
        let message = match err {
            TransferError::Validation { .. } => err.to_string(),
            TransferError::Service(msg) => msg.clone(),
            _ => generic.to_string(),
        };
        Self::failure(message)
    }

    pub fn is_success(&self) -> bool {
        self.kind == StatusKind::Success
    }

    pub fn is_failure(&self) -> bool {
        self.kind == StatusKind::Failure
    }

    /// Display line with an outcome marker.
    pub fn render(&self) -> String {
        match self.kind {
            StatusKind::Idle => self.message.clone(),
            StatusKind::InProgress => format!("… {}", self.message),
            StatusKind::Success => format!("✓ {}", self.message),
            StatusKind::Failure => format!("✗ {}", self.message),
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::idle()
    }
}

/// Holds only the latest status; every report overwrites the previous one.
#[derive(Debug)]
pub struct StatusReporter {
    tx: watch::Sender<Status>,
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Status::idle());
        Self { tx }
    }

    pub fn report(&self, status: Status) {
        match status.kind {
            StatusKind::Failure => tracing::warn!("{}", status.message),
            StatusKind::Idle => {}
            _ => tracing::info!("{}", status.message),
        }
        self.tx.send_replace(status);
    }

    pub fn current(&self) -> Status {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.tx.subscribe()
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}
