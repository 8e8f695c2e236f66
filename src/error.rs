use std::error::Error as StdError;
use std::fmt;

use crate::work_queue::QueueStatus;

/// Errors raised while synchronizing recordings into the case system
#[derive(Debug)]
pub enum SyncError {
    /// Configuration file missing, unreadable or invalid
    Config(String),
    /// Credential profile could not be resolved
    Credential(String),
    /// Session with the call or case system could not be established
    Session(String),
    /// Network failure or non-success response while talking to a remote system
    Transfer(String),
    /// A remote record lacked required fields or could not be parsed
    MalformedRecord(String),
    /// Work queue storage failure
    Store(String),
    /// Attempt to move a queue entry backwards in its lifecycle
    InvalidTransition {
        entry_id: i64,
        from: QueueStatus,
        to: QueueStatus,
    },
    /// Another run holds the work queue lock
    Locked(String),
    /// The per-run failure budget was exhausted
    TooManyFailures { failed: u32, limit: u32 },
    /// General I/O error
    Io(std::io::Error),
}

impl SyncError {
    /// Setup errors abort the run before any item is processed
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SyncError::Transfer(_) | SyncError::MalformedRecord(_)
        )
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SyncError::Credential(msg) => write!(f, "Credential error: {}", msg),
            SyncError::Session(msg) => write!(f, "Session error: {}", msg),
            SyncError::Transfer(msg) => write!(f, "Transfer error: {}", msg),
            SyncError::MalformedRecord(msg) => write!(f, "Malformed record: {}", msg),
            SyncError::Store(msg) => write!(f, "Work queue error: {}", msg),
            SyncError::InvalidTransition { entry_id, from, to } => write!(
                f,
                "Invalid status transition for entry {}: {} -> {}",
                entry_id, from, to
            ),
            SyncError::Locked(msg) => write!(f, "Lock error: {}", msg),
            SyncError::TooManyFailures { failed, limit } => write!(
                f,
                "Too many failed recordings in this run: {} (limit {})",
                failed, limit
            ),
            SyncError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl StdError for SyncError {}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transfer(err.to_string())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Store(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::MalformedRecord(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_and_data_errors_are_not_fatal() {
        assert!(!SyncError::Transfer("timeout".into()).is_fatal());
        assert!(!SyncError::MalformedRecord("no id".into()).is_fatal());
        assert!(SyncError::Credential("missing".into()).is_fatal());
        assert!(SyncError::Session("401".into()).is_fatal());
    }

    #[test]
    fn test_display_invalid_transition() {
        let err = SyncError::InvalidTransition {
            entry_id: 7,
            from: QueueStatus::Done,
            to: QueueStatus::InProgress,
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition for entry 7: DONE -> IN_PROGRESS"
        );
    }
}
