//! Error types for transport and command execution.
//!
//! Every command submitted to the [`CommandManager`](crate::manager::CommandManager)
//! resolves to either a response frame or one of these errors. Frame-level
//! problems from the protocol crate are wrapped in [`ControlError::Protocol`].

use lockctl_protocol::{CommandCode, ResponseStatus};
use std::time::Duration;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur while talking to a lock control board.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// No matching response arrived before the command's deadline.
    #[error("{command} timed out after {timeout_ms}ms")]
    Timeout {
        command: CommandCode,
        timeout_ms: u64,
    },

    /// The board answered with a non-success status byte.
    #[error("{command} failed: board reported {status}")]
    CommandFailed {
        command: CommandCode,
        status: ResponseStatus,
    },

    /// Write or connection failure on the underlying link.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The transport is not connected.
    #[error("Transport disconnected: {transport}")]
    Disconnected { transport: String },

    /// The command manager was shut down before the command completed.
    #[error("Command manager closed")]
    ManagerClosed,

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid frame, channel or response content.
    #[error(transparent)]
    Protocol(#[from] lockctl_core::Error),
}

impl ControlError {
    /// Create a timeout error for `command`.
    pub fn timeout(command: CommandCode, timeout: Duration) -> Self {
        Self::Timeout {
            command,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn command_failed(command: CommandCode, status: ResponseStatus) -> Self {
        Self::CommandFailed { command, status }
    }

    /// Create a new transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new disconnected error.
    pub fn disconnected(transport: impl Into<String>) -> Self {
        Self::Disconnected {
            transport: transport.into(),
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error() {
        let error = ControlError::timeout(CommandCode::OpenSingle, Duration::from_millis(700));
        assert!(error.is_timeout());
        assert_eq!(error.to_string(), "0x82 (open single lock) timed out after 700ms");
    }

    #[test]
    fn test_command_failed_error() {
        let error = ControlError::command_failed(CommandCode::QueryAll, ResponseStatus::Failure);
        assert!(matches!(error, ControlError::CommandFailed { .. }));
        assert!(!error.is_timeout());
    }

    #[test]
    fn test_transport_error() {
        let error = ControlError::transport("port closed");
        assert_eq!(error.to_string(), "Transport error: port closed");
    }

    #[test]
    fn test_protocol_error_is_transparent() {
        let error: ControlError = lockctl_core::Error::InvalidCommandCode(0x42).into();
        assert_eq!(error.to_string(), "Invalid command code: 0x42");
    }

    #[test]
    fn test_error_display() {
        let errors = vec![
            ControlError::ManagerClosed,
            ControlError::disconnected("mock"),
            ControlError::transport("write failed"),
        ];

        for error in errors {
            let _ = format!("{}", error);
            let _ = format!("{:?}", error);
        }
    }
}
