//! Command code definitions for the lock control board protocol.
//!
//! Each frame carries a one-byte command code at offset 6. Responses echo the
//! code of the command they answer, which together with the board address is
//! the only way to correlate a response with its request.
//!
//! # Command Table
//!
//! | Code   | Variant              | Request payload          | Response payload                       |
//! |--------|----------------------|--------------------------|----------------------------------------|
//! | `0x80` | `OpenSimultaneous`   | `count, id × count`      | `status`                               |
//! | `0x81` | `FlashChannel`       | `channel`                | `status, channel`                      |
//! | `0x82` | `OpenSingle`         | `channel`                | `status, channel, lock_status`         |
//! | `0x83` | `QuerySingle`        | `channel`                | `status, channel, lock_status`         |
//! | `0x84` | `QueryAll`           | none                     | `status, count, lock_status × count`   |
//! | `0x85` | `StatusUpload`       | inbound only             | `channel, lock_status`                 |
//! | `0x86` | `OpenAll`            | none                     | `status`                               |
//! | `0x87` | `OpenSequential`     | `count, id × count`      | `status`                               |
//! | `0x88` | `KeepOpen`           | `channel`                | `status, channel`                      |
//! | `0x89` | `CloseChannel`       | `channel`                | `status, channel`                      |
//!
//! # Examples
//!
//! ```
//! use lockctl_protocol::CommandCode;
//!
//! let cmd = CommandCode::try_from(0x82).unwrap();
//! assert_eq!(cmd, CommandCode::OpenSingle);
//! assert_eq!(cmd.as_u8(), 0x82);
//!
//! assert!(CommandCode::try_from(0x8A).is_err());
//! ```

use lockctl_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Command codes understood by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCode {
    OpenSimultaneous, // 0x80
    FlashChannel,     // 0x81
    OpenSingle,       // 0x82
    QuerySingle,      // 0x83
    QueryAll,         // 0x84
    StatusUpload,     // 0x85
    OpenAll,          // 0x86
    OpenSequential,   // 0x87
    KeepOpen,         // 0x88
    CloseChannel,     // 0x89
}

impl CommandCode {
    pub const ALL: [CommandCode; 10] = [
        CommandCode::OpenSimultaneous,
        CommandCode::FlashChannel,
        CommandCode::OpenSingle,
        CommandCode::QuerySingle,
        CommandCode::QueryAll,
        CommandCode::StatusUpload,
        CommandCode::OpenAll,
        CommandCode::OpenSequential,
        CommandCode::KeepOpen,
        CommandCode::CloseChannel,
    ];

    pub fn as_u8(&self) -> u8 {
        match self {
            CommandCode::OpenSimultaneous => 0x80,
            CommandCode::FlashChannel => 0x81,
            CommandCode::OpenSingle => 0x82,
            CommandCode::QuerySingle => 0x83,
            CommandCode::QueryAll => 0x84,
            CommandCode::StatusUpload => 0x85,
            CommandCode::OpenAll => 0x86,
            CommandCode::OpenSequential => 0x87,
            CommandCode::KeepOpen => 0x88,
            CommandCode::CloseChannel => 0x89,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CommandCode::OpenSimultaneous => "open locks simultaneously",
            CommandCode::FlashChannel => "flash channel",
            CommandCode::OpenSingle => "open single lock",
            CommandCode::QuerySingle => "query single lock status",
            CommandCode::QueryAll => "query all lock status",
            CommandCode::StatusUpload => "status upload",
            CommandCode::OpenAll => "open all locks",
            CommandCode::OpenSequential => "open locks sequentially",
            CommandCode::KeepOpen => "keep channel open",
            CommandCode::CloseChannel => "close channel",
        }
    }

    /// Codes the board only ever sends unprompted. They are never written
    /// to the link.
    pub fn is_inbound_only(&self) -> bool {
        matches!(self, CommandCode::StatusUpload)
    }

    /// Codes whose first payload byte is a lock count.
    pub fn carries_count(&self) -> bool {
        matches!(
            self,
            CommandCode::OpenSimultaneous | CommandCode::OpenSequential | CommandCode::OpenAll
        )
    }

    /// Codes whose response payload includes the channel number at byte 1.
    pub fn response_has_channel(&self) -> bool {
        matches!(
            self,
            CommandCode::FlashChannel
                | CommandCode::OpenSingle
                | CommandCode::QuerySingle
                | CommandCode::KeepOpen
                | CommandCode::CloseChannel
        )
    }

    /// Codes whose response payload includes a lock status at byte 2.
    pub fn response_has_lock_status(&self) -> bool {
        matches!(self, CommandCode::OpenSingle | CommandCode::QuerySingle)
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x80 => Ok(CommandCode::OpenSimultaneous),
            0x81 => Ok(CommandCode::FlashChannel),
            0x82 => Ok(CommandCode::OpenSingle),
            0x83 => Ok(CommandCode::QuerySingle),
            0x84 => Ok(CommandCode::QueryAll),
            0x85 => Ok(CommandCode::StatusUpload),
            0x86 => Ok(CommandCode::OpenAll),
            0x87 => Ok(CommandCode::OpenSequential),
            0x88 => Ok(CommandCode::KeepOpen),
            0x89 => Ok(CommandCode::CloseChannel),
            other => Err(Error::InvalidCommandCode(other)),
        }
    }
}

impl From<CommandCode> for u8 {
    fn from(code: CommandCode) -> Self {
        code.as_u8()
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} ({})", self.as_u8(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_codes_round_trip() {
        for code in CommandCode::ALL {
            assert_eq!(CommandCode::try_from(code.as_u8()).unwrap(), code);
        }
    }

    #[test]
    fn test_codes_are_contiguous() {
        let bytes: Vec<u8> = CommandCode::ALL.iter().map(|c| c.as_u8()).collect();
        assert_eq!(bytes, (0x80..=0x89).collect::<Vec<u8>>());
    }

    #[test]
    fn test_invalid_codes() {
        assert_eq!(
            CommandCode::try_from(0x7F),
            Err(Error::InvalidCommandCode(0x7F))
        );
        assert!(CommandCode::try_from(0x8A).is_err());
        assert!(CommandCode::try_from(0x00).is_err());
    }

    #[test]
    fn test_inbound_only() {
        let inbound: Vec<_> = CommandCode::ALL
            .iter()
            .filter(|c| c.is_inbound_only())
            .collect();
        assert_eq!(inbound, vec![&CommandCode::StatusUpload]);
    }

    #[test]
    fn test_response_shapes() {
        assert!(CommandCode::OpenSingle.response_has_channel());
        assert!(CommandCode::OpenSingle.response_has_lock_status());
        assert!(CommandCode::FlashChannel.response_has_channel());
        assert!(!CommandCode::FlashChannel.response_has_lock_status());
        assert!(!CommandCode::QueryAll.response_has_channel());
        assert!(!CommandCode::OpenSequential.response_has_channel());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            CommandCode::OpenSequential.to_string(),
            "0x87 (open locks sequentially)"
        );
    }
}
