use crate::{
    commands::CommandCode,
    frame::Frame,
    matcher::{ResponseStatus, status_of},
};
use lockctl_core::{BoardAddress, Error, LockStatus, Result};
use serde::Serialize;
use tracing::warn;

/// State of one channel in a query-all response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelState {
    pub channel: u8,
    pub lock_status: LockStatus,
    pub locked: bool,
}

impl ChannelState {
    pub fn new(channel: u8, lock_status: LockStatus) -> Self {
        Self {
            channel,
            lock_status,
            locked: lock_status.is_locked(),
        }
    }
}

/// Typed view of a board response.
///
/// # Example
/// ```
/// use lockctl_core::LockStatus;
/// use lockctl_protocol::{BoardResponse, Frame};
///
/// let bytes = [0x57, 0x4B, 0x4C, 0x59, 0x0B, 0x00, 0x82, 0x00, 0x01, 0x00, 0x81];
/// let frame = Frame::decode(&bytes).unwrap();
///
/// match BoardResponse::parse(&frame).unwrap() {
///     BoardResponse::LockState { channel, lock_status, .. } => {
///         assert_eq!(channel, 1);
///         assert_eq!(lock_status, LockStatus::Open);
///     }
///     other => panic!("unexpected response {other:?}"),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardResponse {
    /// Status only: simultaneous open, open all, sequential open.
    Ack {
        command: CommandCode,
        status: ResponseStatus,
    },

    /// Status and channel: flash, keep open, close.
    Channel {
        command: CommandCode,
        status: ResponseStatus,
        channel: u8,
    },

    /// Status, channel and lock state: open single, query single.
    LockState {
        command: CommandCode,
        status: ResponseStatus,
        channel: u8,
        lock_status: LockStatus,
    },

    /// Query-all result. `declared_count` is the channel count the board
    /// reported; `channels` may be shorter if the frame was cut short.
    AllLocks {
        status: ResponseStatus,
        declared_count: u8,
        channels: Vec<ChannelState>,
    },

    /// Unsolicited lock state change.
    StatusUpload { channel: u8, lock_status: LockStatus },
}

impl BoardResponse {
    /// Interpret a frame according to its command code.
    ///
    /// # Errors
    /// Returns `Error::InvalidCommandCode` for a code outside `0x80..=0x89`
    /// and `Error::InvalidResponse` when a fixed field is missing.
    pub fn parse(frame: &Frame) -> Result<Self> {
        let command = CommandCode::try_from(frame.command_byte())?;
        let payload = frame.payload();
        let byte = |index: usize, field: &str| {
            payload.get(index).copied().ok_or_else(|| {
                Error::InvalidResponse(format!(
                    "{} response missing {} (payload {} bytes)",
                    command,
                    field,
                    payload.len()
                ))
            })
        };

        let response = match command {
            CommandCode::StatusUpload => BoardResponse::StatusUpload {
                channel: byte(0, "channel")?,
                lock_status: LockStatus::from(byte(1, "lock status")?),
            },
            CommandCode::QueryAll => {
                let status = ResponseStatus::from(byte(0, "status")?);
                let declared_count = byte(1, "channel count")?;
                let statuses = &payload[2..];
                if statuses.len() < declared_count as usize {
                    warn!(
                        declared = declared_count,
                        received = statuses.len(),
                        "query-all response shorter than its channel count"
                    );
                }
                let channels = statuses
                    .iter()
                    .take(declared_count as usize)
                    .zip(1u8..)
                    .map(|(&b, ch)| ChannelState::new(ch, LockStatus::from(b)))
                    .collect();
                BoardResponse::AllLocks {
                    status,
                    declared_count,
                    channels,
                }
            }
            CommandCode::OpenSingle | CommandCode::QuerySingle => BoardResponse::LockState {
                command,
                status: ResponseStatus::from(byte(0, "status")?),
                channel: byte(1, "channel")?,
                lock_status: LockStatus::from(byte(2, "lock status")?),
            },
            CommandCode::FlashChannel | CommandCode::KeepOpen | CommandCode::CloseChannel => {
                BoardResponse::Channel {
                    command,
                    status: ResponseStatus::from(byte(0, "status")?),
                    channel: byte(1, "channel")?,
                }
            }
            CommandCode::OpenSimultaneous | CommandCode::OpenAll | CommandCode::OpenSequential => {
                BoardResponse::Ack {
                    command,
                    status: status_of(frame),
                }
            }
        };
        Ok(response)
    }

    pub fn command(&self) -> CommandCode {
        match self {
            BoardResponse::Ack { command, .. }
            | BoardResponse::Channel { command, .. }
            | BoardResponse::LockState { command, .. } => *command,
            BoardResponse::AllLocks { .. } => CommandCode::QueryAll,
            BoardResponse::StatusUpload { .. } => CommandCode::StatusUpload,
        }
    }

    /// Status byte outcome. Status uploads carry none and report `Missing`.
    pub fn status(&self) -> ResponseStatus {
        match self {
            BoardResponse::Ack { status, .. }
            | BoardResponse::Channel { status, .. }
            | BoardResponse::LockState { status, .. }
            | BoardResponse::AllLocks { status, .. } => *status,
            BoardResponse::StatusUpload { .. } => ResponseStatus::Missing,
        }
    }
}

/// A response together with the board it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressedResponse {
    pub address: BoardAddress,
    #[serde(flatten)]
    pub response: BoardResponse,
}

impl TryFrom<&Frame> for AddressedResponse {
    type Error = Error;

    fn try_from(frame: &Frame) -> Result<Self> {
        Ok(Self {
            address: frame.address(),
            response: BoardResponse::parse(frame)?,
        })
    }
}
