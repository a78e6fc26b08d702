//! Correlating responses with the outstanding command.
//!
//! Frames carry no sequence number. A response belongs to the outstanding
//! command when it echoes the same board address and command code, and the
//! fields inside the payload are found by position only.

use crate::{commands::CommandCode, frame::Frame};
use lockctl_core::{
    BoardAddress, LockStatus,
    constants::{STATUS_FAILURE, STATUS_SUCCESS},
};
use serde::Serialize;
use std::fmt;

const STATUS_INDEX: usize = 0;
const CHANNEL_INDEX: usize = 1;
const LOCK_STATUS_INDEX: usize = 2;

/// `true` if `response` answers a command with this address and code.
pub fn is_match(response: &Frame, address: BoardAddress, command: CommandCode) -> bool {
    response.address() == address && response.command_byte() == command.as_u8()
}

/// Outcome reported in the first payload byte of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Failure,
    /// A status byte other than `0x00` or `0xFF`.
    Unknown(u8),
    /// Empty payload.
    Missing,
}

impl ResponseStatus {
    /// Only an explicit `0x00` counts as success.
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseStatus::Success)
    }

    /// Raw status byte, if one was present.
    pub fn as_byte(&self) -> Option<u8> {
        match self {
            ResponseStatus::Success => Some(STATUS_SUCCESS),
            ResponseStatus::Failure => Some(STATUS_FAILURE),
            ResponseStatus::Unknown(b) => Some(*b),
            ResponseStatus::Missing => None,
        }
    }
}

impl From<u8> for ResponseStatus {
    fn from(b: u8) -> Self {
        match b {
            STATUS_SUCCESS => ResponseStatus::Success,
            STATUS_FAILURE => ResponseStatus::Failure,
            other => ResponseStatus::Unknown(other),
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Success => write!(f, "success"),
            ResponseStatus::Failure => write!(f, "failure"),
            ResponseStatus::Unknown(b) => write!(f, "unknown status 0x{b:02X}"),
            ResponseStatus::Missing => write!(f, "missing status"),
        }
    }
}

pub fn status_of(response: &Frame) -> ResponseStatus {
    response
        .payload()
        .get(STATUS_INDEX)
        .map_or(ResponseStatus::Missing, |&b| ResponseStatus::from(b))
}

/// Channel number echoed by flash, open-single, query-single, keep-open and
/// close responses. `None` for other codes or a truncated payload.
pub fn extract_channel_id(response: &Frame) -> Option<u8> {
    let code = response.command()?;
    if !code.response_has_channel() {
        return None;
    }
    response.payload().get(CHANNEL_INDEX).copied()
}

/// Lock state echoed by open-single and query-single responses.
pub fn extract_lock_status(response: &Frame) -> Option<LockStatus> {
    let code = response.command()?;
    if !code.response_has_lock_status() {
        return None;
    }
    response
        .payload()
        .get(LOCK_STATUS_INDEX)
        .map(|&b| LockStatus::from(b))
}
