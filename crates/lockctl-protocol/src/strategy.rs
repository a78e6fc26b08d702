//! Per-command execution time and response timeout.
//!
//! The board answers only after it has finished actuating, so the response
//! window depends on what the command does. Lock-opening commands that carry
//! a count scale with the number of locks; everything else has a fixed cost.
//!
//! | Code                   | Execution time              |
//! |------------------------|-----------------------------|
//! | `0x80`, `0x86`, `0x87` | 350 ms × max(1, count)      |
//! | `0x82`                 | 350 ms                      |
//! | `0x81`, `0x83`, `0x88`, `0x89` | 100 ms              |
//! | `0x84`                 | 200 ms                      |
//! | anything else          | 500 ms                      |
//!
//! The timeout is the execution time multiplied by
//! [`TIMEOUT_SAFETY_FACTOR`]. Raw command bytes too short to carry a command
//! code get [`MALFORMED_COMMAND_TIMEOUT_MS`].

use crate::commands::CommandCode;
use lockctl_core::constants::{
    CHANNEL_COMMAND_DURATION_MS, COMMAND_OFFSET, MALFORMED_COMMAND_TIMEOUT_MS,
    PAYLOAD_OFFSET, PER_LOCK_DURATION_MS, QUERY_ALL_DURATION_MS, TIMEOUT_SAFETY_FACTOR,
    UNKNOWN_COMMAND_DURATION_MS,
};
use std::time::Duration;
use tracing::trace;

/// Number of locks a command actuates, as used for timing.
///
/// Count-bearing codes read the count from the first payload byte; a missing
/// or zero count is treated as one lock.
pub fn lock_count(code: u8, payload: &[u8]) -> u64 {
    match CommandCode::try_from(code) {
        Ok(c) if c.carries_count() => payload.first().map_or(1, |&n| u64::from(n).max(1)),
        _ => 1,
    }
}

/// Expected time for the board to carry out a command.
pub fn execution_time(code: u8, payload: &[u8]) -> Duration {
    let ms = match CommandCode::try_from(code) {
        Ok(
            CommandCode::OpenSimultaneous | CommandCode::OpenAll | CommandCode::OpenSequential,
        ) => PER_LOCK_DURATION_MS * lock_count(code, payload),
        Ok(CommandCode::OpenSingle) => PER_LOCK_DURATION_MS,
        Ok(
            CommandCode::FlashChannel
            | CommandCode::QuerySingle
            | CommandCode::KeepOpen
            | CommandCode::CloseChannel,
        ) => CHANNEL_COMMAND_DURATION_MS,
        Ok(CommandCode::QueryAll) => QUERY_ALL_DURATION_MS,
        Ok(CommandCode::StatusUpload) | Err(_) => UNKNOWN_COMMAND_DURATION_MS,
    };
    Duration::from_millis(ms)
}

/// Response window for a command: execution time times the safety factor.
pub fn timeout_for(code: u8, payload: &[u8]) -> Duration {
    let timeout = execution_time(code, payload) * TIMEOUT_SAFETY_FACTOR as u32;
    trace!(
        command = format_args!("0x{code:02X}"),
        timeout_ms = timeout.as_millis() as u64,
        "computed command timeout"
    );
    timeout
}

/// Response window computed from encoded command bytes.
///
/// Accepts bytes that may not be a valid frame. Anything too short to hold a
/// command code gets the fixed malformed-command timeout.
pub fn timeout_for_frame(bytes: &[u8]) -> Duration {
    let Some(&code) = bytes.get(COMMAND_OFFSET) else {
        return Duration::from_millis(MALFORMED_COMMAND_TIMEOUT_MS);
    };
    let payload = bytes
        .get(PAYLOAD_OFFSET..bytes.len().saturating_sub(1))
        .unwrap_or(&[]);
    timeout_for(code, payload)
}
