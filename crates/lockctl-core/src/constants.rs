//! Core constants for the lock control board protocol.
//!
//! This module defines the wire-level constants shared by every crate in the
//! workspace: the frame marker, frame size bounds, status byte values and the
//! timing table used to derive per-command timeouts.
//!
//! # Frame Structure
//!
//! Every frame on the link, in either direction, has the same layout:
//!
//! ```text
//! 57 4B 4C 59 | LEN | ADDR | CMD | PAYLOAD ... | XOR
//! ^^^^^^^^^^^   ^^^   ^^^^   ^^^                 ^^^
//! marker        total  board  command             checksum over all
//!               length addr   code                preceding bytes
//! ```
//!
//! The length byte counts the whole frame, including the marker, itself and
//! the checksum. Because it is a single unsigned byte, a frame can never be
//! longer than 255 bytes.
//!
//! # Usage
//!
//! ```
//! use lockctl_core::constants::*;
//!
//! assert_eq!(FRAME_MARKER, [0x57, 0x4B, 0x4C, 0x59]);
//! assert_eq!(MIN_FRAME_LEN, 8);
//! assert_eq!(MAX_PAYLOAD_LEN, 247);
//! ```

// ============================================================================
// Framing
// ============================================================================

/// Four-byte marker that opens every frame (`"WKLY"` in ASCII).
pub const FRAME_MARKER: [u8; 4] = [0x57, 0x4B, 0x4C, 0x59];

/// Offset of the total-length byte.
pub const LENGTH_OFFSET: usize = 4;

/// Offset of the board address byte.
pub const ADDRESS_OFFSET: usize = 5;

/// Offset of the command code byte.
pub const COMMAND_OFFSET: usize = 6;

/// Offset of the first payload byte.
pub const PAYLOAD_OFFSET: usize = 7;

/// Bytes in a frame that are not payload: marker, length, address,
/// command and checksum.
pub const FRAME_OVERHEAD: usize = FRAME_MARKER.len() + 4;

/// Smallest valid frame (empty payload).
pub const MIN_FRAME_LEN: usize = FRAME_OVERHEAD;

/// Largest frame the one-byte length field can describe.
pub const MAX_FRAME_LEN: usize = u8::MAX as usize;

/// Largest payload that still fits in [`MAX_FRAME_LEN`].
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - FRAME_OVERHEAD;

// ============================================================================
// Status bytes
// ============================================================================

/// Response status: command executed.
pub const STATUS_SUCCESS: u8 = 0x00;

/// Response status: command failed on the board.
pub const STATUS_FAILURE: u8 = 0xFF;

/// Lock status: door open.
pub const LOCK_STATUS_OPEN: u8 = 0x00;

/// Lock status: door closed.
pub const LOCK_STATUS_CLOSED: u8 = 0x01;

/// Lock status: board reported an error for this channel.
pub const LOCK_STATUS_ERROR: u8 = 0xFF;

// ============================================================================
// Channels
// ============================================================================

/// First valid channel (lock) number. Channels are numbered from 1.
pub const MIN_CHANNEL_ID: u8 = 1;

/// Default number of channels on a board.
///
/// Boards ship with 12 or 24 channels; the real limit is configuration,
/// not protocol.
pub const DEFAULT_CHANNEL_COUNT: u8 = 12;

/// Default board address on the link.
pub const DEFAULT_BOARD_ADDRESS: u8 = 0x00;

// ============================================================================
// Execution timing (milliseconds)
// ============================================================================

/// Time for the board to actuate a single lock.
pub const PER_LOCK_DURATION_MS: u64 = 350;

/// Time for a single-channel query or channel control command.
pub const CHANNEL_COMMAND_DURATION_MS: u64 = 100;

/// Time for a query of all channels.
pub const QUERY_ALL_DURATION_MS: u64 = 200;

/// Fallback execution time for unknown command codes.
pub const UNKNOWN_COMMAND_DURATION_MS: u64 = 500;

/// Multiplier applied to execution time to derive the response timeout.
pub const TIMEOUT_SAFETY_FACTOR: u64 = 2;

/// Timeout used when the command bytes are too short to classify.
pub const MALFORMED_COMMAND_TIMEOUT_MS: u64 = 1000;

// ============================================================================
// Stream reassembly
// ============================================================================

/// Buffered bytes without a marker after which the buffer is discarded.
pub const NOISE_THRESHOLD: usize = 100;

/// Hard cap on the reassembly buffer regardless of content.
pub const MAX_STREAM_BUFFER: usize = 1024;
