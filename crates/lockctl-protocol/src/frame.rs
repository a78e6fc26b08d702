//! Binary frame codec.
//!
//! A [`Frame`] is a validated wire frame. It can only be obtained through
//! [`Frame::encode`] or one of the decoding constructors, so holding one
//! means the marker, length byte and checksum have all been checked.
//!
//! # Wire Format
//!
//! ```text
//! 57 4B 4C 59  09  00  82  01  83
//! ^^^^^^^^^^^  ^^  ^^  ^^  ^^  ^^
//! marker       len addr cmd ch  XOR of all preceding bytes
//! ```
//!
//! # Usage
//!
//! ```
//! use lockctl_core::BoardAddress;
//! use lockctl_protocol::Frame;
//!
//! let frame = Frame::encode(BoardAddress::new(0x00), 0x82, &[0x01]).unwrap();
//! assert_eq!(
//!     frame.as_bytes(),
//!     &[0x57, 0x4B, 0x4C, 0x59, 0x09, 0x00, 0x82, 0x01, 0x83]
//! );
//!
//! let decoded = Frame::decode(frame.as_bytes()).unwrap();
//! assert_eq!(decoded.command_byte(), 0x82);
//! assert_eq!(decoded.payload(), &[0x01]);
//! ```

use crate::commands::CommandCode;
use bytes::{BufMut, Bytes, BytesMut};
use lockctl_core::{
    BoardAddress, Error, Result,
    constants::{
        ADDRESS_OFFSET, COMMAND_OFFSET, FRAME_MARKER, FRAME_OVERHEAD, LENGTH_OFFSET,
        MAX_PAYLOAD_LEN, MIN_FRAME_LEN, PAYLOAD_OFFSET,
    },
};
use std::fmt;

/// XOR of every byte in `bytes`.
///
/// The frame checksum is this value computed over everything before the
/// checksum byte, marker included.
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// A complete, validated protocol frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    data: Bytes,
}

impl Frame {
    /// Build the wire bytes for a frame.
    ///
    /// # Errors
    /// Returns `Error::PayloadTooLarge` when the payload would push the total
    /// length past what the one-byte length field can hold.
    pub fn encode(address: BoardAddress, command: u8, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let total = FRAME_OVERHEAD + payload.len();
        let mut buf = BytesMut::with_capacity(total);
        buf.put_slice(&FRAME_MARKER);
        buf.put_u8(total as u8);
        buf.put_u8(address.as_u8());
        buf.put_u8(command);
        buf.put_slice(payload);
        let sum = checksum(&buf);
        buf.put_u8(sum);

        Ok(Frame { data: buf.freeze() })
    }

    /// Validate a byte slice as one complete frame.
    ///
    /// # Errors
    /// Returns the first validation failure: `FrameTooShort`,
    /// `MarkerMismatch`, `LengthMismatch` or `ChecksumMismatch`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        validate(bytes)?;
        Ok(Frame {
            data: Bytes::copy_from_slice(bytes),
        })
    }

    /// Validate owned bytes as one complete frame without copying.
    ///
    /// # Errors
    /// Same as [`Frame::decode`].
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        validate(&data)?;
        Ok(Frame { data })
    }

    pub fn address(&self) -> BoardAddress {
        BoardAddress::new(self.data[ADDRESS_OFFSET])
    }

    pub fn command_byte(&self) -> u8 {
        self.data[COMMAND_OFFSET]
    }

    /// The command code, if it is one the board defines.
    pub fn command(&self) -> Option<CommandCode> {
        CommandCode::try_from(self.command_byte()).ok()
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[PAYLOAD_OFFSET..self.data.len() - 1]
    }

    pub fn checksum(&self) -> u8 {
        self.data[self.data.len() - 1]
    }

    /// Total encoded length, equal to the length byte.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`; a valid frame has at least the fixed header.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Cheap clone of the underlying buffer.
    pub fn to_bytes(&self) -> Bytes {
        self.data.clone()
    }
}

fn validate(bytes: &[u8]) -> Result<()> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(Error::FrameTooShort(bytes.len()));
    }
    if bytes[..FRAME_MARKER.len()] != FRAME_MARKER {
        return Err(Error::MarkerMismatch);
    }

    let declared = bytes[LENGTH_OFFSET] as usize;
    if declared != bytes.len() {
        return Err(Error::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }

    let (body, tail) = bytes.split_at(bytes.len() - 1);
    let expected = checksum(body);
    if expected != tail[0] {
        return Err(Error::ChecksumMismatch {
            expected,
            actual: tail[0],
        });
    }
    Ok(())
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl TryFrom<&[u8]> for Frame {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Frame::decode(bytes)
    }
}

impl From<Frame> for Bytes {
    fn from(frame: Frame) -> Self {
        frame.data
    }
}

/// Space-separated uppercase hex, the format used in board documentation.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for b in self.data.iter() {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
            first = false;
        }
        Ok(())
    }
}
