//! Tokio codec for lock board framing.
//!
//! [`LockBoardCodec`] puts a [`StreamParser`] behind the `tokio_util` codec
//! traits so a host that owns an async byte stream can use `Framed`:
//!
//! ```text
//! serial bytes -> Decoder -> Frame
//! LockCommand / Frame -> Encoder -> serial bytes
//! ```
//!
//! The decoder never fails on bad input. Invalid frames and noise are handled
//! the way the reassembler handles them: logged and dropped.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use lockctl_core::{BoardAddress, ChannelId};
//! use lockctl_protocol::{LockBoardCodec, LockCommand};
//! use tokio_util::codec::{Decoder, Encoder};
//!
//! let mut codec = LockBoardCodec::new();
//! let mut buf = BytesMut::new();
//!
//! let cmd = LockCommand::query_single(BoardAddress::new(0), ChannelId::new(1).unwrap());
//! codec.encode(cmd, &mut buf).unwrap();
//!
//! let frame = codec.decode(&mut buf).unwrap().unwrap();
//! assert_eq!(frame.command_byte(), 0x83);
//! ```

use bytes::BytesMut;
use lockctl_core::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    builder::LockCommand,
    frame::Frame,
    stream_parser::{ReassemblerConfig, StreamParser},
};

#[derive(Debug, Default)]
pub struct LockBoardCodec {
    parser: StreamParser,
}

impl LockBoardCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReassemblerConfig) -> Self {
        Self {
            parser: StreamParser::with_config(config),
        }
    }

    /// Bytes held by the codec waiting for the rest of a frame.
    pub fn buffered_len(&self) -> usize {
        self.parser.buffered_len()
    }
}

impl Decoder for LockBoardCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Error> {
        if !src.is_empty() {
            // The parser keeps its own copy of partial data.
            self.parser.feed(src);
            src.clear();
        }
        Ok(self.parser.next_frame())
    }
}

impl Encoder<Frame> for LockBoardCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Error> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}

impl Encoder<LockCommand> for LockBoardCodec {
    type Error = Error;

    fn encode(&mut self, item: LockCommand, dst: &mut BytesMut) -> Result<(), Error> {
        let frame = item.encode()?;
        dst.extend_from_slice(frame.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockctl_core::{BoardAddress, ChannelId};

    #[test]
    fn test_decode_needs_more_data() {
        let mut codec = LockBoardCodec::new();
        let mut buf = BytesMut::from(&[0x57, 0x4B, 0x4C, 0x59, 0x09][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
        assert_eq!(codec.buffered_len(), 5);

        buf.extend_from_slice(&[0x00, 0x82, 0x01, 0x83]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.to_string(), "57 4B 4C 59 09 00 82 01 83");
    }

    #[test]
    fn test_decode_queues_multiple_frames() {
        let mut codec = LockBoardCodec::new();
        let a = Frame::encode(BoardAddress::new(0), 0x86, &[0x00]).unwrap();
        let b = Frame::encode(BoardAddress::new(0), 0x85, &[0x02, 0x01]).unwrap();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(a.as_bytes());
        buf.extend_from_slice(b.as_bytes());

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(a));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(b));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_read_buffer_larger_than_cap() {
        let mut codec = LockBoardCodec::new();
        let upload = Frame::encode(BoardAddress::new(0), 0x85, &[0x01, 0x01]).unwrap();
        let mut buf = BytesMut::new();
        for _ in 0..110 {
            buf.extend_from_slice(upload.as_bytes());
        }

        let mut decoded = 0;
        while let Some(frame) = codec.decode(&mut buf).unwrap() {
            assert_eq!(frame, upload);
            decoded += 1;
        }
        assert_eq!(decoded, 110);
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_encode_command() {
        let mut codec = LockBoardCodec::new();
        let mut buf = BytesMut::new();
        let cmd = LockCommand::open_single(BoardAddress::new(0x0A), ChannelId::new(1).unwrap());
        codec.encode(cmd, &mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[0x57, 0x4B, 0x4C, 0x59, 0x09, 0x0A, 0x82, 0x01, 0x89]
        );
    }
}
