//! Byte transport abstraction.
//!
//! A [`Transport`] is a bidirectional byte stream to one board: a serial
//! port in production, an in-memory mock in tests. Outbound writes are
//! whole encoded frames; inbound bytes arrive as arbitrary chunks on a
//! channel and are reassembled by the command manager.
//!
//! The trait uses native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT). Because such traits are not object-safe, the manager holds an
//! [`AnyTransport`](crate::devices::AnyTransport) instead of a trait object.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Default depth of the inbound chunk channel.
pub const INBOUND_CHANNEL_CAPACITY: usize = 64;

/// Something that happened on the read side of a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A chunk of bytes, in arrival order. Chunk boundaries carry no meaning.
    Data(Bytes),

    /// The link reported an error. The transport may still be usable.
    Error(String),
}

/// Receiving end of a transport's inbound chunks.
pub type InboundStream = mpsc::Receiver<InboundEvent>;

/// Bidirectional byte stream to a lock control board.
pub trait Transport: Send {
    /// Hand over the inbound stream. Can only succeed once.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream was already taken.
    fn take_inbound(&mut self) -> Result<InboundStream>;

    /// Write one encoded frame to the link.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` when the link is down, or a transport/I/O
    /// error if the write fails.
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Close the link. Further writes fail.
    async fn disconnect(&mut self) -> Result<()>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
