//! Commands waiting in, or executing from, the manager's queue.
//!
//! A command's lifecycle is carried by ownership: it sits in the FIFO while
//! queued, moves into the manager's single executing slot when written,
//! and is consumed by [`QueuedCommand::resolve`] exactly once.

use crate::error::{ControlError, Result};
use lockctl_core::BoardAddress;
use lockctl_protocol::{BoardResponse, CommandCode, Frame, LockCommand, is_match};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::trace;

/// Matching response for a successfully executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    /// The board's response frame.
    pub frame: Frame,

    /// Time from enqueue to resolution, including queueing.
    pub elapsed: Duration,
}

impl CommandResponse {
    /// Parse the frame into a typed response.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the payload is too short for its code.
    pub fn parse(&self) -> lockctl_core::Result<BoardResponse> {
        BoardResponse::parse(&self.frame)
    }
}

pub(crate) type Responder = oneshot::Sender<Result<CommandResponse>>;

#[derive(Debug)]
pub(crate) struct QueuedCommand {
    pub(crate) seq: u64,
    pub(crate) address: BoardAddress,
    pub(crate) code: CommandCode,
    pub(crate) frame: Frame,
    pub(crate) timeout: Duration,
    enqueued_at: Instant,
    responder: Responder,
}

impl QueuedCommand {
    /// Encode `command` and capture its timeout.
    ///
    /// # Errors
    ///
    /// Returns the encoding error if the payload does not fit in a frame.
    pub(crate) fn new(seq: u64, command: &LockCommand, responder: Responder) -> Result<Self> {
        let frame = command.encode()?;
        Ok(Self {
            seq,
            address: command.address(),
            code: command.code(),
            timeout: command.timeout(),
            frame,
            enqueued_at: Instant::now(),
            responder,
        })
    }

    pub(crate) fn matches(&self, frame: &Frame) -> bool {
        is_match(frame, self.address, self.code)
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    pub(crate) fn resolve(self, result: Result<CommandResponse>) {
        if self.responder.send(result).is_err() {
            trace!(seq = self.seq, command = %self.code, "Ticket dropped before resolution");
        }
    }
}

/// Pending result of an enqueued command.
///
/// Await the ticket to get the command's resolution. Dropping it does not
/// cancel the command; it still runs in its turn and the result is
/// discarded.
#[derive(Debug)]
pub struct CommandTicket {
    seq: u64,
    command: CommandCode,
    rx: oneshot::Receiver<Result<CommandResponse>>,
}

impl CommandTicket {
    pub(crate) fn new(
        seq: u64,
        command: CommandCode,
        rx: oneshot::Receiver<Result<CommandResponse>>,
    ) -> Self {
        Self { seq, command, rx }
    }

    /// Position of the command in enqueue order.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn command(&self) -> CommandCode {
        self.command
    }
}

impl Future for CommandTicket {
    type Output = Result<CommandResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ControlError::ManagerClosed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockctl_core::ChannelId;

    fn open_one() -> LockCommand {
        LockCommand::open_single(BoardAddress::new(0), ChannelId::new(1).unwrap())
    }

    #[test]
    fn test_new_captures_timeout_and_frame() {
        let (tx, _rx) = oneshot::channel();
        let queued = QueuedCommand::new(7, &open_one(), tx).unwrap();

        assert_eq!(queued.seq, 7);
        assert_eq!(queued.code, CommandCode::OpenSingle);
        assert_eq!(queued.timeout, Duration::from_millis(700));
        assert_eq!(
            queued.frame.as_bytes(),
            &[0x57, 0x4B, 0x4C, 0x59, 0x09, 0x00, 0x82, 0x01, 0x83]
        );
    }

    #[test]
    fn test_matches_code_and_address() {
        let (tx, _rx) = oneshot::channel();
        let queued = QueuedCommand::new(0, &open_one(), tx).unwrap();

        let reply = Frame::encode(BoardAddress::new(0), 0x82, &[0x00, 0x01, 0x00]).unwrap();
        let other_code = Frame::encode(BoardAddress::new(0), 0x83, &[0x00, 0x01, 0x00]).unwrap();
        let other_board = Frame::encode(BoardAddress::new(1), 0x82, &[0x00, 0x01, 0x00]).unwrap();

        assert!(queued.matches(&reply));
        assert!(!queued.matches(&other_code));
        assert!(!queued.matches(&other_board));
    }

    #[tokio::test]
    async fn test_ticket_receives_resolution() {
        let (tx, rx) = oneshot::channel();
        let queued = QueuedCommand::new(3, &open_one(), tx).unwrap();
        let ticket = CommandTicket::new(3, CommandCode::OpenSingle, rx);
        assert_eq!(ticket.seq(), 3);

        let frame = Frame::encode(BoardAddress::new(0), 0x82, &[0x00, 0x01, 0x00]).unwrap();
        queued.resolve(Ok(CommandResponse {
            frame: frame.clone(),
            elapsed: Duration::ZERO,
        }));

        let response = ticket.await.unwrap();
        assert_eq!(response.frame, frame);
        assert!(response.parse().is_ok());
    }

    #[tokio::test]
    async fn test_ticket_closed_when_command_dropped() {
        let (tx, rx) = oneshot::channel();
        let queued = QueuedCommand::new(0, &open_one(), tx).unwrap();
        drop(queued);

        let ticket = CommandTicket::new(0, CommandCode::OpenSingle, rx);
        assert!(matches!(ticket.await, Err(ControlError::ManagerClosed)));
    }
}
