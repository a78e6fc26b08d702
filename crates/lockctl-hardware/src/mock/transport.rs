//! Mock transport for testing without a serial port.
//!
//! The transport side is handed to the command manager; the paired
//! [`MockTransportHandle`] stays with the test and plays the board: it
//! injects inbound chunks, observes outbound writes and toggles failures.
//! With a [`MockBoard`] attached, writes are answered automatically.

use super::board::MockBoard;
use crate::{
    Result,
    error::ControlError,
    traits::{INBOUND_CHANNEL_CAPACITY, InboundEvent, InboundStream, Transport},
};
use bytes::Bytes;
use lockctl_core::LockStatus;
use lockctl_protocol::Frame;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use tokio::sync::mpsc;
use tracing::{debug, trace};

#[derive(Debug)]
struct MockState {
    connected: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

type SharedBoard = Arc<Mutex<MockBoard>>;

fn lock_board(board: &SharedBoard) -> MutexGuard<'_, MockBoard> {
    board.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory transport.
///
/// # Examples
///
/// ```
/// use lockctl_hardware::mock::MockTransport;
/// use lockctl_hardware::traits::{InboundEvent, Transport};
///
/// #[tokio::main]
/// async fn main() -> lockctl_hardware::Result<()> {
///     let (mut transport, mut handle) = MockTransport::new();
///     let mut inbound = transport.take_inbound()?;
///
///     transport.write(&[0x57, 0x4B]).await?;
///     assert_eq!(handle.next_write().await.unwrap().as_ref(), &[0x57, 0x4B]);
///
///     handle.inject(vec![0x01, 0x02]).await?;
///     assert_eq!(inbound.recv().await, Some(InboundEvent::Data(vec![0x01, 0x02].into())));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockTransport {
    name: String,
    inbound_tx: mpsc::Sender<InboundEvent>,
    inbound_rx: Option<InboundStream>,
    writes_tx: mpsc::UnboundedSender<Bytes>,
    state: Arc<MockState>,
    board: Option<SharedBoard>,
}

impl MockTransport {
    /// Create a transport that never answers on its own.
    pub fn new() -> (Self, MockTransportHandle) {
        Self::build("Mock Transport".to_string(), None)
    }

    /// Create a transport whose writes are answered by `board`.
    pub fn with_board(board: MockBoard) -> (Self, MockTransportHandle) {
        Self::build("Mock Board".to_string(), Some(board))
    }

    fn build(name: String, board: Option<MockBoard>) -> (Self, MockTransportHandle) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let (writes_tx, writes_rx) = mpsc::unbounded_channel();
        let state = Arc::new(MockState {
            connected: AtomicBool::new(true),
            fail_writes: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        });
        let board = board.map(|b| Arc::new(Mutex::new(b)));

        let transport = Self {
            name,
            inbound_tx: inbound_tx.clone(),
            inbound_rx: Some(inbound_rx),
            writes_tx,
            state: Arc::clone(&state),
            board: board.clone(),
        };
        let handle = MockTransportHandle {
            inbound_tx,
            writes_rx,
            state,
            board,
        };

        (transport, handle)
    }

    /// Let the attached board answer a written frame after its latency.
    fn auto_respond(&self, bytes: &[u8]) {
        let Some(board) = &self.board else {
            return;
        };
        let request = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Simulated board ignoring malformed write: {}", e);
                return;
            }
        };
        let Some((delay, reply)) = lock_board(board).handle(&request) else {
            trace!("Simulated board stays silent for {}", request);
            return;
        };

        let tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = tx.send(InboundEvent::Data(reply.to_bytes())).await;
        });
    }
}

impl Transport for MockTransport {
    fn take_inbound(&mut self) -> Result<InboundStream> {
        self.inbound_rx
            .take()
            .ok_or_else(|| ControlError::transport("inbound stream already taken"))
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(ControlError::disconnected(self.name.clone()));
        }
        if self.state.fail_writes.load(Ordering::Acquire) {
            return Err(ControlError::transport("simulated write failure"));
        }

        self.state.writes.fetch_add(1, Ordering::Relaxed);
        let _ = self.writes_tx.send(Bytes::copy_from_slice(bytes));
        self.auto_respond(bytes);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.state.connected.store(false, Ordering::Release);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Test-side controls for a [`MockTransport`].
#[derive(Debug)]
pub struct MockTransportHandle {
    inbound_tx: mpsc::Sender<InboundEvent>,
    writes_rx: mpsc::UnboundedReceiver<Bytes>,
    state: Arc<MockState>,
    board: Option<SharedBoard>,
}

impl MockTransportHandle {
    /// Deliver a chunk of bytes to the read side.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` if the inbound stream was dropped.
    pub async fn inject(&self, bytes: impl Into<Bytes>) -> Result<()> {
        self.send(InboundEvent::Data(bytes.into())).await
    }

    pub async fn inject_frame(&self, frame: &Frame) -> Result<()> {
        self.inject(frame.to_bytes()).await
    }

    /// Report a link error on the read side.
    pub async fn inject_error(&self, message: impl Into<String>) -> Result<()> {
        self.send(InboundEvent::Error(message.into())).await
    }

    async fn send(&self, event: InboundEvent) -> Result<()> {
        self.inbound_tx
            .send(event)
            .await
            .map_err(|_| ControlError::disconnected("mock inbound stream closed"))
    }

    /// Wait for the next successful write.
    pub async fn next_write(&mut self) -> Option<Bytes> {
        self.writes_rx.recv().await
    }

    pub fn try_next_write(&mut self) -> Option<Bytes> {
        self.writes_rx.try_recv().ok()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.state.writes.load(Ordering::Relaxed)
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.connected.store(connected, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// Make every write fail until turned off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::Release);
    }

    /// Current state of a lock on the attached board.
    pub fn lock_status(&self, channel: u8) -> Option<LockStatus> {
        self.board
            .as_ref()
            .and_then(|board| lock_board(board).lock_status(channel))
    }

    /// Move a lock on the attached board and emit the status upload the
    /// board sends for it.
    ///
    /// # Errors
    ///
    /// Returns a transport error if no board is attached or the channel
    /// does not exist.
    pub async fn change_lock(&self, channel: u8, status: LockStatus) -> Result<()> {
        let upload = {
            let board = self
                .board
                .as_ref()
                .ok_or_else(|| ControlError::transport("no simulated board attached"))?;
            lock_board(board).set_lock_status(channel, status)
        };
        let upload = upload
            .ok_or_else(|| ControlError::transport(format!("no channel {channel} on board")))?;
        self.inject_frame(&upload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockctl_core::{BoardAddress, ChannelId};
    use lockctl_protocol::LockCommand;

    #[tokio::test]
    async fn test_inbound_taken_once() {
        let (mut transport, _handle) = MockTransport::new();
        assert!(transport.take_inbound().is_ok());
        assert!(transport.take_inbound().is_err());
    }

    #[tokio::test]
    async fn test_write_recorded() {
        let (mut transport, mut handle) = MockTransport::new();
        transport.write(&[1, 2, 3]).await.unwrap();

        assert_eq!(handle.next_write().await.unwrap().as_ref(), &[1, 2, 3]);
        assert_eq!(handle.write_count(), 1);
        assert!(handle.try_next_write().is_none());
    }

    #[tokio::test]
    async fn test_write_fails_when_disconnected() {
        let (mut transport, mut handle) = MockTransport::new();
        handle.set_connected(false);

        let result = transport.write(&[1]).await;
        assert!(matches!(result, Err(ControlError::Disconnected { .. })));
        assert!(handle.try_next_write().is_none());
    }

    #[tokio::test]
    async fn test_simulated_write_failure() {
        let (mut transport, handle) = MockTransport::new();
        handle.set_fail_writes(true);
        assert!(matches!(
            transport.write(&[1]).await,
            Err(ControlError::Transport { .. })
        ));

        handle.set_fail_writes(false);
        assert!(transport.write(&[1]).await.is_ok());
    }

    #[tokio::test]
    async fn test_disconnect() {
        let (mut transport, handle) = MockTransport::new();
        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_board_answers_write() {
        let board = MockBoard::new(BoardAddress::new(0), 12);
        let (mut transport, handle) = MockTransport::with_board(board);
        let mut inbound = transport.take_inbound().unwrap();

        let request =
            LockCommand::query_single(BoardAddress::new(0), ChannelId::new(3).unwrap()).encode();
        transport.write(request.unwrap().as_bytes()).await.unwrap();

        let Some(InboundEvent::Data(bytes)) = inbound.recv().await else {
            panic!("expected reply bytes");
        };
        let reply = Frame::decode(&bytes).unwrap();
        assert_eq!(reply.payload(), &[0x00, 0x03, 0x01]);
        assert_eq!(handle.lock_status(3), Some(LockStatus::Closed));
    }

    #[tokio::test]
    async fn test_change_lock_emits_upload() {
        let board = MockBoard::new(BoardAddress::new(0), 4);
        let (mut transport, handle) = MockTransport::with_board(board);
        let mut inbound = transport.take_inbound().unwrap();

        handle.change_lock(2, LockStatus::Open).await.unwrap();
        assert_eq!(handle.lock_status(2), Some(LockStatus::Open));

        let Some(InboundEvent::Data(bytes)) = inbound.recv().await else {
            panic!("expected upload bytes");
        };
        assert_eq!(
            bytes.as_ref(),
            &[0x57, 0x4B, 0x4C, 0x59, 0x0A, 0x00, 0x85, 0x02, 0x00, 0x84]
        );

        assert!(handle.change_lock(9, LockStatus::Open).await.is_err());
    }

    #[tokio::test]
    async fn test_change_lock_without_board() {
        let (_transport, handle) = MockTransport::new();
        assert!(handle.change_lock(1, LockStatus::Open).await.is_err());
    }
}
