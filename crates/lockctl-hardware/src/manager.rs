//! Command queue manager.
//!
//! The protocol has no transaction IDs: a response is tied to its request
//! only by board address and command code. The [`CommandManager`] therefore
//! keeps at most one command on the wire at a time, dispatching the rest in
//! strict FIFO order as each one resolves by response, failure or timeout.
//!
//! # Architecture
//!
//! ```text
//!                   ┌──────────────┐  Frame   ┌────────────────────────┐
//! Transport ──────► │ Reader task  │ ───────► │                        │
//! inbound chunks    │ (reassembly) │          │      Worker task       │
//!                   └──────────────┘          │                        │
//!                                             │  FIFO + executing slot │ ──► Transport
//! CommandManager ───── Enqueue / Shutdown ──► │  + response deadline   │     write()
//!   ▲                                         │                        │
//!   └──────────── CommandTicket ◄──────────── └───────────┬────────────┘
//!                                                         │ BoardEvent
//!                                                         ▼
//!                                                    BoardEvents
//! ```
//!
//! Only the worker touches the queue and the executing slot, so dispatch,
//! frame handling and timeouts never interleave. The reader task owns the
//! reassembly buffer and only hands finished frames to the worker.
//!
//! # Examples
//!
//! ```
//! use lockctl_core::{BoardAddress, ChannelId};
//! use lockctl_hardware::manager::{CommandManager, ManagerConfig};
//! use lockctl_hardware::mock::{MockBoard, MockTransport};
//! use lockctl_protocol::LockCommand;
//!
//! #[tokio::main]
//! async fn main() -> lockctl_hardware::Result<()> {
//!     let (transport, _handle) = MockTransport::with_board(MockBoard::new(BoardAddress::new(0), 12));
//!     let (manager, _events) = CommandManager::start(transport.into(), ManagerConfig::default())?;
//!
//!     let command = LockCommand::open_single(BoardAddress::new(0), ChannelId::new(1)?);
//!     let response = manager.enqueue(command)?.await?;
//!     assert_eq!(response.frame.payload(), &[0x00, 0x01, 0x00]);
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::{
    Result,
    devices::AnyTransport,
    error::ControlError,
    queued::{CommandResponse, CommandTicket, QueuedCommand},
    traits::{InboundEvent, InboundStream, Transport},
};
use lockctl_core::{BoardAddress, LockStatus};
use lockctl_protocol::{
    BoardResponse, CommandCode, Frame, LockCommand, ReassemblerConfig, SharedStreamParser,
    status_of,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

/// Default capacity of the board event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Settings for a [`CommandManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Capacity of the [`BoardEvents`] channel. Events are dropped, with a
    /// warning, while it is full.
    pub event_capacity: usize,

    /// Reassembly limits for the inbound stream.
    pub reassembler: ReassemblerConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            reassembler: ReassemblerConfig::default(),
        }
    }
}

/// Something the board reported outside a command exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BoardEvent {
    /// A lock changed state on its own (code 0x85).
    StatusUpload {
        address: BoardAddress,
        channel: u8,
        lock_status: LockStatus,
    },

    /// A valid frame arrived while no command was executing.
    Unsolicited(Frame),

    /// The transport reported a read-side error.
    TransportError(String),
}

/// Receiver for [`BoardEvent`]s.
#[derive(Debug)]
pub struct BoardEvents {
    rx: mpsc::Receiver<BoardEvent>,
}

impl BoardEvents {
    /// Receive the next event. Returns `None` once the manager has stopped.
    pub async fn recv(&mut self) -> Option<BoardEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BoardEvent> {
        self.rx.try_recv().ok()
    }
}

/// Snapshot of the queue for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Commands waiting behind the executing one.
    pub pending: usize,

    /// Code of the command currently on the wire.
    pub executing: Option<CommandCode>,

    pub total_enqueued: u64,
    pub total_sent: u64,
    pub total_completed: u64,
    pub total_timeouts: u64,
    /// Failure statuses, write failures and transport errors.
    pub total_errors: u64,
    /// Commands resolved by shutdown.
    pub total_cancelled: u64,

    pub connected: bool,
    pub closed: bool,
}

impl QueueStatus {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.executing.is_none()
    }
}

#[derive(Debug)]
enum ManagerEvent {
    Enqueue(QueuedCommand),
    Frame(Frame),
    TransportError(String),
    InboundClosed,
    Shutdown(Option<oneshot::Sender<()>>),
}

/// Serializes commands onto one transport.
///
/// Created with [`CommandManager::start`], which must be called from within
/// a Tokio runtime. The transport is fixed for the manager's lifetime; to
/// switch transports, [`shutdown`](Self::shutdown) and start a new manager.
/// Dropping the manager shuts it down.
#[derive(Debug)]
pub struct CommandManager {
    tx: mpsc::UnboundedSender<ManagerEvent>,
    closed: Arc<AtomicBool>,
    next_seq: AtomicU64,
    status_rx: watch::Receiver<QueueStatus>,
    parser: SharedStreamParser,
}

impl CommandManager {
    /// Take ownership of `transport` and start the reader and worker tasks.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the reassembler limits are invalid, or an error
    /// if the transport's inbound stream was already taken.
    pub fn start(mut transport: AnyTransport, config: ManagerConfig) -> Result<(Self, BoardEvents)> {
        config.reassembler.validate()?;
        let inbound = transport.take_inbound()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let parser = SharedStreamParser::new(config.reassembler);
        let closed = Arc::new(AtomicBool::new(false));

        let initial = QueueStatus {
            connected: transport.is_connected(),
            ..QueueStatus::default()
        };
        let (status_tx, status_rx) = watch::channel(initial.clone());

        info!("Starting command manager on {}", transport.name());

        let reader = tokio::spawn(reader_task(inbound, parser.clone(), tx.clone()));
        let worker = Worker {
            transport,
            rx,
            events_tx,
            status_tx,
            closed: Arc::clone(&closed),
            reader,
            queue: VecDeque::new(),
            executing: None,
            deadline: None,
            stats: initial,
        };
        tokio::spawn(worker.run());

        let manager = Self {
            tx,
            closed,
            next_seq: AtomicU64::new(0),
            status_rx,
            parser,
        };
        Ok((manager, BoardEvents { rx: events_rx }))
    }

    /// Queue a command and return a ticket for its result.
    ///
    /// Never waits: the command is encoded, appended to the FIFO and the
    /// ticket returned immediately.
    ///
    /// # Errors
    ///
    /// Returns `ManagerClosed` after shutdown, or the encoding error if the
    /// command does not fit in a frame.
    pub fn enqueue(&self, command: LockCommand) -> Result<CommandTicket> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ControlError::ManagerClosed);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (responder, rx) = oneshot::channel();
        let queued = QueuedCommand::new(seq, &command, responder)?;
        let code = queued.code;

        debug!(seq, command = %code, address = %queued.address, "Enqueue");
        self.tx
            .send(ManagerEvent::Enqueue(queued))
            .map_err(|_| ControlError::ManagerClosed)?;

        Ok(CommandTicket::new(seq, code, rx))
    }

    /// Queue a command and wait for its result.
    ///
    /// # Errors
    ///
    /// Any error from [`enqueue`](Self::enqueue) or the command's
    /// resolution: timeout, failure status, transport error or shutdown.
    pub async fn execute(&self, command: LockCommand) -> Result<CommandResponse> {
        self.enqueue(command)?.await
    }

    /// Current queue snapshot.
    pub fn status(&self) -> QueueStatus {
        self.status_rx.borrow().clone()
    }

    /// Bytes held in the reassembly buffer awaiting a complete frame.
    pub fn buffered_bytes(&self) -> usize {
        self.parser.buffered_len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop the manager.
    ///
    /// Queued and executing commands resolve with `ManagerClosed`, the
    /// transport is disconnected and later enqueues fail. Calling it again
    /// is a no-op.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(ManagerEvent::Shutdown(Some(done_tx))).is_ok() {
            let _ = done_rx.await;
        }
    }
}

impl Drop for CommandManager {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(ManagerEvent::Shutdown(None));
        }
    }
}

/// Feed inbound chunks through the reassembler and pass frames on.
async fn reader_task(
    mut inbound: InboundStream,
    parser: SharedStreamParser,
    tx: mpsc::UnboundedSender<ManagerEvent>,
) {
    while let Some(event) = inbound.recv().await {
        let forwarded = match event {
            InboundEvent::Data(chunk) => {
                trace!(len = chunk.len(), "Inbound chunk");
                parser
                    .feed(&chunk)
                    .into_iter()
                    .try_for_each(|frame| tx.send(ManagerEvent::Frame(frame)))
            }
            InboundEvent::Error(message) => tx.send(ManagerEvent::TransportError(message)),
        };
        if forwarded.is_err() {
            return;
        }
    }
    let _ = tx.send(ManagerEvent::InboundClosed);
}

enum Step {
    Event(ManagerEvent),
    Timeout(u64),
    Closed,
}

/// Owns the queue, the executing slot and the transport.
struct Worker {
    transport: AnyTransport,
    rx: mpsc::UnboundedReceiver<ManagerEvent>,
    events_tx: mpsc::Sender<BoardEvent>,
    status_tx: watch::Sender<QueueStatus>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    queue: VecDeque<QueuedCommand>,
    executing: Option<QueuedCommand>,
    /// Response deadline of the executing command, tagged with its seq.
    deadline: Option<(u64, Instant)>,
    stats: QueueStatus,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let step = tokio::select! {
                biased;
                seq = wait_for(self.deadline) => Step::Timeout(seq),
                event = self.rx.recv() => event.map_or(Step::Closed, Step::Event),
            };

            match step {
                Step::Event(ManagerEvent::Enqueue(command)) => self.on_enqueue(command).await,
                Step::Event(ManagerEvent::Frame(frame)) => self.on_frame(frame).await,
                Step::Event(ManagerEvent::TransportError(message)) => {
                    self.on_transport_error(message).await;
                }
                Step::Event(ManagerEvent::InboundClosed) => {
                    self.on_transport_error("inbound stream closed".to_string())
                        .await;
                }
                Step::Event(ManagerEvent::Shutdown(done)) => {
                    self.shutdown().await;
                    if let Some(done) = done {
                        let _ = done.send(());
                    }
                    return;
                }
                Step::Timeout(seq) => self.on_timeout(seq).await,
                Step::Closed => {
                    self.shutdown().await;
                    return;
                }
            }
            self.publish();
        }
    }

    async fn on_enqueue(&mut self, command: QueuedCommand) {
        self.stats.total_enqueued += 1;
        if self.closed.load(Ordering::Acquire) {
            self.stats.total_cancelled += 1;
            command.resolve(Err(ControlError::ManagerClosed));
            return;
        }
        self.queue.push_back(command);
        self.dispatch().await;
    }

    /// Write the head of the queue if nothing is executing. Commands whose
    /// write fails resolve immediately and the next one is tried.
    async fn dispatch(&mut self) {
        while self.executing.is_none() {
            let Some(command) = self.queue.pop_front() else {
                return;
            };

            debug!(
                seq = command.seq,
                command = %command.code,
                timeout_ms = command.timeout.as_millis() as u64,
                "Dispatch"
            );
            self.stats.total_sent += 1;

            match self.transport.write(command.frame.as_bytes()).await {
                Ok(()) => {
                    self.deadline = Some((command.seq, Instant::now() + command.timeout));
                    self.executing = Some(command);
                }
                Err(e) => {
                    warn!(seq = command.seq, command = %command.code, "Write failed: {}", e);
                    self.stats.total_errors += 1;
                    command.resolve(Err(e));
                }
            }
        }
    }

    async fn on_frame(&mut self, frame: Frame) {
        if frame.command() == Some(CommandCode::StatusUpload) {
            self.forward_status_upload(frame);
            return;
        }

        // A deadline that passed before this frame was read wins.
        if let Some((seq, _)) = self.deadline.filter(|&(_, at)| Instant::now() >= at) {
            self.on_timeout(seq).await;
        }

        let Some(command) = self.executing.take_if(|command| command.matches(&frame)) else {
            match &self.executing {
                Some(command) => warn!(
                    seq = command.seq,
                    command = %command.code,
                    "Dropping frame that does not match executing command: {}",
                    frame
                ),
                None => {
                    debug!("Unsolicited frame: {}", frame);
                    self.emit(BoardEvent::Unsolicited(frame));
                }
            }
            return;
        };

        self.deadline = None;
        let status = status_of(&frame);
        let elapsed = command.elapsed();
        debug!(
            seq = command.seq,
            command = %command.code,
            %status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Resolved"
        );

        if status.is_success() {
            self.stats.total_completed += 1;
            command.resolve(Ok(CommandResponse { frame, elapsed }));
        } else {
            self.stats.total_errors += 1;
            let code = command.code;
            command.resolve(Err(ControlError::command_failed(code, status)));
        }
        self.dispatch().await;
    }

    async fn on_timeout(&mut self, seq: u64) {
        self.deadline = None;
        let Some(command) = self.executing.take_if(|command| command.seq == seq) else {
            trace!(seq, "Stale timeout ignored");
            return;
        };

        warn!(
            seq,
            command = %command.code,
            timeout_ms = command.timeout.as_millis() as u64,
            "Command timed out"
        );
        self.stats.total_timeouts += 1;
        let error = ControlError::timeout(command.code, command.timeout);
        command.resolve(Err(error));
        self.dispatch().await;
    }

    async fn on_transport_error(&mut self, message: String) {
        warn!("Transport error on {}: {}", self.transport.name(), message);
        self.emit(BoardEvent::TransportError(message.clone()));

        if let Some(command) = self.executing.take() {
            self.deadline = None;
            self.stats.total_errors += 1;
            command.resolve(Err(ControlError::transport(message)));
            self.dispatch().await;
        }
    }

    fn forward_status_upload(&self, frame: Frame) {
        match BoardResponse::parse(&frame) {
            Ok(BoardResponse::StatusUpload {
                channel,
                lock_status,
            }) => {
                debug!(channel, %lock_status, "Status upload");
                self.emit(BoardEvent::StatusUpload {
                    address: frame.address(),
                    channel,
                    lock_status,
                });
            }
            _ => {
                warn!("Malformed status upload: {}", frame);
                self.emit(BoardEvent::Unsolicited(frame));
            }
        }
    }

    fn emit(&self, event: BoardEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Board event channel full, dropping {:?}", event);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    async fn shutdown(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.deadline = None;

        let cancelled = self
            .executing
            .take()
            .into_iter()
            .chain(self.queue.drain(..));
        let mut count = 0;
        for command in cancelled {
            count += 1;
            command.resolve(Err(ControlError::ManagerClosed));
        }
        self.stats.total_cancelled += count;

        self.reader.abort();
        if let Err(e) = self.transport.disconnect().await {
            warn!("Failed to disconnect {}: {}", self.transport.name(), e);
        }
        self.publish();

        info!(cancelled = count, "Command manager stopped");
    }

    fn publish(&mut self) {
        self.stats.pending = self.queue.len();
        self.stats.executing = self.executing.as_ref().map(|command| command.code);
        self.stats.connected = self.transport.is_connected();
        self.stats.closed = self.closed.load(Ordering::Acquire);
        self.status_tx.send_replace(self.stats.clone());
    }
}

/// Resolve at the deadline, or never when there is none.
async fn wait_for(deadline: Option<(u64, Instant)>) -> u64 {
    match deadline {
        Some((seq, at)) => {
            sleep_until(at).await;
            seq
        }
        None => std::future::pending().await,
    }
}
