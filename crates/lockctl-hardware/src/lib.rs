//! Transport and command execution layer for lock control boards.
//!
//! This crate drives a board over a byte transport using the frame format
//! from `lockctl-protocol`. The protocol allows only one outstanding command
//! per link, so every command goes through a [`CommandManager`] that keeps a
//! FIFO queue, writes one frame at a time and resolves each command by its
//! matching response, a failure status, or a per-command timeout.
//!
//! # Layers
//!
//! - [`traits::Transport`]: the byte stream to the board, implemented by
//!   [`mock::MockTransport`] and, with the `hardware-serial` feature, by
//!   `serial::SerialTransport`. [`devices::AnyTransport`] dispatches
//!   between them.
//! - [`manager::CommandManager`]: queueing, response matching, timeouts
//!   and the unsolicited [`manager::BoardEvents`] stream.
//! - [`controller::LockController`]: one validated async method per
//!   command code.
//!
//! # Example
//!
//! ```
//! use lockctl_core::ControllerConfig;
//! use lockctl_hardware::{LockController, ManagerConfig};
//! use lockctl_hardware::mock::{MockBoard, MockTransport};
//! use lockctl_protocol::BoardResponse;
//!
//! #[tokio::main]
//! async fn main() -> lockctl_hardware::Result<()> {
//!     let config = ControllerConfig { board_address: 0, channel_count: 24 };
//!     let (transport, _handle) = MockTransport::with_board(MockBoard::new(config.address(), 24));
//!     let (controller, _events) =
//!         LockController::start(transport.into(), config, ManagerConfig::default())?;
//!
//!     let response = controller.open_locks_sequentially(&[1, 2, 3]).await?;
//!     assert!(matches!(response, BoardResponse::Ack { .. }));
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! The crate emits `tracing` events and installs no subscriber. Timeouts,
//! dropped frames and transport failures are logged at `warn`.

pub mod controller;
pub mod devices;
pub mod error;
pub mod manager;
pub mod mock;
pub mod queued;
#[cfg(feature = "hardware-serial")]
pub mod serial;
pub mod traits;

pub use controller::LockController;
pub use devices::AnyTransport;
pub use error::{ControlError, Result};
pub use manager::{BoardEvent, BoardEvents, CommandManager, ManagerConfig, QueueStatus};
pub use queued::{CommandResponse, CommandTicket};
#[cfg(feature = "hardware-serial")]
pub use serial::{SerialConfig, SerialTransport};
pub use traits::{InboundEvent, Transport};
