//! Caller-facing lock control API.
//!
//! [`LockController`] validates channel numbers against the board's
//! [`ControllerConfig`], builds the matching [`LockCommand`], runs it
//! through the [`CommandManager`] and parses the reply. Invalid input is
//! rejected before anything reaches the queue.

use crate::{
    Result,
    devices::AnyTransport,
    manager::{BoardEvents, CommandManager, ManagerConfig, QueueStatus},
};
use lockctl_core::{BoardAddress, ChannelRange, ControllerConfig, LockStatus};
use lockctl_protocol::{BoardResponse, ChannelState, LockCommand};
use tracing::debug;

/// High-level handle to one lock control board.
///
/// # Examples
///
/// ```
/// use lockctl_core::{ControllerConfig, LockStatus};
/// use lockctl_hardware::LockController;
/// use lockctl_hardware::manager::ManagerConfig;
/// use lockctl_hardware::mock::{MockBoard, MockTransport};
///
/// #[tokio::main]
/// async fn main() -> lockctl_hardware::Result<()> {
///     let config = ControllerConfig::default();
///     let board = MockBoard::new(config.address(), config.channel_count);
///     let (transport, _handle) = MockTransport::with_board(board);
///
///     let (controller, _events) =
///         LockController::start(transport.into(), config, ManagerConfig::default())?;
///
///     controller.open_lock(3).await?;
///     assert_eq!(controller.lock_status(3).await?, LockStatus::Open);
///
///     controller.shutdown().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct LockController {
    manager: CommandManager,
    address: BoardAddress,
    range: ChannelRange,
}

impl LockController {
    /// Wrap an already running manager.
    ///
    /// # Errors
    ///
    /// Returns `InvalidChannelCount` if the config declares no channels.
    pub fn new(manager: CommandManager, config: ControllerConfig) -> Result<Self> {
        Ok(Self {
            manager,
            address: config.address(),
            range: config.channel_range()?,
        })
    }

    /// Start a manager on `transport` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the manager cannot
    /// take the transport's inbound stream.
    pub fn start(
        transport: AnyTransport,
        config: ControllerConfig,
        manager_config: ManagerConfig,
    ) -> Result<(Self, BoardEvents)> {
        let range = config.channel_range()?;
        let (manager, events) = CommandManager::start(transport, manager_config)?;
        let controller = Self {
            manager,
            address: config.address(),
            range,
        };
        Ok((controller, events))
    }

    /// Open several locks at once (0x80).
    pub async fn open_locks_simultaneously(&self, channels: &[u8]) -> Result<BoardResponse> {
        let channels = self.range.channels(channels)?;
        self.run(LockCommand::open_simultaneous(self.address, channels)?)
            .await
    }

    /// Blink a channel's indicator (0x81).
    pub async fn flash_channel(&self, channel: u8) -> Result<BoardResponse> {
        let channel = self.range.channel(channel)?;
        self.run(LockCommand::flash_channel(self.address, channel))
            .await
    }

    /// Open one lock (0x82).
    pub async fn open_lock(&self, channel: u8) -> Result<BoardResponse> {
        let channel = self.range.channel(channel)?;
        self.run(LockCommand::open_single(self.address, channel))
            .await
    }

    /// Read one lock's status (0x83).
    pub async fn query_lock(&self, channel: u8) -> Result<BoardResponse> {
        let channel = self.range.channel(channel)?;
        self.run(LockCommand::query_single(self.address, channel))
            .await
    }

    /// Read every lock's status (0x84).
    pub async fn query_all_locks(&self) -> Result<BoardResponse> {
        self.run(LockCommand::query_all(self.address)).await
    }

    /// Open every lock on the board (0x86).
    pub async fn open_all_locks(&self) -> Result<BoardResponse> {
        self.run(LockCommand::open_all(self.address)).await
    }

    /// Open several locks one after another (0x87).
    pub async fn open_locks_sequentially(&self, channels: &[u8]) -> Result<BoardResponse> {
        let channels = self.range.channels(channels)?;
        self.run(LockCommand::open_sequential(self.address, channels)?)
            .await
    }

    /// Hold a channel energized (0x88).
    pub async fn keep_channel_open(&self, channel: u8) -> Result<BoardResponse> {
        let channel = self.range.channel(channel)?;
        self.run(LockCommand::keep_open(self.address, channel)).await
    }

    /// Release a channel (0x89).
    pub async fn close_channel(&self, channel: u8) -> Result<BoardResponse> {
        let channel = self.range.channel(channel)?;
        self.run(LockCommand::close_channel(self.address, channel))
            .await
    }

    /// Convenience over [`query_lock`](Self::query_lock) returning only the
    /// lock status.
    ///
    /// # Errors
    ///
    /// Besides command errors, returns `InvalidResponse` if the reply
    /// carries no lock status.
    pub async fn lock_status(&self, channel: u8) -> Result<LockStatus> {
        match self.query_lock(channel).await? {
            BoardResponse::LockState { lock_status, .. } => Ok(lock_status),
            other => Err(unexpected(&other)),
        }
    }

    /// Convenience over [`query_all_locks`](Self::query_all_locks)
    /// returning the per-channel states.
    pub async fn all_lock_states(&self) -> Result<Vec<ChannelState>> {
        match self.query_all_locks().await? {
            BoardResponse::AllLocks { channels, .. } => Ok(channels),
            other => Err(unexpected(&other)),
        }
    }

    pub fn status(&self) -> QueueStatus {
        self.manager.status()
    }

    pub fn manager(&self) -> &CommandManager {
        &self.manager
    }

    pub fn channel_range(&self) -> ChannelRange {
        self.range
    }

    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }

    async fn run(&self, command: LockCommand) -> Result<BoardResponse> {
        let code = command.code();
        let response = self.manager.execute(command).await?;
        let parsed = response.parse()?;
        debug!(command = %code, elapsed_ms = response.elapsed.as_millis() as u64, "Command succeeded");
        Ok(parsed)
    }
}

fn unexpected(response: &BoardResponse) -> crate::error::ControlError {
    lockctl_core::Error::InvalidResponse(format!(
        "unexpected response shape for {}",
        response.command()
    ))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControlError;
    use crate::mock::{MockBoard, MockTransport, MockTransportHandle};
    use rstest::rstest;

    fn controller(channels: u8) -> (LockController, BoardEvents, MockTransportHandle) {
        let config = ControllerConfig {
            board_address: 0x00,
            channel_count: channels,
        };
        let board = MockBoard::new(config.address(), channels);
        let (transport, handle) = MockTransport::with_board(board);
        let (controller, events) =
            LockController::start(transport.into(), config, ManagerConfig::default()).unwrap();
        (controller, events, handle)
    }

    #[rstest]
    #[case(0)]
    #[case(13)]
    #[tokio::test]
    async fn test_invalid_channel_rejected_before_send(#[case] channel: u8) {
        let (controller, _events, mut handle) = controller(12);

        let result = controller.open_lock(channel).await;
        assert!(matches!(
            result,
            Err(ControlError::Protocol(lockctl_core::Error::InvalidChannel { .. }))
        ));
        assert!(handle.try_next_write().is_none());
        assert_eq!(controller.status().total_enqueued, 0);
    }

    #[tokio::test]
    async fn test_empty_channel_list_rejected() {
        let (controller, _events, handle) = controller(12);
        assert!(controller.open_locks_sequentially(&[]).await.is_err());
        assert!(controller.open_locks_simultaneously(&[]).await.is_err());
        assert_eq!(handle.write_count(), 0);
    }

    #[tokio::test]
    async fn test_open_and_query() {
        let (controller, _events, handle) = controller(12);

        let response = controller.open_lock(5).await.unwrap();
        assert!(matches!(
            response,
            BoardResponse::LockState {
                channel: 5,
                lock_status: LockStatus::Open,
                ..
            }
        ));
        assert_eq!(handle.lock_status(5), Some(LockStatus::Open));
        assert_eq!(controller.lock_status(4).await.unwrap(), LockStatus::Closed);
    }

    #[tokio::test]
    async fn test_query_all_states() {
        let (controller, _events, _handle) = controller(4);
        controller.open_locks_simultaneously(&[2, 3]).await.unwrap();

        let states = controller.all_lock_states().await.unwrap();
        let locked: Vec<bool> = states.iter().map(|s| s.locked).collect();
        assert_eq!(locked, vec![true, false, false, true]);
        assert_eq!(states[1].channel, 2);
    }

    #[tokio::test]
    async fn test_channel_commands() {
        let (controller, _events, handle) = controller(4);

        controller.keep_channel_open(1).await.unwrap();
        assert_eq!(handle.lock_status(1), Some(LockStatus::Open));

        let response = controller.close_channel(1).await.unwrap();
        assert!(matches!(response, BoardResponse::Channel { channel: 1, .. }));
        assert_eq!(handle.lock_status(1), Some(LockStatus::Closed));

        assert!(controller.flash_channel(2).await.is_ok());
        assert!(controller.open_all_locks().await.is_ok());
        assert_eq!(handle.lock_status(4), Some(LockStatus::Open));
    }

    #[tokio::test]
    async fn test_zero_channel_config_rejected() {
        let config = ControllerConfig {
            board_address: 0,
            channel_count: 0,
        };
        let (transport, _handle) = MockTransport::new();
        let result = LockController::start(transport.into(), config, ManagerConfig::default());
        assert!(result.is_err());
    }
}
