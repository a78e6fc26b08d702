use crate::{commands::CommandCode, frame::Frame, strategy};
use lockctl_core::{BoardAddress, ChannelId, Error, Result, constants::MAX_PAYLOAD_LEN};
use std::time::Duration;

/// Largest number of lock IDs a multi-lock command can carry: the payload
/// holds a count byte followed by one byte per lock.
pub const MAX_CHANNELS_PER_COMMAND: usize = MAX_PAYLOAD_LEN - 1;

/// Parameters carried by a command, by payload shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParams {
    None,
    Channel(ChannelId),
    Channels(Vec<ChannelId>),
}

/// A validated logical command addressed to one board.
///
/// Construct with one of the per-command constructors, then call
/// [`encode`](LockCommand::encode) to obtain the wire frame.
///
/// # Example
/// ```
/// use lockctl_core::{BoardAddress, ChannelId};
/// use lockctl_protocol::{CommandCode, LockCommand};
///
/// let cmd = LockCommand::open_single(BoardAddress::new(0), ChannelId::new(1).unwrap());
/// assert_eq!(cmd.code(), CommandCode::OpenSingle);
/// assert_eq!(cmd.encode().unwrap().to_string(), "57 4B 4C 59 09 00 82 01 83");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockCommand {
    address: BoardAddress,
    code: CommandCode,
    params: CommandParams,
}

impl LockCommand {
    /// Open several locks at once (`0x80`).
    ///
    /// # Errors
    /// Returns `Error::InvalidChannelCount` for an empty list or one that does
    /// not fit in a frame.
    pub fn open_simultaneous(address: BoardAddress, channels: Vec<ChannelId>) -> Result<Self> {
        Self::multi(address, CommandCode::OpenSimultaneous, channels)
    }

    /// Blink the indicator on a channel (`0x81`).
    pub fn flash_channel(address: BoardAddress, channel: ChannelId) -> Self {
        Self::single(address, CommandCode::FlashChannel, channel)
    }

    /// Open one lock (`0x82`).
    pub fn open_single(address: BoardAddress, channel: ChannelId) -> Self {
        Self::single(address, CommandCode::OpenSingle, channel)
    }

    /// Read the state of one lock (`0x83`).
    pub fn query_single(address: BoardAddress, channel: ChannelId) -> Self {
        Self::single(address, CommandCode::QuerySingle, channel)
    }

    /// Read the state of every lock (`0x84`).
    pub fn query_all(address: BoardAddress) -> Self {
        Self::bare(address, CommandCode::QueryAll)
    }

    /// Open every lock on the board (`0x86`).
    pub fn open_all(address: BoardAddress) -> Self {
        Self::bare(address, CommandCode::OpenAll)
    }

    /// Open several locks one after another (`0x87`).
    ///
    /// # Errors
    /// Same as [`open_simultaneous`](LockCommand::open_simultaneous).
    pub fn open_sequential(address: BoardAddress, channels: Vec<ChannelId>) -> Result<Self> {
        Self::multi(address, CommandCode::OpenSequential, channels)
    }

    /// Hold a channel open (`0x88`).
    pub fn keep_open(address: BoardAddress, channel: ChannelId) -> Self {
        Self::single(address, CommandCode::KeepOpen, channel)
    }

    /// Release a held channel (`0x89`).
    pub fn close_channel(address: BoardAddress, channel: ChannelId) -> Self {
        Self::single(address, CommandCode::CloseChannel, channel)
    }

    fn bare(address: BoardAddress, code: CommandCode) -> Self {
        LockCommand {
            address,
            code,
            params: CommandParams::None,
        }
    }

    fn single(address: BoardAddress, code: CommandCode, channel: ChannelId) -> Self {
        LockCommand {
            address,
            code,
            params: CommandParams::Channel(channel),
        }
    }

    fn multi(address: BoardAddress, code: CommandCode, channels: Vec<ChannelId>) -> Result<Self> {
        if channels.is_empty() {
            return Err(Error::InvalidChannelCount(
                "at least one channel is required".to_string(),
            ));
        }
        if channels.len() > MAX_CHANNELS_PER_COMMAND {
            return Err(Error::InvalidChannelCount(format!(
                "{} channels requested, at most {} fit in one frame",
                channels.len(),
                MAX_CHANNELS_PER_COMMAND
            )));
        }
        Ok(LockCommand {
            address,
            code,
            params: CommandParams::Channels(channels),
        })
    }

    pub fn address(&self) -> BoardAddress {
        self.address
    }

    pub fn code(&self) -> CommandCode {
        self.code
    }

    pub fn params(&self) -> &CommandParams {
        &self.params
    }

    /// Payload bytes in wire order.
    pub fn payload(&self) -> Vec<u8> {
        match &self.params {
            CommandParams::None => Vec::new(),
            CommandParams::Channel(ch) => vec![ch.as_u8()],
            CommandParams::Channels(chs) => {
                let mut out = Vec::with_capacity(chs.len() + 1);
                out.push(chs.len() as u8);
                out.extend(chs.iter().map(ChannelId::as_u8));
                out
            }
        }
    }

    /// Response window for this command.
    pub fn timeout(&self) -> Duration {
        strategy::timeout_for(self.code.as_u8(), &self.payload())
    }

    /// # Errors
    /// Returns `Error::PayloadTooLarge` if the payload does not fit. The
    /// constructors already bound channel lists, so this only fails for
    /// commands assembled elsewhere.
    pub fn encode(&self) -> Result<Frame> {
        Frame::encode(self.address, self.code.as_u8(), &self.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ch(id: u8) -> ChannelId {
        ChannelId::new(id).unwrap()
    }

    fn chs(ids: &[u8]) -> Vec<ChannelId> {
        ids.iter().map(|&id| ch(id)).collect()
    }

    const BOARD: BoardAddress = BoardAddress::new(0x00);

    #[rstest]
    #[case(LockCommand::flash_channel(BOARD, ch(1)), "57 4B 4C 59 09 00 81 01 80")]
    #[case(LockCommand::open_single(BOARD, ch(1)), "57 4B 4C 59 09 00 82 01 83")]
    #[case(LockCommand::query_single(BOARD, ch(1)), "57 4B 4C 59 09 00 83 01 82")]
    #[case(LockCommand::query_all(BOARD), "57 4B 4C 59 08 00 84 85")]
    #[case(LockCommand::open_all(BOARD), "57 4B 4C 59 08 00 86 87")]
    #[case(
        LockCommand::open_simultaneous(BOARD, chs(&[1, 2, 3])).unwrap(),
        "57 4B 4C 59 0C 00 80 03 01 02 03 86"
    )]
    #[case(
        LockCommand::open_sequential(BOARD, chs(&[1, 2, 3])).unwrap(),
        "57 4B 4C 59 0C 00 87 03 01 02 03 81"
    )]
    fn test_encode_commands(#[case] cmd: LockCommand, #[case] expected: &str) {
        assert_eq!(cmd.encode().unwrap().to_string(), expected);
    }

    #[test]
    fn test_board_address_in_frame() {
        let frame = LockCommand::open_single(BoardAddress::new(0x0A), ch(1))
            .encode()
            .unwrap();
        assert_eq!(frame.to_string(), "57 4B 4C 59 09 0A 82 01 89");
        assert_eq!(frame.address(), BoardAddress::new(0x0A));
    }

    #[test]
    fn test_keep_open_and_close_payloads() {
        assert_eq!(LockCommand::keep_open(BOARD, ch(5)).payload(), vec![5]);
        let close = LockCommand::close_channel(BOARD, ch(7));
        assert_eq!(close.code(), CommandCode::CloseChannel);
        assert_eq!(close.params(), &CommandParams::Channel(ch(7)));
    }

    #[test]
    fn test_multi_rejects_empty() {
        assert!(matches!(
            LockCommand::open_simultaneous(BOARD, vec![]),
            Err(Error::InvalidChannelCount(_))
        ));
        assert!(LockCommand::open_sequential(BOARD, vec![]).is_err());
    }

    #[test]
    fn test_multi_channel_limit() {
        let fits = vec![ch(1); MAX_CHANNELS_PER_COMMAND];
        let cmd = LockCommand::open_sequential(BOARD, fits).unwrap();
        assert_eq!(cmd.encode().unwrap().len(), 255);

        let too_many = vec![ch(1); MAX_CHANNELS_PER_COMMAND + 1];
        assert!(LockCommand::open_sequential(BOARD, too_many).is_err());
    }

    #[test]
    fn test_timeout_follows_lock_count() {
        let seq = LockCommand::open_sequential(BOARD, chs(&[1, 2, 3])).unwrap();
        assert_eq!(seq.timeout(), Duration::from_millis(2100));
        assert_eq!(
            LockCommand::query_all(BOARD).timeout(),
            Duration::from_millis(400)
        );
    }
}
