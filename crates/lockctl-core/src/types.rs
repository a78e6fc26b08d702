use crate::{
    Result,
    constants::{
        DEFAULT_BOARD_ADDRESS, DEFAULT_CHANNEL_COUNT, LOCK_STATUS_CLOSED, LOCK_STATUS_ERROR,
        LOCK_STATUS_OPEN, MIN_CHANNEL_ID,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a controller board on the serial link.
///
/// The address is carried in every frame but only one board is driven per
/// link, so any byte value is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoardAddress(u8);

impl BoardAddress {
    #[must_use]
    pub const fn new(address: u8) -> Self {
        BoardAddress(address)
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl From<u8> for BoardAddress {
    fn from(address: u8) -> Self {
        BoardAddress(address)
    }
}

impl fmt::Display for BoardAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Channel (lock) number on a board.
///
/// Always at least [`MIN_CHANNEL_ID`]. The upper bound depends on the board
/// and is enforced by [`ChannelRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Create a channel ID, rejecting zero.
    ///
    /// # Errors
    /// Returns `Error::InvalidChannel` if `id` is below [`MIN_CHANNEL_ID`].
    pub fn new(id: u8) -> Result<Self> {
        if id < MIN_CHANNEL_ID {
            return Err(Error::InvalidChannel {
                channel: id,
                min: MIN_CHANNEL_ID,
                max: u8::MAX,
            });
        }
        Ok(ChannelId(id))
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Valid channel numbers for a specific board (`1..=count`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRange {
    count: u8,
}

impl ChannelRange {
    /// # Errors
    /// Returns `Error::InvalidChannelCount` for a board with no channels.
    pub fn new(count: u8) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidChannelCount(
                "board must have at least one channel".to_string(),
            ));
        }
        Ok(ChannelRange { count })
    }

    #[must_use]
    pub fn count(&self) -> u8 {
        self.count
    }

    #[must_use]
    pub fn contains(&self, id: u8) -> bool {
        (MIN_CHANNEL_ID..=self.count).contains(&id)
    }

    /// Validate a raw channel number against this board.
    ///
    /// # Errors
    /// Returns `Error::InvalidChannel` if `id` is outside `1..=count`.
    pub fn channel(&self, id: u8) -> Result<ChannelId> {
        if !self.contains(id) {
            return Err(Error::InvalidChannel {
                channel: id,
                min: MIN_CHANNEL_ID,
                max: self.count,
            });
        }
        Ok(ChannelId(id))
    }

    /// Validate a list of channel numbers.
    ///
    /// # Errors
    /// Returns `Error::InvalidChannelCount` for an empty list, or the first
    /// `Error::InvalidChannel` encountered.
    pub fn channels(&self, ids: &[u8]) -> Result<Vec<ChannelId>> {
        if ids.is_empty() {
            return Err(Error::InvalidChannelCount(
                "at least one channel is required".to_string(),
            ));
        }
        ids.iter().map(|&id| self.channel(id)).collect()
    }
}

impl Default for ChannelRange {
    fn default() -> Self {
        ChannelRange {
            count: DEFAULT_CHANNEL_COUNT,
        }
    }
}

/// Physical state of a lock as reported by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    Open,
    Closed,
    Error,
    Unknown(u8),
}

impl LockStatus {
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        match self {
            LockStatus::Open => LOCK_STATUS_OPEN,
            LockStatus::Closed => LOCK_STATUS_CLOSED,
            LockStatus::Error => LOCK_STATUS_ERROR,
            LockStatus::Unknown(b) => *b,
        }
    }

    /// `true` when the door is closed and latched.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self, LockStatus::Closed)
    }
}

impl From<u8> for LockStatus {
    fn from(b: u8) -> Self {
        match b {
            LOCK_STATUS_OPEN => LockStatus::Open,
            LOCK_STATUS_CLOSED => LockStatus::Closed,
            LOCK_STATUS_ERROR => LockStatus::Error,
            other => LockStatus::Unknown(other),
        }
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LockStatus::Open => write!(f, "open"),
            LockStatus::Closed => write!(f, "closed"),
            LockStatus::Error => write!(f, "error"),
            LockStatus::Unknown(b) => write!(f, "unknown(0x{b:02X})"),
        }
    }
}

/// Board-level settings used to validate caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Address placed in every outgoing frame.
    pub board_address: u8,

    /// Number of channels wired on the board.
    pub channel_count: u8,
}

impl ControllerConfig {
    /// # Errors
    /// Returns `Error::InvalidChannelCount` if `channel_count` is zero.
    pub fn channel_range(&self) -> Result<ChannelRange> {
        ChannelRange::new(self.channel_count)
    }

    #[must_use]
    pub fn address(&self) -> BoardAddress {
        BoardAddress(self.board_address)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            board_address: DEFAULT_BOARD_ADDRESS,
            channel_count: DEFAULT_CHANNEL_COUNT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_channel_id_rejects_zero() {
        assert!(ChannelId::new(0).is_err());
        assert_eq!(ChannelId::new(1).unwrap().as_u8(), 1);
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(12, true)]
    #[case(13, false)]
    #[case(255, false)]
    fn test_channel_range_default(#[case] id: u8, #[case] valid: bool) {
        let range = ChannelRange::default();
        assert_eq!(range.contains(id), valid);
        assert_eq!(range.channel(id).is_ok(), valid);
    }

    #[test]
    fn test_channel_range_24() {
        let range = ChannelRange::new(24).unwrap();
        assert!(range.channel(24).is_ok());
        assert!(matches!(
            range.channel(25),
            Err(Error::InvalidChannel {
                channel: 25,
                min: 1,
                max: 24
            })
        ));
    }

    #[test]
    fn test_channel_range_zero_count() {
        assert!(ChannelRange::new(0).is_err());
    }

    #[test]
    fn test_channels_list() {
        let range = ChannelRange::default();
        let ids = range.channels(&[1, 3, 5]).unwrap();
        assert_eq!(ids.len(), 3);
        assert!(range.channels(&[]).is_err());
        assert!(range.channels(&[1, 0]).is_err());
    }

    #[rstest]
    #[case(0x00, LockStatus::Open)]
    #[case(0x01, LockStatus::Closed)]
    #[case(0xFF, LockStatus::Error)]
    #[case(0x42, LockStatus::Unknown(0x42))]
    fn test_lock_status_from_byte(#[case] byte: u8, #[case] expected: LockStatus) {
        let status = LockStatus::from(byte);
        assert_eq!(status, expected);
        assert_eq!(status.as_u8(), byte);
    }

    #[test]
    fn test_lock_status_is_locked() {
        assert!(LockStatus::Closed.is_locked());
        assert!(!LockStatus::Open.is_locked());
        assert!(!LockStatus::Error.is_locked());
    }

    #[test]
    fn test_board_address_display() {
        assert_eq!(BoardAddress::new(0x0A).to_string(), "0x0A");
    }

    #[test]
    fn test_controller_config_default() {
        let config = ControllerConfig::default();
        assert_eq!(config.board_address, 0x00);
        assert_eq!(config.channel_range().unwrap().count(), 12);
    }
}
