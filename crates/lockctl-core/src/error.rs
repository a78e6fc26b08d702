use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Caller input errors
    #[error("Invalid channel {channel}: valid range is {min}-{max}")]
    InvalidChannel { channel: u8, min: u8, max: u8 },

    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(String),

    #[error("Invalid command code: 0x{0:02X}")]
    InvalidCommandCode(u8),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    // Frame errors
    #[error("Frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("Frame marker mismatch")]
    MarkerMismatch,

    #[error("Frame length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Byte stream errors surfaced through codec adapters
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl Error {
    /// Returns `true` for errors raised while validating received bytes.
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            Self::FrameTooShort(_)
                | Self::MarkerMismatch
                | Self::LengthMismatch { .. }
                | Self::ChecksumMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidChannel {
            channel: 13,
            min: 1,
            max: 12,
        };
        assert_eq!(err.to_string(), "Invalid channel 13: valid range is 1-12");

        let err = Error::ChecksumMismatch {
            expected: 0x0A,
            actual: 0xFF,
        };
        assert_eq!(err.to_string(), "Checksum mismatch: expected 0x0A, got 0xFF");
    }

    #[test]
    fn test_is_frame_error() {
        assert!(Error::MarkerMismatch.is_frame_error());
        assert!(Error::FrameTooShort(3).is_frame_error());
        assert!(!Error::InvalidCommandCode(0x10).is_frame_error());
        assert!(!Error::Config("x".into()).is_frame_error());
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        assert_eq!(Error::from(io), Error::Io("pipe closed".to_string()));
    }
}
