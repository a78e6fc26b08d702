//! Simulated lock control board.
//!
//! [`MockBoard`] keeps per-channel lock state and produces the response
//! frame a real board would send for each request. It is attached to a
//! [`MockTransport`](super::MockTransport) to auto-answer writes.

use lockctl_core::{
    BoardAddress, LockStatus,
    constants::{LOCK_STATUS_OPEN, STATUS_FAILURE, STATUS_SUCCESS},
};
use lockctl_protocol::{CommandCode, Frame, execution_time};
use std::collections::HashSet;
use std::time::Duration;

/// How long the simulated board takes to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Latency {
    /// Answer as soon as the request is written.
    #[default]
    Immediate,

    /// Same delay for every command.
    Fixed(Duration),

    /// The nominal execution time of each command.
    Realistic,
}

/// In-memory model of a board and its locks.
///
/// All locks start closed.
///
/// # Examples
///
/// ```
/// use lockctl_core::{BoardAddress, LockStatus};
/// use lockctl_hardware::mock::MockBoard;
/// use lockctl_protocol::{CommandCode, Frame};
///
/// let mut board = MockBoard::new(BoardAddress::new(0), 12);
/// let request = Frame::decode(&[0x57, 0x4B, 0x4C, 0x59, 0x09, 0x00, 0x82, 0x01, 0x83]).unwrap();
///
/// let (_, reply) = board.handle(&request).unwrap();
/// assert_eq!(reply.command(), Some(CommandCode::OpenSingle));
/// assert_eq!(board.lock_status(1), Some(LockStatus::Open));
/// ```
#[derive(Debug, Clone)]
pub struct MockBoard {
    address: BoardAddress,
    locks: Vec<LockStatus>,
    latency: Latency,
    silent: HashSet<CommandCode>,
    failing: HashSet<CommandCode>,
}

impl MockBoard {
    pub fn new(address: BoardAddress, channel_count: u8) -> Self {
        Self {
            address,
            locks: vec![LockStatus::Closed; usize::from(channel_count)],
            latency: Latency::Immediate,
            silent: HashSet::new(),
            failing: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Latency) -> Self {
        self.latency = latency;
        self
    }

    /// Never answer `code`.
    #[must_use]
    pub fn silent_on(mut self, code: CommandCode) -> Self {
        self.silent.insert(code);
        self
    }

    /// Answer `code` with a failure status.
    #[must_use]
    pub fn failing_on(mut self, code: CommandCode) -> Self {
        self.failing.insert(code);
        self
    }

    pub fn address(&self) -> BoardAddress {
        self.address
    }

    pub fn channel_count(&self) -> u8 {
        u8::try_from(self.locks.len()).unwrap_or(u8::MAX)
    }

    pub fn lock_status(&self, channel: u8) -> Option<LockStatus> {
        self.index(channel).map(|i| self.locks[i])
    }

    /// Change a lock as if someone moved the door, returning the status
    /// upload frame the board would emit.
    pub fn set_lock_status(&mut self, channel: u8, status: LockStatus) -> Option<Frame> {
        let index = self.index(channel)?;
        self.locks[index] = status;
        Frame::encode(
            self.address,
            CommandCode::StatusUpload.as_u8(),
            &[channel, status.as_u8()],
        )
        .ok()
    }

    /// Produce the reply for `request`, with the delay before it is sent.
    ///
    /// Returns `None` when the board would stay silent: another board's
    /// address, an unknown or inbound-only code, or a code marked silent.
    pub fn handle(&mut self, request: &Frame) -> Option<(Duration, Frame)> {
        if request.address() != self.address {
            return None;
        }
        let code = request.command()?;
        if code.is_inbound_only() || self.silent.contains(&code) {
            return None;
        }

        let payload = request.payload();
        let reply = if self.failing.contains(&code) {
            failure_payload(code, payload)
        } else {
            self.apply(code, payload)
        };

        let delay = match self.latency {
            Latency::Immediate => Duration::ZERO,
            Latency::Fixed(delay) => delay,
            Latency::Realistic => execution_time(code.as_u8(), payload),
        };

        Frame::encode(self.address, code.as_u8(), &reply)
            .ok()
            .map(|frame| (delay, frame))
    }

    fn apply(&mut self, code: CommandCode, payload: &[u8]) -> Vec<u8> {
        let channel = payload.first().copied().unwrap_or(0);

        match code {
            CommandCode::OpenSimultaneous | CommandCode::OpenSequential => {
                let channels = payload.get(1..).unwrap_or_default();
                if channels.is_empty() || channels.iter().any(|&ch| self.index(ch).is_none()) {
                    return vec![STATUS_FAILURE];
                }
                for &ch in channels {
                    self.set(ch, LockStatus::Open);
                }
                vec![STATUS_SUCCESS]
            }
            CommandCode::OpenAll => {
                self.locks.fill(LockStatus::Open);
                vec![STATUS_SUCCESS]
            }
            CommandCode::OpenSingle => {
                if self.set(channel, LockStatus::Open) {
                    vec![STATUS_SUCCESS, channel, LOCK_STATUS_OPEN]
                } else {
                    failure_payload(code, payload)
                }
            }
            CommandCode::QuerySingle => match self.lock_status(channel) {
                Some(status) => vec![STATUS_SUCCESS, channel, status.as_u8()],
                None => failure_payload(code, payload),
            },
            CommandCode::QueryAll => {
                let mut reply = Vec::with_capacity(self.locks.len() + 2);
                reply.push(STATUS_SUCCESS);
                reply.push(self.channel_count());
                reply.extend(self.locks.iter().map(LockStatus::as_u8));
                reply
            }
            CommandCode::KeepOpen | CommandCode::FlashChannel | CommandCode::CloseChannel => {
                let updated = match code {
                    CommandCode::KeepOpen => self.set(channel, LockStatus::Open),
                    CommandCode::CloseChannel => self.set(channel, LockStatus::Closed),
                    _ => self.index(channel).is_some(),
                };
                if updated {
                    vec![STATUS_SUCCESS, channel]
                } else {
                    failure_payload(code, payload)
                }
            }
            CommandCode::StatusUpload => Vec::new(),
        }
    }

    fn set(&mut self, channel: u8, status: LockStatus) -> bool {
        match self.index(channel) {
            Some(i) => {
                self.locks[i] = status;
                true
            }
            None => false,
        }
    }

    fn index(&self, channel: u8) -> Option<usize> {
        let index = usize::from(channel).checked_sub(1)?;
        (index < self.locks.len()).then_some(index)
    }
}

/// Reply shape for a failed command: the usual fields with 0xFF status.
fn failure_payload(code: CommandCode, payload: &[u8]) -> Vec<u8> {
    let channel = payload.first().copied().unwrap_or(0);
    if code.response_has_lock_status() {
        vec![STATUS_FAILURE, channel, STATUS_FAILURE]
    } else if code.response_has_channel() {
        vec![STATUS_FAILURE, channel]
    } else {
        vec![STATUS_FAILURE]
    }
}
