pub mod builder;
pub mod codec;
pub mod commands;
pub mod frame;
pub mod matcher;
pub mod response;
pub mod strategy;
pub mod stream_parser;

pub use builder::{CommandParams, LockCommand, MAX_CHANNELS_PER_COMMAND};
pub use codec::LockBoardCodec;
pub use commands::CommandCode;
pub use frame::{Frame, checksum};
pub use matcher::{ResponseStatus, extract_channel_id, extract_lock_status, is_match, status_of};
pub use response::{AddressedResponse, BoardResponse, ChannelState};
pub use strategy::{execution_time, timeout_for, timeout_for_frame};
pub use stream_parser::{
    DrainFrames, ParserStats, ReassemblerConfig, SharedStreamParser, StreamParser,
};
