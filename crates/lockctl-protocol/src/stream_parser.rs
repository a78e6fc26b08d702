//! Stream reassembler for lock board frames.
//!
//! The serial link delivers bytes in arbitrary chunks: a read may hold half a
//! frame, several frames, or line noise. [`StreamParser`] buffers what it is
//! fed, locates frames by their four-byte marker and length byte, validates
//! them and queues the good ones.
//!
//! # Extraction Loop
//!
//! Each call to [`StreamParser::feed`] repeats until it can make no progress:
//!
//! 1. Search for the marker `57 4B 4C 59`.
//! 2. No marker: if more than `noise_threshold` bytes are buffered, drop them
//!    (desync recovery). Otherwise wait for more data.
//! 3. Marker found: discard anything before it.
//! 4. Wait until the length byte is available. A length outside `8..=255`
//!    cannot start a real frame, so skip one byte and search again.
//! 5. Wait until the whole frame is buffered, then remove it and validate.
//!    Valid frames are queued; invalid ones are logged and dropped.
//!
//! Every pass either removes bytes from the buffer or returns, so a call
//! always finishes. Whatever is left afterwards is dropped if it exceeds
//! `max_buffer`; frames completed by the same chunk are kept.
//!
//! # Usage
//!
//! ```
//! use lockctl_protocol::StreamParser;
//!
//! let mut parser = StreamParser::new();
//!
//! parser.feed(&[0x00, 0x13, 0x57, 0x4B]);
//! parser.feed(&[0x4C, 0x59, 0x09, 0x00, 0x82]);
//! assert_eq!(parser.frames_available(), 0);
//!
//! parser.feed(&[0x01, 0x83]);
//! let frame = parser.next_frame().unwrap();
//! assert_eq!(frame.to_string(), "57 4B 4C 59 09 00 82 01 83");
//! ```

use bytes::{Buf, BytesMut};
use lockctl_core::{Error, Result};
use lockctl_core::constants::{
    FRAME_MARKER, LENGTH_OFFSET, MAX_FRAME_LEN, MAX_STREAM_BUFFER, MIN_FRAME_LEN, NOISE_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{trace, warn};

use crate::frame::Frame;

/// Initial buffer capacity; comfortably holds one maximum-length frame.
const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Limits applied by the reassembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblerConfig {
    /// Buffered bytes without any marker after which the buffer is dropped.
    pub noise_threshold: usize,

    /// Cap on bytes left over once every complete frame has been
    /// extracted. Exceeding it drops the leftover.
    pub max_buffer: usize,
}

impl ReassemblerConfig {
    /// Check that the limits can hold a maximum-length frame.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `max_buffer` is smaller than one maximum-length
    /// frame or `noise_threshold` exceeds `max_buffer`.
    pub fn validate(&self) -> Result<()> {
        if self.max_buffer < MAX_FRAME_LEN {
            return Err(Error::Config(format!(
                "max_buffer {} is smaller than a {MAX_FRAME_LEN}-byte frame",
                self.max_buffer
            )));
        }
        if self.noise_threshold > self.max_buffer {
            return Err(Error::Config(format!(
                "noise_threshold {} exceeds max_buffer {}",
                self.noise_threshold, self.max_buffer
            )));
        }
        Ok(())
    }
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self {
            noise_threshold: NOISE_THRESHOLD,
            max_buffer: MAX_STREAM_BUFFER,
        }
    }
}

/// Counters kept by a [`StreamParser`] over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParserStats {
    pub frames_emitted: u64,
    pub invalid_frames: u64,
    pub bytes_discarded: u64,
    pub desync_clears: u64,
}

/// Stateful frame reassembler.
#[derive(Debug)]
pub struct StreamParser {
    buffer: BytesMut,
    frames: VecDeque<Frame>,
    config: ReassemblerConfig,
    stats: ParserStats,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::with_config(ReassemblerConfig::default())
    }

    pub fn with_config(config: ReassemblerConfig) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            frames: VecDeque::new(),
            config,
            stats: ParserStats::default(),
        }
    }

    /// Append a chunk and extract every complete frame it finishes.
    ///
    /// Returns the number of frames queued by this call.
    pub fn feed(&mut self, chunk: &[u8]) -> usize {
        self.buffer.extend_from_slice(chunk);

        let before = self.frames.len();
        while self.try_extract_frame() {}

        // Only bytes that did not complete a frame count against the cap.
        if self.buffer.len() > self.config.max_buffer {
            warn!(
                buffered = self.buffer.len(),
                max = self.config.max_buffer,
                "reassembly buffer overflow, clearing"
            );
            self.discard_all();
        }

        self.frames.len() - before
    }

    /// Feed a chunk and hand back the frames it completed.
    pub fn feed_and_drain(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.feed(chunk);
        self.drain_frames().collect()
    }

    pub fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    pub fn frames_available(&self) -> usize {
        self.frames.len()
    }

    /// Bytes held waiting for the rest of a frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    pub fn config(&self) -> &ReassemblerConfig {
        &self.config
    }

    /// Drop buffered bytes and queued frames.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.frames.clear();
    }

    pub fn drain_frames(&mut self) -> DrainFrames<'_> {
        DrainFrames { parser: self }
    }

    /// Returns `true` if a frame was consumed from the buffer, valid or not,
    /// or bytes were skipped and the scan should run again.
    fn try_extract_frame(&mut self) -> bool {
        let Some(start) = find_marker(&self.buffer) else {
            self.handle_missing_marker();
            return false;
        };

        if start > 0 {
            trace!(skipped = start, "discarding bytes before frame marker");
            self.skip(start);
        }

        if self.buffer.len() <= LENGTH_OFFSET {
            return false;
        }

        let frame_len = self.buffer[LENGTH_OFFSET] as usize;
        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&frame_len) {
            warn!(frame_len, "implausible frame length, resyncing");
            self.skip(1);
            return true;
        }

        if self.buffer.len() < frame_len {
            return false;
        }

        let bytes = self.buffer.split_to(frame_len).freeze();
        match Frame::from_bytes(bytes) {
            Ok(frame) => {
                trace!(frame = %frame, "frame extracted");
                self.stats.frames_emitted += 1;
                self.frames.push_back(frame);
            }
            Err(e) => {
                warn!(error = %e, "dropping invalid frame");
                self.stats.invalid_frames += 1;
                self.stats.bytes_discarded += frame_len as u64;
            }
        }
        true
    }

    fn handle_missing_marker(&mut self) {
        if self.buffer.len() <= self.config.noise_threshold {
            return;
        }

        // A marker may straddle this chunk and the next one.
        let keep = partial_marker_suffix(&self.buffer);
        let dropped = self.buffer.len() - keep;
        warn!(dropped, "no frame marker in buffered data, clearing");
        self.skip(dropped);
        self.stats.desync_clears += 1;
    }

    fn skip(&mut self, n: usize) {
        self.buffer.advance(n);
        self.stats.bytes_discarded += n as u64;
    }

    fn discard_all(&mut self) {
        self.stats.bytes_discarded += self.buffer.len() as u64;
        self.stats.desync_clears += 1;
        self.buffer.clear();
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

fn find_marker(buf: &[u8]) -> Option<usize> {
    buf.windows(FRAME_MARKER.len())
        .position(|w| w == FRAME_MARKER)
}

/// Length of the longest proper prefix of the marker that ends `buf`.
fn partial_marker_suffix(buf: &[u8]) -> usize {
    (1..FRAME_MARKER.len())
        .rev()
        .find(|&n| buf.len() >= n && buf[buf.len() - n..] == FRAME_MARKER[..n])
        .unwrap_or(0)
}

/// Iterator returned by [`StreamParser::drain_frames`].
pub struct DrainFrames<'a> {
    parser: &'a mut StreamParser,
}

impl Iterator for DrainFrames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_frame()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.parser.frames_available();
        (len, Some(len))
    }
}

impl ExactSizeIterator for DrainFrames<'_> {
    fn len(&self) -> usize {
        self.parser.frames_available()
    }
}

/// A [`StreamParser`] behind a lock, for a read path that runs apart from
/// the code consuming frames.
///
/// Cloning yields another handle to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedStreamParser {
    inner: Arc<Mutex<StreamParser>>,
}

impl SharedStreamParser {
    pub fn new(config: ReassemblerConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StreamParser::with_config(config))),
        }
    }

    /// Feed a chunk under the lock and return the frames it completed.
    pub fn feed(&self, chunk: &[u8]) -> Vec<Frame> {
        self.lock().feed_and_drain(chunk)
    }

    pub fn buffered_len(&self) -> usize {
        self.lock().buffered_len()
    }

    pub fn stats(&self) -> ParserStats {
        self.lock().stats()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // Recovers from poisoning.
    fn lock(&self) -> MutexGuard<'_, StreamParser> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
