//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented blocks:
//! - `SeekingStart`: Discarding bytes until a start-of-block marker
//! - `InBlock`: Start seen, scanning for end-of-block followed by CR
//!
//! A socket read may carry half a block, exactly one, or several; the
//! frames yielded are the same however the stream is chunked.
//!
//! # Example
//!
//! ```
//! use aki_client::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! assert!(buffer.push(b"\x0bMSH|a").unwrap().is_empty());
//! let frames = buffer.push(b"\x1c\x0d\x0bMSH|b\x1c\x0d").unwrap();
//!
//! assert_eq!(frames.len(), 2);
//! assert_eq!(frames[1].payload(), b"MSH|b");
//! ```

use bytes::{Buf, BytesMut};
use tracing::warn;

use super::wire_format::{
    CARRIAGE_RETURN, DEFAULT_MAX_PAYLOAD_SIZE, END_BLOCK, START_BLOCK,
};
use super::Frame;
use crate::error::{ClientError, Result};

/// State machine for block parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Outside a block, waiting for the start marker.
    SeekingStart,
    /// Inside a block; `scanned` payload bytes are known not to hold the end marker.
    InBlock { scanned: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Once a start marker has been consumed the buffer holds only payload
/// bytes, so the payload of a finished block is split off without copying.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_payload_size: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 4KB, max payload: 1MB.
    pub fn new() -> Self {
        Self::with_capacity_and_max_payload(4 * 1024, DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self::with_capacity_and_max_payload(4 * 1024, max_payload_size)
    }

    /// Create a new frame buffer with custom capacity and max payload.
    pub fn with_capacity_and_max_payload(capacity: usize, max_payload_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::SeekingStart,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns the frames completed by this chunk, in stream order (may be
    /// empty). Incomplete data stays buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Framing` if a block exceeds the max payload size
    /// or its end marker is not followed by a carriage return.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete block was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a protocol violation
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match self.state {
            State::SeekingStart => {
                let Some(start) = self.buffer.iter().position(|&b| b == START_BLOCK) else {
                    if !self.buffer.is_empty() {
                        warn!("Discarding {} bytes outside an MLLP block", self.buffer.len());
                        self.buffer.clear();
                    }
                    return Ok(None);
                };

                if start > 0 {
                    warn!("Discarding {} bytes before start of block", start);
                }
                self.buffer.advance(start + 1);
                self.state = State::InBlock { scanned: 0 };

                self.try_extract_one()
            }

            State::InBlock { scanned } => {
                let end = self.buffer[scanned..]
                    .iter()
                    .position(|&b| b == END_BLOCK || b == START_BLOCK)
                    .map(|offset| scanned + offset);

                let Some(end) = end else {
                    self.check_size(self.buffer.len())?;
                    self.state = State::InBlock {
                        scanned: self.buffer.len(),
                    };
                    return Ok(None);
                };

                if self.buffer[end] == START_BLOCK {
                    return Err(ClientError::Framing(format!(
                        "start of block at payload offset {} before end of previous block",
                        end
                    )));
                }

                self.check_size(end)?;

                // End marker is the last byte so far; CR may still be in flight.
                if end + 1 >= self.buffer.len() {
                    self.state = State::InBlock { scanned: end };
                    return Ok(None);
                }

                if self.buffer[end + 1] != CARRIAGE_RETURN {
                    return Err(ClientError::Framing(format!(
                        "end of block followed by 0x{:02X} instead of CR",
                        self.buffer[end + 1]
                    )));
                }

                let payload = self.buffer.split_to(end).freeze();
                self.buffer.advance(2);
                self.state = State::SeekingStart;

                Ok(Some(Frame::new(payload)))
            }
        }
    }

    fn check_size(&self, payload_len: usize) -> Result<()> {
        if payload_len > self.max_payload_size {
            return Err(ClientError::Framing(format!(
                "Payload size {} exceeds maximum {}",
                payload_len, self.max_payload_size
            )));
        }
        Ok(())
    }

    /// Whether a block has been started but not finished.
    ///
    /// A stream that closes while this is true was truncated.
    pub fn has_partial(&self) -> bool {
        matches!(self.state, State::InBlock { .. })
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer holds nothing, not even an open block.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && !self.has_partial()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::SeekingStart;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::SeekingStart => "SeekingStart",
            State::InBlock { .. } => "InBlock",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
