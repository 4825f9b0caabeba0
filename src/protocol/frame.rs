//! Frame struct with typed accessors.
//!
//! Represents one complete MLLP block with its envelope stripped.
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use aki_client::protocol::Frame;
//! use bytes::Bytes;
//!
//! let frame = Frame::new(Bytes::from_static(b"MSH|^~\\&|A\rPID|1"));
//!
//! assert_eq!(frame.segment_count(), 2);
//! assert_eq!(frame.text().unwrap(), "MSH|^~\\&|A\rPID|1");
//! ```

use bytes::Bytes;

use super::wire_format::{encode_block, CARRIAGE_RETURN};
use crate::error::{ClientError, Result};

/// A complete inbound or outbound message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from payload bytes.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Create a frame from raw bytes (copies data).
    pub fn from_slice(payload: &[u8]) -> Self {
        Self {
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Payload as text.
    ///
    /// HL7 v2 on this feed is ASCII; anything that is not valid UTF-8 is a
    /// dispatch error rather than something to guess an encoding for.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| ClientError::Dispatch(format!("payload is not valid text: {}", e)))
    }

    /// Number of non-empty HL7 segments.
    pub fn segment_count(&self) -> usize {
        self.payload
            .split(|&b| b == CARRIAGE_RETURN || b == b'\n')
            .filter(|s| !s.is_empty())
            .count()
    }

    /// Encode this frame with its MLLP envelope.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        encode_block(&self.payload)
    }
}

/// Build a complete block for a payload as a single byte vector.
///
/// # Example
///
/// ```
/// use aki_client::protocol::build_frame;
///
/// let bytes = build_frame("MSA|AA").unwrap();
/// assert_eq!(bytes.len(), 6 + 3);
/// ```
pub fn build_frame(payload: &str) -> Result<Vec<u8>> {
    encode_block(payload.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FrameBuffer, END_BLOCK, START_BLOCK};

    #[test]
    fn test_frame_creation() {
        let frame = Frame::new(Bytes::from_static(b"hello"));
        assert_eq!(frame.payload(), b"hello");
        assert_eq!(frame.payload_len(), 5);
    }

    #[test]
    fn test_frame_from_slice() {
        let frame = Frame::from_slice(b"MSH|x");
        assert_eq!(frame.text().unwrap(), "MSH|x");
    }

    #[test]
    fn test_invalid_utf8_is_dispatch_error() {
        let frame = Frame::from_slice(&[0xFF, 0xFE]);
        assert!(matches!(frame.text(), Err(ClientError::Dispatch(_))));
    }

    #[test]
    fn test_segment_count_ignores_trailing_separator() {
        let frame = Frame::from_slice(b"MSH|a\rPID|b\rOBX|c\r");
        assert_eq!(frame.segment_count(), 3);

        let empty = Frame::from_slice(b"");
        assert_eq!(empty.segment_count(), 0);
    }

    #[test]
    fn test_to_wire() {
        let frame = Frame::from_slice(b"MSA|AA");
        let wire = frame.to_wire().unwrap();
        assert_eq!(wire[0], START_BLOCK);
        assert_eq!(wire[wire.len() - 2], END_BLOCK);
        assert_eq!(&wire[1..wire.len() - 2], b"MSA|AA");
    }

    #[test]
    fn test_build_frame_roundtrip() {
        let bytes = build_frame("MSH|^~\\&|||||20240101000000||ACK|||2.5\rMSA|AA").unwrap();

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].segment_count(), 2);
        assert!(buffer.is_empty());
    }
}
