//! Protocol module - MLLP framing, frame types, and acknowledgments.
//!
//! This module implements the wire side of the client:
//! - MLLP block envelope (`0x0B … 0x1C 0x0D`)
//! - Frame buffer for accumulating partial reads
//! - Pull-based frame reader over an async stream
//! - HL7 ACK builder

mod ack;
mod frame;
mod frame_buffer;
mod reader;
mod wire_format;

pub use ack::{ack_payload, build_ack, build_ack_at, AckCode, HL7_TIMESTAMP_FORMAT};
pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use reader::{FrameReader, DEFAULT_READ_BUFFER_SIZE};
pub use wire_format::{
    encode_block, validate_payload, CARRIAGE_RETURN, DEFAULT_MAX_PAYLOAD_SIZE, END_BLOCK,
    ENVELOPE_SIZE, START_BLOCK,
};
