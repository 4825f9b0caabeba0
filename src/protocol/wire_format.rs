//! MLLP wire format.
//!
//! Every message travels inside a block:
//! ```text
//! ┌──────┬─────────────────────┬──────┬──────┐
//! │ 0x0B │ HL7 payload (ASCII) │ 0x1C │ 0x0D │
//! │ SB   │ segments split by CR│ EB   │ CR   │
//! └──────┴─────────────────────┴──────┴──────┘
//! ```
//!
//! The payload itself never contains `0x0B` or `0x1C`.

use crate::error::{ClientError, Result};

/// Start-of-block marker.
pub const START_BLOCK: u8 = 0x0B;

/// End-of-block marker.
pub const END_BLOCK: u8 = 0x1C;

/// Carriage return, terminates a block and separates HL7 segments.
pub const CARRIAGE_RETURN: u8 = 0x0D;

/// Bytes added around a payload by the envelope.
pub const ENVELOPE_SIZE: usize = 3;

/// Default maximum payload size (1 MB).
///
/// HL7 messages on this feed are a few hundred bytes; anything near this
/// limit means the peer never sent an end-of-block marker.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Wrap a payload in the MLLP envelope.
///
/// # Example
///
/// ```
/// use aki_client::protocol::encode_block;
///
/// let bytes = encode_block(b"MSH|^~\\&").unwrap();
/// assert_eq!(bytes[0], 0x0B);
/// assert_eq!(&bytes[bytes.len() - 2..], &[0x1C, 0x0D]);
/// ```
pub fn encode_block(payload: &[u8]) -> Result<Vec<u8>> {
    validate_payload(payload)?;

    let mut buf = Vec::with_capacity(payload.len() + ENVELOPE_SIZE);
    buf.push(START_BLOCK);
    buf.extend_from_slice(payload);
    buf.push(END_BLOCK);
    buf.push(CARRIAGE_RETURN);
    Ok(buf)
}

/// Check that a payload can be carried inside a block.
pub fn validate_payload(payload: &[u8]) -> Result<()> {
    if let Some(pos) = payload
        .iter()
        .position(|&b| b == START_BLOCK || b == END_BLOCK)
    {
        return Err(ClientError::Framing(format!(
            "payload contains reserved marker byte 0x{:02X} at offset {}",
            payload[pos], pos
        )));
    }
    Ok(())
}
