//! HL7 acknowledgment builder.
//!
//! Every inbound message gets exactly one reply of the form:
//! ```text
//! MSH|^~\&|||||<YYYYMMDDHHMMSS>||ACK|||2.5<CR>MSA|<code>[|<control id>]
//! ```
//! wrapped in the MLLP envelope.

use chrono::{Local, NaiveDateTime};

use super::wire_format::encode_block;
use crate::error::Result;

/// HL7 timestamp format used in MSH-7.
pub const HL7_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Acknowledgment code carried in MSA-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    /// Application accept.
    Accept,
    /// Application error.
    Error,
    /// Application reject.
    Reject,
}

impl AckCode {
    /// The two-letter HL7 code.
    pub fn as_str(&self) -> &'static str {
        match self {
            AckCode::Accept => "AA",
            AckCode::Error => "AE",
            AckCode::Reject => "AR",
        }
    }
}

/// Build the acknowledgment payload (no envelope) for a given time.
///
/// # Example
///
/// ```
/// use aki_client::protocol::{ack_payload, AckCode};
/// use chrono::NaiveDate;
///
/// let at = NaiveDate::from_ymd_opt(2024, 1, 2)
///     .unwrap()
///     .and_hms_opt(13, 53, 0)
///     .unwrap();
///
/// assert_eq!(
///     ack_payload(AckCode::Accept, None, at),
///     "MSH|^~\\&|||||20240102135300||ACK|||2.5\rMSA|AA"
/// );
/// ```
pub fn ack_payload(code: AckCode, control_id: Option<&str>, at: NaiveDateTime) -> String {
    let mut payload = format!(
        "MSH|^~\\&|||||{}||ACK|||2.5\rMSA|{}",
        at.format(HL7_TIMESTAMP_FORMAT),
        code.as_str()
    );
    if let Some(id) = control_id.filter(|id| !id.is_empty()) {
        payload.push('|');
        payload.push_str(id);
    }
    payload
}

/// Build a complete acknowledgment block stamped with the local time.
pub fn build_ack(code: AckCode, control_id: Option<&str>) -> Result<Vec<u8>> {
    build_ack_at(code, control_id, Local::now().naive_local())
}

/// Build a complete acknowledgment block stamped with `at`.
pub fn build_ack_at(
    code: AckCode,
    control_id: Option<&str>,
    at: NaiveDateTime,
) -> Result<Vec<u8>> {
    encode_block(ack_payload(code, control_id, at).as_bytes())
}
