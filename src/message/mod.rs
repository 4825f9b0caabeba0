//! Inbound HL7 message model and field extraction.
//!
//! Only the handful of fields the dispatcher needs are read:
//!
//! | Field  | Meaning                        |
//! |--------|--------------------------------|
//! | MSH-9  | message type (routing)         |
//! | MSH-10 | message control ID             |
//! | PID-3  | patient identifier (MRN)       |
//! | PID-7  | date of birth                  |
//! | PID-8  | administrative sex             |
//! | OBR-7  | observation date/time          |
//! | OBX-5  | observation value              |
//!
//! # Example
//!
//! ```
//! use aki_client::message::{parse_message, MessageBody};
//!
//! let text = "MSH|^~\\&|SIMULATION|SOUTH RIVERSIDE|||20240102135300||ADT^A01|MSG1|P|2.5\r\
//!             PID|1||497030||ROSCOE DOHERTY||19870515|M";
//! let message = parse_message(text).unwrap();
//!
//! assert_eq!(message.control_id.as_deref(), Some("MSG1"));
//! match message.body {
//!     MessageBody::Admission(adm) => assert_eq!(adm.mrn, "497030"),
//!     _ => unreachable!(),
//! }
//! ```

mod segments;

use chrono::{NaiveDate, NaiveDateTime};

pub use segments::Segments;

use crate::error::{ClientError, Result};

/// Routing class of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Patient administration ("PAS"): admission with demographics.
    Admission,
    /// Laboratory ("LIMS"): a lab result.
    Result,
    /// Anything else (discharges, transfers, unknown types).
    Other,
}

impl MessageKind {
    /// Classify an MSH-9 value.
    ///
    /// Only the first two components are compared, so `ADT^A01^ADT_A01`
    /// routes the same as `ADT^A01`.
    pub fn from_message_type(message_type: &str) -> Self {
        let mut components = message_type.split('^');
        let code = components.next().unwrap_or("").trim();
        let event = components.next().unwrap_or("").trim();

        match (code, event) {
            ("PAS", _) | ("ADT", "A01") => MessageKind::Admission,
            ("LIMS", _) | ("ORU", "R01") => MessageKind::Result,
            _ => MessageKind::Other,
        }
    }
}

/// Demographics carried by an admission message.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub mrn: String,
    pub dob: Option<NaiveDateTime>,
    pub sex: Option<String>,
}

/// A single lab observation.
#[derive(Debug, Clone, PartialEq)]
pub struct LabResult {
    pub mrn: String,
    pub observed_at: NaiveDateTime,
    pub value: f64,
}

/// Type-specific content of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Admission(Admission),
    Result(LabResult),
    Other,
}

/// One parsed inbound message, alive only for the duration of a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Raw MSH-9.
    pub message_type: String,
    /// MSH-10, if the sender supplied one.
    pub control_id: Option<String>,
    pub body: MessageBody,
}

impl InboundMessage {
    /// Routing class of this message.
    pub fn kind(&self) -> MessageKind {
        match self.body {
            MessageBody::Admission(_) => MessageKind::Admission,
            MessageBody::Result(_) => MessageKind::Result,
            MessageBody::Other => MessageKind::Other,
        }
    }

    /// Patient identifier, for admission and result messages.
    pub fn mrn(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Admission(a) => Some(&a.mrn),
            MessageBody::Result(r) => Some(&r.mrn),
            MessageBody::Other => None,
        }
    }
}

/// Parse an HL7 v2 payload into an [`InboundMessage`].
///
/// # Errors
///
/// Returns `ClientError::Dispatch` if there is no MSH segment, or if a field
/// required by the message kind is missing or malformed.
pub fn parse_message(text: &str) -> Result<InboundMessage> {
    let segments = Segments::parse(text);

    let message_type = segments
        .field("MSH", 9)
        .ok_or_else(|| ClientError::Dispatch("missing MSH-9 message type".into()))?
        .to_string();
    let control_id = segments
        .field("MSH", 10)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    let body = match MessageKind::from_message_type(&message_type) {
        MessageKind::Admission => MessageBody::Admission(parse_admission(&segments)?),
        MessageKind::Result => MessageBody::Result(parse_result(&segments)?),
        MessageKind::Other => MessageBody::Other,
    };

    Ok(InboundMessage {
        message_type,
        control_id,
        body,
    })
}

fn parse_admission(segments: &Segments<'_>) -> Result<Admission> {
    let mrn = required(segments, "PID", 3)?;
    let dob = match segments.field("PID", 7).filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_hl7_timestamp(raw)?),
        None => None,
    };
    let sex = segments
        .field("PID", 8)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(Admission { mrn, dob, sex })
}

fn parse_result(segments: &Segments<'_>) -> Result<LabResult> {
    let mrn = required(segments, "PID", 3)?;
    let observed_at = parse_hl7_timestamp(&required(segments, "OBR", 7)?)?;

    let raw_value = required(segments, "OBX", 5)?;
    let value: f64 = raw_value.trim().parse().map_err(|_| {
        ClientError::Dispatch(format!("OBX-5 value '{}' is not numeric", raw_value))
    })?;
    if !value.is_finite() {
        return Err(ClientError::Dispatch(format!(
            "OBX-5 value '{}' is not finite",
            raw_value
        )));
    }

    Ok(LabResult {
        mrn,
        observed_at,
        value,
    })
}

fn required(segments: &Segments<'_>, segment: &str, index: usize) -> Result<String> {
    segments
        .field(segment, index)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ClientError::Dispatch(format!("missing required field {}-{}", segment, index)))
}

/// Parse an HL7 DTM value (`YYYYMMDD`, `YYYYMMDDHHMM` or `YYYYMMDDHHMMSS`).
///
/// ISO `YYYY-MM-DD` is accepted for dates of birth keyed in by hand.
pub fn parse_hl7_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    let parsed = match raw.len() {
        8 => NaiveDate::parse_from_str(raw, "%Y%m%d").map(|d| d.and_hms_opt(0, 0, 0)),
        10 => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0)),
        12 => NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M").map(Some),
        14 => NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S").map(Some),
        _ => {
            return Err(ClientError::Dispatch(format!(
                "timestamp '{}' has unsupported length {}",
                raw,
                raw.len()
            )))
        }
    };

    parsed
        .ok()
        .flatten()
        .ok_or_else(|| ClientError::Dispatch(format!("invalid timestamp '{}'", raw)))
}
