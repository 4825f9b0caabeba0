//! Error types for aki-client.

use thiserror::Error;

/// Main error type for all client operations.
///
/// Every variant is fatal to the session that produced it: the session loop
/// stops, releases the store and returns the error to the caller.
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O error on the MLLP connection or a local file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error from the patient store.
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// JSON error while loading a model file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error while loading historical data.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// HTTP error from the pager endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Framing error (truncated frame, oversized frame).
    #[error("Framing error: {0}")]
    Framing(String),

    /// Inbound message is missing a required field or a field is malformed.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Malformed historical data file.
    #[error("History error: {0}")]
    History(String),

    /// Result message for a patient with no prior admission.
    #[error("Patient not found: {0}")]
    NotFound(String),

    /// Classifier could not produce a decision.
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Page request could not be queued.
    #[error("Notifier error: {0}")]
    Notifier(String),

    /// Invalid process configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;
