//! Session builder and runtime loop.
//!
//! The [`SessionBuilder`] configures framing limits and builds a
//! [`Session`]. The session owns the patient store and the dispatcher and
//! drives one connection:
//! 1. Read until one complete frame is available
//! 2. Dispatch it
//! 3. Write and flush the acknowledgment
//! 4. Repeat until the peer closes or an error occurs
//!
//! The next read is never issued before the current acknowledgment has been
//! flushed.
//!
//! # Example
//!
//! ```ignore
//! use aki_client::Session;
//!
//! let report = Session::builder(store, dispatcher)
//!     .max_payload_size(64 * 1024)
//!     .build()
//!     .run(stream)
//!     .await?;
//! println!("sent {} acks", report.acks_sent);
//! ```

use std::fmt;
use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, trace};

use crate::dispatch::Dispatcher;
use crate::error::{ClientError, Result};
use crate::protocol::{
    build_ack, FrameBuffer, FrameReader, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_READ_BUFFER_SIZE,
};
use crate::store::PatientStore;

/// Session loop position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitFrame,
    Dispatch,
    AckSend,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitFrame => "AWAIT_FRAME",
            SessionState::Dispatch => "DISPATCH",
            SessionState::AckSend => "ACK_SEND",
            SessionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Summary of a session that ended cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub acks_sent: u64,
}

/// Builder for configuring and creating a session.
pub struct SessionBuilder {
    store: PatientStore,
    dispatcher: Dispatcher,
    max_payload_size: usize,
    read_buffer_size: usize,
}

impl SessionBuilder {
    /// Create a builder around an open store and a dispatcher.
    pub fn new(store: PatientStore, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            dispatcher,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    /// Set the largest accepted payload.
    ///
    /// Default: 1 MB
    pub fn max_payload_size(mut self, limit: usize) -> Self {
        self.max_payload_size = limit;
        self
    }

    /// Set the size of a single socket read.
    ///
    /// Default: 1024
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    pub fn build(self) -> Session {
        Session {
            store: self.store,
            dispatcher: self.dispatcher,
            max_payload_size: self.max_payload_size,
            read_buffer_size: self.read_buffer_size,
            state: SessionState::AwaitFrame,
            acks_sent: 0,
        }
    }
}

/// One MLLP connection worth of processing.
pub struct Session {
    store: PatientStore,
    dispatcher: Dispatcher,
    max_payload_size: usize,
    read_buffer_size: usize,
    state: SessionState,
    acks_sent: u64,
}

impl Session {
    /// Create a new session builder.
    pub fn builder(store: PatientStore, dispatcher: Dispatcher) -> SessionBuilder {
        SessionBuilder::new(store, dispatcher)
    }

    /// Current loop position.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Acknowledgments written so far.
    pub fn acks_sent(&self) -> u64 {
        self.acks_sent
    }

    /// Drive `stream` until the peer closes or an error occurs.
    ///
    /// Consumes the session, so the store is released on every exit path.
    pub async fn run<S>(mut self, stream: S) -> Result<SessionReport>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, writer) = tokio::io::split(stream);
        info!("Session started");

        let result = self.read_loop(reader, writer).await;
        self.transition(SessionState::Closed);

        match result {
            Ok(()) => {
                info!(acks_sent = self.acks_sent, "Session closed by peer");
                Ok(SessionReport {
                    acks_sent: self.acks_sent,
                })
            }
            Err(e) => {
                error!(acks_sent = self.acks_sent, "Session failed: {}", e);
                Err(e)
            }
        }
    }

    async fn read_loop<R, W>(&mut self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let frame_buffer = FrameBuffer::with_max_payload(self.max_payload_size);
        let mut frames = FrameReader::with_frame_buffer(reader, frame_buffer, self.read_buffer_size);

        loop {
            self.transition(SessionState::AwaitFrame);
            let frame = match frames.next_frame().await? {
                Some(frame) => frame,
                None => return Ok(()),
            };
            debug!(len = frame.payload_len(), "Frame received");

            self.transition(SessionState::Dispatch);
            let outcome = self.dispatcher.dispatch(&mut self.store, &frame).await?;

            self.transition(SessionState::AckSend);
            let ack = build_ack(outcome.ack_code(), outcome.control_id.as_deref())?;
            writer.write_all(&ack).await.map_err(closed_or_io)?;
            writer.flush().await.map_err(closed_or_io)?;

            self.acks_sent += 1;
            info!(
                kind = ?outcome.kind,
                mrn = outcome.mrn.as_deref().unwrap_or("-"),
                "Ack sent ({} total)",
                self.acks_sent
            );
        }
    }

    fn transition(&mut self, next: SessionState) {
        trace!("{} -> {}", self.state, next);
        self.state = next;
    }
}

fn closed_or_io(e: std::io::Error) -> ClientError {
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::WriteZero => {
            ClientError::ConnectionClosed
        }
        _ => ClientError::Io(e),
    }
}
