//! Frame reader over an async byte stream.
//!
//! [`FrameReader`] turns an `AsyncRead` into a pull-based sequence of
//! frames. It only reads from the stream when every frame from earlier
//! reads has been handed out, which is what keeps the session in lockstep
//! with the sender.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::{Frame, FrameBuffer};
use crate::error::{ClientError, Result};

/// Default read buffer size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Pull-based MLLP frame source.
pub struct FrameReader<R> {
    reader: R,
    frame_buffer: FrameBuffer,
    ready: VecDeque<Frame>,
    read_buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a reader with default buffer settings.
    pub fn new(reader: R) -> Self {
        Self::with_frame_buffer(reader, FrameBuffer::new(), DEFAULT_READ_BUFFER_SIZE)
    }

    /// Wrap a reader with a preconfigured frame buffer and read size.
    pub fn with_frame_buffer(reader: R, frame_buffer: FrameBuffer, read_size: usize) -> Self {
        Self {
            reader,
            frame_buffer,
            ready: VecDeque::new(),
            read_buf: vec![0u8; read_size.max(1)],
        }
    }

    /// Next complete frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream with nothing
    /// pending. A close in the middle of a block is a framing error.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }

            let n = self.reader.read(&mut self.read_buf).await?;
            if n == 0 {
                if self.frame_buffer.has_partial() {
                    return Err(ClientError::Framing(format!(
                        "connection closed inside a block ({} payload bytes pending)",
                        self.frame_buffer.len()
                    )));
                }
                return Ok(None);
            }

            tracing::trace!("Read {} bytes", n);
            let frames = self.frame_buffer.push(&self.read_buf[..n])?;
            self.ready.extend(frames);
        }
    }

    /// Number of frames already extracted but not yet returned.
    pub fn buffered_frames(&self) -> usize {
        self.ready.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_block;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_frames_across_small_reads() {
        let mut stream = Vec::new();
        stream.extend(encode_block(b"MSH|first").unwrap());
        stream.extend(encode_block(b"MSH|second").unwrap());

        let mut frames = FrameReader::with_frame_buffer(&stream[..], FrameBuffer::new(), 3);

        assert_eq!(frames.next_frame().await.unwrap().unwrap().payload(), b"MSH|first");
        assert_eq!(frames.next_frame().await.unwrap().unwrap().payload(), b"MSH|second");
        assert!(frames.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clean_close_is_end_of_stream() {
        let empty: &[u8] = &[];
        let mut frames = FrameReader::new(empty);
        assert!(frames.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_block_is_framing_error() {
        let partial: &[u8] = b"\x0bMSH|never finished";
        let mut frames = FrameReader::new(partial);

        let err = frames.next_frame().await.unwrap_err();
        assert!(matches!(err, ClientError::Framing(_)));
    }

    #[tokio::test]
    async fn test_multiple_frames_one_read_buffered() {
        let mut stream = Vec::new();
        for i in 0..3 {
            stream.extend(encode_block(format!("MSH|{}", i).as_bytes()).unwrap());
        }
        let mut frames = FrameReader::new(&stream[..]);

        frames.next_frame().await.unwrap().unwrap();
        assert_eq!(frames.buffered_frames(), 2);
    }

    #[tokio::test]
    async fn test_waits_for_rest_of_block() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut frames = FrameReader::new(client);

        let writer = tokio::spawn(async move {
            server.write_all(b"\x0bMSH|sp").await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            server.write_all(b"lit\x1c\x0d").await.unwrap();
        });

        let frame = frames.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.payload(), b"MSH|split");

        writer.await.unwrap();
        assert!(frames.next_frame().await.unwrap().is_none());
    }
}
