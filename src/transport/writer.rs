//! Frame writer.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::trace;

use super::{classify, ErrorClass};
use crate::config::CodecConfig;
use crate::error::Result;
use crate::protocol::{put_uvarint, MAX_VARINT_LEN};

/// Writes length-prefixed frames to a buffered stream.
///
/// Frames are buffered; call [`flush`](Self::flush) once a logical message
/// is complete.
pub struct FrameWriter<W> {
    writer: BufWriter<W>,
    len_buf: [u8; MAX_VARINT_LEN],
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a new frame writer with the default buffer size.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, &CodecConfig::default())
    }

    /// Create a new frame writer from a codec configuration.
    pub fn with_config(inner: W, config: &CodecConfig) -> Self {
        Self {
            writer: BufWriter::with_capacity(config.write_buffer_size, inner),
            len_buf: [0u8; MAX_VARINT_LEN],
        }
    }

    /// Write one frame: the varint length of `payload`, then `payload`.
    ///
    /// An empty payload produces the single byte `0x00`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal I/O error. Temporary errors are retried.
    pub async fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        let n = put_uvarint(&mut self.len_buf, payload.len() as u64);
        write_retrying(&mut self.writer, &self.len_buf[..n]).await?;
        write_retrying(&mut self.writer, payload).await
    }

    /// Flush buffered frames to the stream.
    ///
    /// # Errors
    ///
    /// Returns the first fatal I/O error. Temporary errors are retried.
    pub async fn flush(&mut self) -> Result<()> {
        loop {
            match self.writer.flush().await {
                Ok(()) => return Ok(()),
                Err(e) if classify(&e) == ErrorClass::Temporary => {
                    trace!(error = %e, "temporary error on flush, retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Flush and shut down the write side of the stream.
    pub async fn close(&mut self) -> Result<()> {
        self.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }
}

/// Write all of `buf`, resuming after partial writes and retrying
/// temporary errors.
async fn write_retrying<W: AsyncWrite + Unpin>(writer: &mut W, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        match writer.write(buf).await {
            Ok(0) => {
                let err = io::Error::new(io::ErrorKind::WriteZero, "failed to write frame");
                return Err(err.into());
            }
            Ok(n) => buf = &buf[n..],
            Err(e) => match classify(&e) {
                ErrorClass::Temporary => {
                    trace!(error = %e, remaining = buf.len(), "temporary write error, retrying");
                    tokio::task::yield_now().await;
                }
                ErrorClass::Fatal => return Err(e.into()),
            },
        }
    }
    Ok(())
}
