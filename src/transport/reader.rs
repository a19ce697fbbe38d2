//! Frame reader.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::config::CodecConfig;
use crate::error::{FramewireError, Result};
use crate::protocol::{decode_uvarint, UvarintDecoder};

/// Reads length-prefixed frames from a buffered stream.
///
/// A frame that is already fully buffered is handed to the decoder as a
/// borrowed view of the read buffer. Larger frames are read into a freshly
/// allocated buffer first.
pub struct FrameReader<R> {
    reader: BufReader<R>,
    max_frame_size: u64,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a new frame reader with default buffer size and frame limit.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, &CodecConfig::default())
    }

    /// Create a new frame reader from a codec configuration.
    pub fn with_config(inner: R, config: &CodecConfig) -> Self {
        Self {
            reader: BufReader::with_capacity(config.read_buffer_size.max(1), inner),
            max_frame_size: config.max_frame_size,
        }
    }

    /// Read one frame and run `decode` on its payload.
    ///
    /// Returns `Ok(None)` for a zero-length frame without calling `decode`.
    ///
    /// # Errors
    ///
    /// - [`FramewireError::ConnectionClosed`] on end of stream between frames
    /// - [`FramewireError::Protocol`] for a malformed or oversized length
    /// - I/O errors, including `UnexpectedEof` inside a frame
    /// - whatever `decode` returns
    pub async fn recv_frame<T, F>(&mut self, decode: F) -> Result<Option<T>>
    where
        F: FnOnce(&[u8]) -> Result<T>,
    {
        let len = self.read_len().await?;
        if len == 0 {
            return Ok(None);
        }

        if self.reader.buffer().len() >= len {
            let value = decode(&self.reader.buffer()[..len])?;
            self.reader.consume(len);
            return Ok(Some(value));
        }

        let mut data = vec![0u8; len];
        self.reader.read_exact(&mut data).await?;
        decode(&data).map(Some)
    }

    /// Read one frame and drop its payload.
    ///
    /// # Errors
    ///
    /// Same as [`recv_frame`](Self::recv_frame), minus decode errors.
    pub async fn discard_frame(&mut self) -> Result<()> {
        let len = self.read_len().await?;
        if self.reader.buffer().len() >= len {
            self.reader.consume(len);
            return Ok(());
        }

        let expected = len as u64;
        let mut remaining = (&mut self.reader).take(expected);
        let copied = tokio::io::copy(&mut remaining, &mut tokio::io::sink()).await?;
        if copied < expected {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(())
    }

    /// Bytes read from the stream but not yet consumed.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.reader.buffer().len()
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &R {
        self.reader.get_ref()
    }

    async fn read_len(&mut self) -> Result<usize> {
        let len = match decode_uvarint(self.reader.buffer())? {
            Some((len, n)) => {
                self.reader.consume(n);
                len
            }
            None => self.read_len_bytewise().await?,
        };

        if len > self.max_frame_size {
            return Err(FramewireError::Protocol(format!(
                "frame of {} bytes exceeds limit of {} bytes",
                len, self.max_frame_size
            )));
        }
        usize::try_from(len).map_err(|_| {
            FramewireError::Protocol(format!("frame of {len} bytes does not fit in memory"))
        })
    }

    /// Pull the length prefix from the stream one byte at a time.
    async fn read_len_bytewise(&mut self) -> Result<u64> {
        let mut decoder = UvarintDecoder::new();
        loop {
            let byte = match self.reader.read_u8().await {
                Ok(byte) => byte,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && decoder.consumed() == 0 => {
                    return Err(FramewireError::ConnectionClosed);
                }
                Err(e) => return Err(e.into()),
            };
            if let Some(len) = decoder.push(byte)? {
                return Ok(len);
            }
        }
    }
}
