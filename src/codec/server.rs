//! Server-side codec: reads requests, writes responses.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

use super::{marshal, unmarshal, Decode, Encode, Request, RequestReader, Response, ResponseWriter};
use crate::config::CodecConfig;
use crate::error::Result;
use crate::protocol::{RequestHeader, ResponseHeader};
use crate::transport::{FrameReader, FrameWriter};

const HEADER_SCRATCH_CAPACITY: usize = 128;

/// Server codec bound to one accepted connection.
///
/// Implements both [`RequestReader`] and [`ResponseWriter`]. A dispatch
/// loop normally calls [`into_split`](Self::into_split) so that handler
/// tasks can write responses while the loop keeps reading.
pub struct ServerCodec<R, W> {
    reader: ServerRequestReader<R>,
    writer: ServerResponseWriter<W>,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> ServerCodec<R, W> {
    /// Create a new server codec with default configuration.
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, &CodecConfig::default())
    }

    /// Create a new server codec with the given configuration.
    pub fn with_config(reader: R, writer: W, config: &CodecConfig) -> Self {
        Self {
            reader: ServerRequestReader::with_config(reader, config),
            writer: ServerResponseWriter::with_config(writer, config),
        }
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(self) -> (ServerRequestReader<R>, ServerResponseWriter<W>) {
        (self.reader, self.writer)
    }
}

impl<S: AsyncRead + AsyncWrite> ServerCodec<ReadHalf<S>, WriteHalf<S>> {
    /// Bind a codec to a single duplex stream.
    pub fn from_stream(stream: S) -> Self {
        Self::from_stream_with_config(stream, &CodecConfig::default())
    }

    /// Bind a codec to a single duplex stream with the given configuration.
    pub fn from_stream_with_config(stream: S, config: &CodecConfig) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self::with_config(read, write, config)
    }
}

impl<R, W> RequestReader for ServerCodec<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_request_header(&mut self, request: &mut Request) -> Result<()> {
        self.reader.read_request_header(request).await
    }

    async fn read_request_body(&mut self, args: Option<&mut dyn Decode>) -> Result<()> {
        self.reader.read_request_body(args).await
    }
}

impl<R, W> ResponseWriter for ServerCodec<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn write_response(
        &mut self,
        response: &Response,
        reply: Option<&dyn Encode>,
    ) -> Result<()> {
        self.writer.write_response(response, reply).await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.close().await
    }
}

/// Read half of a [`ServerCodec`].
pub struct ServerRequestReader<R> {
    frames: FrameReader<R>,
    header: RequestHeader,
}

impl<R: AsyncRead + Unpin> ServerRequestReader<R> {
    /// Create a new request reader with the given configuration.
    pub fn with_config(reader: R, config: &CodecConfig) -> Self {
        Self {
            frames: FrameReader::with_config(reader, config),
            header: RequestHeader::default(),
        }
    }
}

impl<R: AsyncRead + Unpin + Send> RequestReader for ServerRequestReader<R> {
    async fn read_request_header(&mut self, request: &mut Request) -> Result<()> {
        self.header.reset();
        self.frames
            .recv_frame(|data| unmarshal(data, &mut self.header))
            .await?;

        request.seq = self.header.id;
        request.service_method.clone_from(&self.header.method);
        Ok(())
    }

    async fn read_request_body(&mut self, args: Option<&mut dyn Decode>) -> Result<()> {
        let result = match args {
            Some(target) => self
                .frames
                .recv_frame(|data| unmarshal(data, target))
                .await
                .map(drop),
            None => self.frames.discard_frame().await,
        };
        self.header.reset();
        result
    }
}

/// Write half of a [`ServerCodec`].
pub struct ServerResponseWriter<W> {
    frames: FrameWriter<W>,
    header: ResponseHeader,
    header_buf: BytesMut,
    body_buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> ServerResponseWriter<W> {
    /// Create a new response writer with the given configuration.
    pub fn with_config(writer: W, config: &CodecConfig) -> Self {
        Self {
            frames: FrameWriter::with_config(writer, config),
            header: ResponseHeader::default(),
            header_buf: BytesMut::with_capacity(HEADER_SCRATCH_CAPACITY),
            body_buf: BytesMut::new(),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> ResponseWriter for ServerResponseWriter<W> {
    async fn write_response(
        &mut self,
        response: &Response,
        reply: Option<&dyn Encode>,
    ) -> Result<()> {
        // An error response never carries a body.
        let reply = if response.error.is_empty() { reply } else { None };
        let body = marshal(&mut self.body_buf, reply)?;

        self.header.id = response.seq;
        self.header.method.clear();
        self.header.error.clone_from(&response.error);
        let header = marshal(&mut self.header_buf, Some(&self.header))?;

        self.frames.send_frame(&header).await?;
        self.frames.send_frame(&body).await?;
        self.frames.flush().await
    }

    async fn close(&mut self) -> Result<()> {
        self.frames.close().await
    }
}
