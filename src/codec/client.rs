//! Client-side codec: writes requests, reads responses.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

use super::{marshal, unmarshal, Decode, Encode, Request, RequestWriter, Response, ResponseReader};
use crate::config::CodecConfig;
use crate::error::Result;
use crate::protocol::{RequestHeader, ResponseHeader};
use crate::transport::{FrameReader, FrameWriter};

/// Default initial capacity of the header scratch buffer.
const HEADER_SCRATCH_CAPACITY: usize = 128;

/// Client codec bound to one connection.
///
/// Implements both [`RequestWriter`] and [`ResponseReader`]. Use
/// [`into_split`](Self::into_split) to drive reads and writes from
/// different tasks.
///
/// # Example
///
/// ```ignore
/// let (read, write) = stream.into_split();
/// let mut codec = ClientCodec::new(read, write);
///
/// codec.write_request(&Request::new(1, "Echo.Echo"), Some(&args)).await?;
///
/// let mut response = Response::default();
/// codec.read_response_header(&mut response).await?;
/// codec.read_response_body(Some(&mut reply)).await?;
/// ```
pub struct ClientCodec<R, W> {
    writer: ClientRequestWriter<W>,
    reader: ClientResponseReader<R>,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> ClientCodec<R, W> {
    /// Create a new client codec with default configuration.
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, &CodecConfig::default())
    }

    /// Create a new client codec with the given configuration.
    pub fn with_config(reader: R, writer: W, config: &CodecConfig) -> Self {
        Self {
            writer: ClientRequestWriter::with_config(writer, config),
            reader: ClientResponseReader::with_config(reader, config),
        }
    }

    /// Split into independently owned write and read halves.
    pub fn into_split(self) -> (ClientRequestWriter<W>, ClientResponseReader<R>) {
        (self.writer, self.reader)
    }
}

impl<S: AsyncRead + AsyncWrite> ClientCodec<ReadHalf<S>, WriteHalf<S>> {
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

impl<R, W> RequestWriter for ClientCodec<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn write_request(&mut self, request: &Request, args: Option<&dyn Encode>) -> Result<()> {
        self.writer.write_request(request, args).await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.close().await
    }
}

impl<R, W> ResponseReader for ClientCodec<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_response_header(&mut self, response: &mut Response) -> Result<()> {
        self.reader.read_response_header(response).await
    }

    async fn read_response_body(&mut self, reply: Option<&mut dyn Decode>) -> Result<()> {
        self.reader.read_response_body(reply).await
    }
}

/// Write half of a [`ClientCodec`].
pub struct ClientRequestWriter<W> {
    frames: FrameWriter<W>,
    header: RequestHeader,
    header_buf: BytesMut,
    body_buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> ClientRequestWriter<W> {
    /// Create a new request writer with the given configuration.
    pub fn with_config(writer: W, config: &CodecConfig) -> Self {
        Self {
            frames: FrameWriter::with_config(writer, config),
            header: RequestHeader::default(),
            header_buf: BytesMut::with_capacity(HEADER_SCRATCH_CAPACITY),
            body_buf: BytesMut::new(),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> RequestWriter for ClientRequestWriter<W> {
    async fn write_request(&mut self, request: &Request, args: Option<&dyn Encode>) -> Result<()> {
        let body = marshal(&mut self.body_buf, args)?;

        self.header.id = request.seq;
        self.header.method.clear();
        self.header.method.push_str(&request.service_method);
        let header = marshal(&mut self.header_buf, Some(&self.header))?;

        self.frames.send_frame(&header).await?;
        self.frames.send_frame(&body).await?;
        self.frames.flush().await
    }

    async fn close(&mut self) -> Result<()> {
        self.frames.close().await
    }
}

/// Read half of a [`ClientCodec`].
pub struct ClientResponseReader<R> {
    frames: FrameReader<R>,
    header: ResponseHeader,
}

impl<R: AsyncRead + Unpin> ClientResponseReader<R> {
    /// Create a new response reader with the given configuration.
    pub fn with_config(reader: R, config: &CodecConfig) -> Self {
        Self {
            frames: FrameReader::with_config(reader, config),
            header: ResponseHeader::default(),
        }
    }
}

impl<R: AsyncRead + Unpin + Send> ResponseReader for ClientResponseReader<R> {
    async fn read_response_header(&mut self, response: &mut Response) -> Result<()> {
        self.header.reset();
        self.frames
            .recv_frame(|data| unmarshal(data, &mut self.header))
            .await?;

        response.seq = self.header.id;
        response.service_method.clone_from(&self.header.method);
        response.error.clone_from(&self.header.error);
        Ok(())
    }

    async fn read_response_body(&mut self, reply: Option<&mut dyn Decode>) -> Result<()> {
        let result = match reply {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Message, MsgPackCodec};
    use serde::{Deserialize, Serialize};
    use tokio::io::duplex;

    #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
    struct EchoArgs {
        msg: String,
    }

    impl Message for EchoArgs {}

    async fn next_frame<R: AsyncRead + Unpin>(reader: &mut FrameReader<R>) -> Vec<u8> {
        reader
            .recv_frame(|d| Ok(d.to_vec()))
            .await
            .unwrap()
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_write_request_sends_header_then_body() {
        let (client, server) = duplex(4096);
        let mut codec = ClientCodec::from_stream(client);
        let args = EchoArgs {
            msg: "hello".to_string(),
        };

        codec
            .write_request(&Request::new(1, "Echo.Echo"), Some(&args))
            .await
            .unwrap();

        let mut raw = FrameReader::new(server);
        let header: RequestHeader = MsgPackCodec::decode(&next_frame(&mut raw).await).unwrap();
        assert_eq!(header, RequestHeader::new(1, "Echo.Echo"));
        let body: EchoArgs = MsgPackCodec::decode(&next_frame(&mut raw).await).unwrap();
        assert_eq!(body, args);
    }

    #[tokio::test]
    async fn test_write_request_without_args_sends_empty_body() {
        let (client, server) = duplex(4096);
        let mut codec = ClientCodec::from_stream(client);

        codec
            .write_request(&Request::new(2, "Svc.Ping"), None)
            .await
            .unwrap();

        let mut raw = FrameReader::new(server);
        next_frame(&mut raw).await;
        let body = raw.recv_frame(|d| Ok(d.to_vec())).await.unwrap();
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_read_response_header_and_body() {
        let (client, server) = duplex(4096);
        let mut raw = FrameWriter::new(server);
        let header = MsgPackCodec::encode(&ResponseHeader::new(5, "")).unwrap();
        let body = MsgPackCodec::encode(&EchoArgs {
            msg: "pong".to_string(),
        })
        .unwrap();
        raw.send_frame(&header).await.unwrap();
        raw.send_frame(&body).await.unwrap();
        raw.flush().await.unwrap();

        let mut codec = ClientCodec::from_stream(client);
        let mut response = Response::default();
        codec.read_response_header(&mut response).await.unwrap();
        assert_eq!(response.seq, 5);
        assert!(response.error.is_empty());

        let mut reply = EchoArgs::default();
        codec.read_response_body(Some(&mut reply)).await.unwrap();
        assert_eq!(reply.msg, "pong");
    }

    #[tokio::test]
    async fn test_discarded_body_keeps_stream_aligned() {
        let (client, server) = duplex(4096);
        let mut raw = FrameWriter::new(server);
        for id in [1u64, 2] {
            let header = MsgPackCodec::encode(&ResponseHeader::new(id, "")).unwrap();
            let body = MsgPackCodec::encode(&format!("reply {id}")).unwrap();
            raw.send_frame(&header).await.unwrap();
            raw.send_frame(&body).await.unwrap();
        }
        raw.flush().await.unwrap();

        let (_, mut reader) = ClientCodec::from_stream(client).into_split();
        let mut response = Response::default();
        reader.read_response_header(&mut response).await.unwrap();
        reader.read_response_body(None).await.unwrap();

        reader.read_response_header(&mut response).await.unwrap();
        assert_eq!(response.seq, 2);
        let mut reply = String::new();
        reader.read_response_body(Some(&mut reply)).await.unwrap();
        assert_eq!(reply, "reply 2");
    }

    #[tokio::test]
    async fn test_error_response_leaves_reply_untouched() {
        let (client, server) = duplex(4096);
        let mut raw = FrameWriter::new(server);
        let header = MsgPackCodec::encode(&ResponseHeader::new(3, "not found")).unwrap();
        raw.send_frame(&header).await.unwrap();
        raw.send_frame(&[]).await.unwrap();
        raw.flush().await.unwrap();

        let mut codec = ClientCodec::from_stream(client);
        let mut response = Response::default();
        codec.read_response_header(&mut response).await.unwrap();
        assert_eq!(response.error, "not found");

        let mut reply = EchoArgs {
            msg: "untouched".to_string(),
        };
        codec.read_response_body(Some(&mut reply)).await.unwrap();
        assert_eq!(reply.msg, "untouched");
    }

    #[tokio::test]
    async fn test_header_scratch_reset_after_body() {
        let (client, server) = duplex(4096);
        let mut raw = FrameWriter::new(server);
        let header = MsgPackCodec::encode(&ResponseHeader::new(9, "failed")).unwrap();
        raw.send_frame(&header).await.unwrap();
        raw.send_frame(&[]).await.unwrap();
        // Second header frame is empty: it must not inherit the old error.
        raw.send_frame(&[]).await.unwrap();
        raw.flush().await.unwrap();

        let mut codec = ClientCodec::from_stream(client);
        let mut response = Response::default();
        codec.read_response_header(&mut response).await.unwrap();
        codec.read_response_body(None).await.unwrap();

        codec.read_response_header(&mut response).await.unwrap();
        assert_eq!(response, Response::default());
    }

    #[tokio::test]
    async fn test_malformed_header_is_error() {
        let (client, server) = duplex(4096);
        let mut raw = FrameWriter::new(server);
        raw.send_frame(&[0xC1, 0x00]).await.unwrap();
        raw.flush().await.unwrap();

        let mut codec = ClientCodec::from_stream(client);
        let mut response = Response::default();
        assert!(codec.read_response_header(&mut response).await.is_err());
    }

    #[tokio::test]
    async fn test_peer_close_surfaces_connection_closed() {
        let (client, server) = duplex(4096);
        drop(server);

        let mut codec = ClientCodec::from_stream(client);
        let mut response = Response::default();
        let err = codec.read_response_header(&mut response).await.unwrap_err();
        assert!(matches!(err, crate::FramewireError::ConnectionClosed));
    }
}
