//! Server runtime: dispatches decoded requests to registered handlers.
//!
//! One read loop per connection. Each request is decoded on the loop, then
//! its handler runs on its own task; responses are written under an async
//! mutex, so they may leave in a different order than requests arrived.
//!
//! ```text
//! read header ─► lookup ─► read body ─► spawn ─► handler ─► lock writer ─► write response
//!      ▲                                  │
//!      └──────────────────────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::{HandlerRegistry, HandlerResult, Invocation};
use crate::codec::{Message, Request, RequestReader, Response, ResponseWriter, ServerCodec};
use crate::config::CodecConfig;
use crate::error::{FramewireError, Result};

/// Builder for configuring and creating a [`Server`].
pub struct ServerBuilder {
    registry: HandlerRegistry,
    config: CodecConfig,
}

impl ServerBuilder {
    /// Create a new server builder.
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            config: CodecConfig::default(),
        }
    }

    /// Register a method handler.
    pub fn handle<F, A, R, Fut>(mut self, method: &str, handler: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        A: Message + Default + 'static,
        R: Message + 'static,
        Fut: Future<Output = std::result::Result<R, String>> + Send + 'static,
    {
        self.registry.register(method, handler);
        self
    }

    /// Set the codec configuration used for accepted connections.
    pub fn config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the server.
    pub fn build(self) -> Server {
        Server {
            registry: self.registry,
            config: self.config,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// RPC server owning a method registry.
///
/// # Example
///
/// ```ignore
/// let server = Server::builder()
///     .handle("Echo.Echo", |args: EchoArgs| async move { Ok::<_, String>(args) })
///     .build();
///
/// server.serve_stream(stream).await?;
/// ```
pub struct Server {
    registry: HandlerRegistry,
    config: CodecConfig,
}

impl Server {
    /// Create a server from a prepared registry.
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            config: CodecConfig::default(),
        }
    }

    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The method registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Codec configuration for accepted connections.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Serve one duplex stream until the peer disconnects.
    pub async fn serve_stream<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) =
            ServerCodec::from_stream_with_config(stream, &self.config).into_split();
        self.serve_codec(reader, writer).await
    }

    /// Serve requests from `reader`, writing responses to `writer`.
    ///
    /// Returns `Ok(())` when the peer closes the connection between
    /// requests. Any other read or decode error ends the connection and is
    /// returned. Handlers still running are awaited, then `writer` is
    /// closed.
    pub async fn serve_codec<R, W>(&self, mut reader: R, writer: W) -> Result<()>
    where
        R: RequestReader,
        W: ResponseWriter + 'static,
    {
        let writer = Arc::new(Mutex::new(writer));
        let mut tasks = JoinSet::new();

        let result = self.read_loop(&mut reader, &writer, &mut tasks).await;
        match &result {
            Ok(()) => debug!("connection closed by peer"),
            Err(e) => error!(error = %e, "connection failed"),
        }

        while tasks.join_next().await.is_some() {}
        if let Err(e) = writer.lock().await.close().await {
            debug!(error = %e, "failed to close connection");
        }
        result
    }

    async fn read_loop<R, W>(
        &self,
        reader: &mut R,
        writer: &Arc<Mutex<W>>,
        tasks: &mut JoinSet<()>,
    ) -> Result<()>
    where
        R: RequestReader,
        W: ResponseWriter + 'static,
    {
        let mut request = Request::default();
        loop {
            match reader.read_request_header(&mut request).await {
                Ok(()) => {}
                Err(FramewireError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e),
            }

            let Some(handler) = self.registry.get_handler(&request.service_method) else {
                warn!(method = %request.service_method, seq = request.seq, "unknown method");
                reader.read_request_body(None).await?;
                let response = Response::error(
                    request.seq,
                    format!("rpc: can't find method {}", request.service_method),
                );
                writer.lock().await.write_response(&response, None).await?;
                continue;
            };

            let mut invocation = handler.prepare();
            reader.read_request_body(Some(invocation.args())).await?;

            let seq = request.seq;
            let method = request.service_method.clone();
            let writer = Arc::clone(writer);
            tasks.spawn(async move {
                let outcome = run_invocation(invocation, &method, seq).await;
                let mut writer = writer.lock().await;
                let written = match outcome {
                    Ok(reply) => {
                        writer
                            .write_response(&Response::ok(seq), Some(&*reply))
                            .await
                    }
                    Err(message) => {
                        debug!(%method, seq, error = %message, "handler returned error");
                        writer.write_response(&Response::error(seq, message), None).await
                    }
                };
                if let Err(e) = written {
                    error!(%method, seq, error = %e, "failed to write response");
                }
            });

            // Reap finished handlers so the set does not grow with the connection.
            while tasks.try_join_next().is_some() {}
        }
    }
}

/// Run a handler on its own task so that a panic still produces a response.
async fn run_invocation(invocation: Box<dyn Invocation>, method: &str, seq: u64) -> HandlerResult {
    match tokio::spawn(invocation.invoke()).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            error!(%method, seq, "handler panicked");
            Err(format!("rpc: method {method} panicked"))
        }
        Err(e) => Err(format!("rpc: method {method} did not complete: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ClientCodec, RequestWriter, ResponseReader};
    use std::time::Duration;
    use tokio::io::duplex;

    fn echo_server() -> Server {
        Server::builder()
            .handle("Echo.Echo", |msg: String| async move { Ok::<_, String>(msg) })
            .handle("Echo.Fail", |_: ()| async { Err::<(), _>("failed".to_string()) })
            .build()
    }

    #[test]
    fn test_builder_registers_handlers() {
        let server = echo_server();
        assert_eq!(server.registry().len(), 2);
        assert_eq!(*server.config(), CodecConfig::default());
    }

    #[tokio::test]
    async fn test_serve_echo_and_errors() {
        let (client_io, server_io) = duplex(4096);
        let server = echo_server();
        let serving = tokio::spawn(async move { server.serve_stream(server_io).await });

        let mut client = ClientCodec::from_stream(client_io);
        client
            .write_request(&Request::new(1, "Echo.Echo"), Some(&"hi".to_string()))
            .await
            .unwrap();

        let mut response = Response::default();
        client.read_response_header(&mut response).await.unwrap();
        let mut reply = String::new();
        client.read_response_body(Some(&mut reply)).await.unwrap();
        assert_eq!((response.seq, reply.as_str()), (1, "hi"));

        client
            .write_request(&Request::new(2, "Echo.Fail"), None)
            .await
            .unwrap();
        client.read_response_header(&mut response).await.unwrap();
        client.read_response_body(None).await.unwrap();
        assert_eq!(response.seq, 2);
        assert_eq!(response.error, "failed");

        client
            .write_request(&Request::new(3, "Nope.Nope"), Some(&"ignored".to_string()))
            .await
            .unwrap();
        client.read_response_header(&mut response).await.unwrap();
        client.read_response_body(None).await.unwrap();
        assert_eq!(response.seq, 3);
        assert_eq!(response.error, "rpc: can't find method Nope.Nope");

        client.close().await.unwrap();
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_panicking_handler_answers_with_error() {
        let server = Server::builder()
            .handle("Svc.Boom", |fail: bool| async move {
                if fail {
                    panic!("boom");
                }
                Ok::<_, String>(1u32)
            })
            .build();
        let (client_io, server_io) = duplex(4096);
        let serving = tokio::spawn(async move { server.serve_stream(server_io).await });

        let mut client = ClientCodec::from_stream(client_io);
        let mut response = Response::default();
        client
            .write_request(&Request::new(1, "Svc.Boom"), Some(&true))
            .await
            .unwrap();
        tokio::time::timeout(
            Duration::from_secs(5),
            client.read_response_header(&mut response),
        )
        .await
        .unwrap()
        .unwrap();
        client.read_response_body(None).await.unwrap();
        assert_eq!(response.seq, 1);
        assert_eq!(response.error, "rpc: method Svc.Boom panicked");

        // The connection keeps serving after the panic.
        client
            .write_request(&Request::new(2, "Svc.Boom"), Some(&false))
            .await
            .unwrap();
        client.read_response_header(&mut response).await.unwrap();
        let mut reply = 0u32;
        client.read_response_body(Some(&mut reply)).await.unwrap();
        assert_eq!((response.seq, response.error.as_str(), reply), (2, "", 1));

        client.close().await.unwrap();
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_body_ends_connection() {
        let (client_io, server_io) = duplex(4096);
        let server = echo_server();
        let serving = tokio::spawn(async move { server.serve_stream(server_io).await });

        let mut client = ClientCodec::from_stream(client_io);
        client
            .write_request(&Request::new(1, "Echo.Echo"), Some(&7u32))
            .await
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), serving)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_err());

        let mut response = Response::default();
        let err = client.read_response_header(&mut response).await.unwrap_err();
        assert!(matches!(err, FramewireError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_in_flight_handlers_finish_before_close() {
        let server = Server::builder()
            .handle("Slow.Echo", |msg: String| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, String>(msg)
            })
            .build();
        let (client_io, server_io) = duplex(4096);
        let serving = tokio::spawn(async move { server.serve_stream(server_io).await });

        let (mut writer, mut reader) = ClientCodec::from_stream(client_io).into_split();
        writer
            .write_request(&Request::new(1, "Slow.Echo"), Some(&"late".to_string()))
            .await
            .unwrap();
        writer.close().await.unwrap();

        let mut response = Response::default();
        reader.read_response_header(&mut response).await.unwrap();
        let mut reply = String::new();
        reader.read_response_body(Some(&mut reply)).await.unwrap();
        assert_eq!(reply, "late");
        serving.await.unwrap().unwrap();
    }
}
