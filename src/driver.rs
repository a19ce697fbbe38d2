//! Connection driver: binds codecs to TCP connections.
//!
//! # Server
//!
//! ```ignore
//! let server = Arc::new(Server::builder().handle("Echo.Echo", echo).build());
//! framewire::driver::listen_and_serve("127.0.0.1:7000", server).await?;
//! ```
//!
//! Every accepted connection gets its own task and its own codec. A failing
//! connection is logged and dropped; the accept loop keeps running.
//!
//! # Client
//!
//! ```ignore
//! let client = framewire::driver::dial("127.0.0.1:7000", &CodecConfig::default()).await?;
//! let reply: String = client.call("Echo.Echo", &"hi".to_string()).await?;
//! ```

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

use crate::codec::{ClientCodec, ClientRequestWriter, ServerCodec};
use crate::config::CodecConfig;
use crate::error::Result;
use crate::rpc::{Client, Server};

/// Client bound to a TCP connection.
pub type TcpClient = Client<ClientRequestWriter<OwnedWriteHalf>>;

/// Bind a TCP listener.
///
/// # Errors
///
/// Returns the I/O error from binding.
pub async fn listen<A: ToSocketAddrs>(addr: A) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    if let Ok(local) = listener.local_addr() {
        info!(%local, "listening");
    }
    Ok(listener)
}

/// Accept connections forever, serving each on its own task.
pub async fn serve(listener: TcpListener, server: Arc<Server>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };

        let server = Arc::clone(&server);
        tokio::spawn(async move {
            debug!(%peer, "connection accepted");
            serve_connection(stream, &server).await;
            debug!(%peer, "connection finished");
        });
    }
}

/// Bind `addr` and serve it forever.
///
/// # Errors
///
/// Returns only if binding fails.
pub async fn listen_and_serve<A: ToSocketAddrs>(addr: A, server: Arc<Server>) -> Result<()> {
    let listener = listen(addr).await?;
    serve(listener, server).await;
    Ok(())
}

/// Serve a single accepted TCP connection until it closes.
///
/// Errors are logged by the server and not returned.
pub async fn serve_connection(stream: TcpStream, server: &Server) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!(error = %e, "failed to set TCP_NODELAY");
    }
    let (read, write) = stream.into_split();
    let (reader, writer) = ServerCodec::with_config(read, write, server.config()).into_split();
    // Already logged inside serve_codec.
    let _ = server.serve_codec(reader, writer).await;
}

/// Connect to a server over TCP.
///
/// # Errors
///
/// Returns the I/O error from connecting.
pub async fn dial<A: ToSocketAddrs>(addr: A, config: &CodecConfig) -> Result<TcpClient> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    let (read, write) = stream.into_split();
    Ok(Client::new(ClientCodec::with_config(read, write, config)))
}

/// Create a client over any duplex stream (Unix socket, in-memory pipe, ...).
///
/// Must be called from within a tokio runtime.
pub fn client_for_stream<S>(stream: S) -> Client<ClientRequestWriter<WriteHalf<S>>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    Client::new(ClientCodec::from_stream(stream))
}
