//! Client runtime: sequence numbering and reply correlation.
//!
//! The [`Client`] owns the write half of a client codec and spawns a read
//! loop for the read half. Every call gets the next sequence number and an
//! entry in the pending-call table; the read loop matches each response to
//! its entry by `Id` alone, so replies may arrive in any order.
//!
//! # Example
//!
//! ```ignore
//! use framewire::{rpc::Client, codec::ClientCodec};
//!
//! let (read, write) = stream.into_split();
//! let client = Client::new(ClientCodec::new(read, write));
//!
//! let reply: String = client.call("Echo.Echo", &"hello".to_string()).await?;
//! client.close().await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::codec::{
    ClientCodec, ClientRequestWriter, Decode, Encode, Message, Request, RequestWriter, Response,
    ResponseReader,
};
use crate::error::{FramewireError, Result};

/// A call waiting for its response.
trait PendingCall: Send {
    /// Decode target for the response body.
    fn reply(&mut self) -> &mut dyn Decode;

    /// Deliver the outcome to the caller.
    fn complete(self: Box<Self>, result: Result<()>);
}

struct TypedPending<T> {
    reply: T,
    tx: oneshot::Sender<Result<T>>,
}

impl<T: Message> PendingCall for TypedPending<T> {
    fn reply(&mut self) -> &mut dyn Decode {
        &mut self.reply
    }

    fn complete(self: Box<Self>, result: Result<()>) {
        let TypedPending { reply, tx } = *self;
        // The caller may have given up waiting.
        let _ = tx.send(result.map(|()| reply));
    }
}

#[derive(Default)]
struct CallTable {
    calls: HashMap<u64, Box<dyn PendingCall>>,
    /// Set once the read loop has stopped; no new calls are accepted.
    shutdown: bool,
    /// Set by [`Client::close`].
    closing: bool,
}

impl CallTable {
    /// Fail every pending call and refuse new ones.
    fn terminate(&mut self) {
        self.shutdown = true;
        for (_, call) in self.calls.drain() {
            call.complete(Err(FramewireError::Shutdown));
        }
    }
}

/// Cleans up after a call future, including one dropped by its caller.
///
/// The pending entry is always removed. If the future was dropped while the
/// request was being written, part of a frame may already be on the wire and
/// the stream can no longer be framed, so the whole client is shut down.
struct CallGuard<'a> {
    pending: &'a Mutex<CallTable>,
    read_task: &'a JoinHandle<()>,
    seq: u64,
    writing: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        let mut table = self.pending.lock();
        table.calls.remove(&self.seq);
        if self.writing && !table.shutdown {
            warn!(seq = self.seq, "request write interrupted, shutting down client");
            table.terminate();
            self.read_task.abort();
        }
    }
}

/// RPC client bound to one connection.
pub struct Client<W> {
    writer: AsyncMutex<W>,
    pending: Arc<Mutex<CallTable>>,
    seq: AtomicU64,
    read_task: JoinHandle<()>,
}

impl<W> Client<ClientRequestWriter<W>>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a client from a codec and start its read loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<R>(codec: ClientCodec<R, W>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (writer, reader) = codec.into_split();
        Self::from_parts(writer, reader)
    }
}

impl<W: RequestWriter> Client<W> {
    /// Create a client from separate codec halves and start its read loop.
    pub fn from_parts<R>(writer: W, reader: R) -> Self
    where
        R: ResponseReader + 'static,
    {
        let pending = Arc::new(Mutex::new(CallTable::default()));
        let read_task = tokio::spawn(read_loop(reader, Arc::clone(&pending)));

        Self {
            writer: AsyncMutex::new(writer),
            pending,
            seq: AtomicU64::new(0),
            read_task,
        }
    }

    /// Call `method` with `args` and wait for the reply.
    ///
    /// # Errors
    ///
    /// - [`FramewireError::Remote`] if the handler returned an error
    /// - [`FramewireError::Shutdown`] if the connection went away first
    /// - any error from writing the request
    pub async fn call<A, R>(&self, method: &str, args: &A) -> Result<R>
    where
        A: Message,
        R: Message + Default + 'static,
    {
        self.call_with(method, Some(args)).await
    }

    /// Call `method` with an empty request body.
    pub async fn call_without_args<R>(&self, method: &str) -> Result<R>
    where
        R: Message + Default + 'static,
    {
        self.call_with::<(), R>(method, None).await
    }

    async fn call_with<A, R>(&self, method: &str, args: Option<&A>) -> Result<R>
    where
        A: Message,
        R: Message + Default + 'static,
    {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut table = self.pending.lock();
            if table.shutdown || table.closing {
                return Err(FramewireError::Shutdown);
            }
            table.calls.insert(
                seq,
                Box::new(TypedPending {
                    reply: R::default(),
                    tx,
                }),
            );
        }

        let mut guard = CallGuard {
            pending: &self.pending,
            read_task: &self.read_task,
            seq,
            writing: false,
        };

        let request = Request::new(seq, method);
        let args = args.map(|a| a as &dyn Encode);
        {
            let mut writer = self.writer.lock().await;
            let shutdown = self.pending.lock().shutdown;
            if shutdown {
                return Err(FramewireError::Shutdown);
            }
            guard.writing = true;
            writer.write_request(&request, args).await?;
            guard.writing = false;
        }

        rx.await.map_err(|_| FramewireError::Shutdown)?
    }

    /// Number of calls waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.pending.lock().calls.len()
    }

    /// Check if the client no longer accepts calls.
    pub fn is_shutdown(&self) -> bool {
        let table = self.pending.lock();
        table.shutdown || table.closing
    }

    /// Close the connection.
    ///
    /// Pending calls fail with [`FramewireError::Shutdown`].
    ///
    /// # Errors
    ///
    /// Returns [`FramewireError::Shutdown`] if already closed, or the error
    /// from shutting down the write half.
    pub async fn close(&self) -> Result<()> {
        {
            let mut table = self.pending.lock();
            if table.closing {
                return Err(FramewireError::Shutdown);
            }
            table.closing = true;
        }

        let result = self.writer.lock().await.close().await;
        self.read_task.abort();
        self.pending.lock().terminate();
        result
    }
}

impl<W> Drop for Client<W> {
    fn drop(&mut self) {
        self.read_task.abort();
    }
}

async fn read_loop<R: ResponseReader>(mut reader: R, pending: Arc<Mutex<CallTable>>) {
    match receive_responses(&mut reader, &pending).await {
        Err(FramewireError::ConnectionClosed) => debug!("connection closed by server"),
        Err(e) => error!(error = %e, "client read loop failed"),
        Ok(()) => {}
    }
    pending.lock().terminate();
}

async fn receive_responses<R: ResponseReader>(
    reader: &mut R,
    pending: &Mutex<CallTable>,
) -> Result<()> {
    let mut response = Response::default();
    loop {
        reader.read_response_header(&mut response).await?;
        let call = pending.lock().calls.remove(&response.seq);

        match call {
            None => {
                debug!(seq = response.seq, "response for unknown call, discarding body");
                reader.read_response_body(None).await?;
            }
            Some(call) if !response.error.is_empty() => {
                reader.read_response_body(None).await?;
                call.complete(Err(FramewireError::Remote(std::mem::take(&mut response.error))));
            }
            Some(mut call) => match reader.read_response_body(Some(call.reply())).await {
                Ok(()) => call.complete(Ok(())),
                Err(e) => {
                    call.complete(Err(FramewireError::Protocol(format!("reading body: {e}"))));
                    return Err(e);
                }
            },
        }
    }
}
