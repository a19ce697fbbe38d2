//! Codec module - payload capability and the RPC codec seam.
//!
//! - [`Message`] - capability every header and body type implements
//! - [`Encode`] / [`Decode`] - object-safe views of a `Message`, used at the
//!   codec boundary so the codec methods need no type parameters
//! - [`MsgPackCodec`] and [`marshal`] - the MsgPack wire encoding
//! - [`ClientCodec`] / [`ServerCodec`] - the two connection-bound codecs
//!
//! # Design
//!
//! A dispatch runtime talks to a connection only through four traits:
//!
//! ```text
//!   client side                       server side
//!   RequestWriter  ── header+body ──► RequestReader
//!   ResponseReader ◄── header+body ── ResponseWriter
//! ```
//!
//! Each concrete codec implements both traits of its side and can be split
//! into a read half and a write half, so one task can drive the read loop
//! while writes are serialised elsewhere.

mod client;
pub mod msgpack;
mod server;

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub use client::{ClientCodec, ClientRequestWriter, ClientResponseReader};
pub use msgpack::{marshal, unmarshal, MsgPackCodec};
pub use server::{ServerCodec, ServerRequestReader, ServerResponseWriter};

/// Capability required from every payload carried on the wire.
///
/// Implementing it is a one-liner for most types:
///
/// ```
/// use framewire::Message;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Default)]
/// struct EchoRequest {
///     msg: String,
/// }
///
/// impl Message for EchoRequest {}
/// ```
///
/// Types that can cheaply compute their exact encoded size should override
/// [`Message::encoded_len`]; they are then encoded straight into the codec's
/// reusable scratch buffer instead of a fresh allocation.
pub trait Message: Serialize + DeserializeOwned + Send + Sync {
    /// Exact MsgPack encoded size, when known without encoding.
    ///
    /// Returning a size smaller than the real encoding makes marshalling
    /// fail with an encode error.
    #[inline]
    fn encoded_len(&self) -> Option<usize> {
        None
    }
}

macro_rules! impl_message {
    ($($ty:ty),* $(,)?) => {
        $(impl Message for $ty {})*
    };
}

impl_message!((), bool, u32, u64, i32, i64, f64, String);

/// Object-safe encoding view of a [`Message`].
pub trait Encode: Send + Sync {
    /// Exact encoded size, if the fast path is available.
    fn fast_len(&self) -> Option<usize>;

    /// Encode into `buf`, returning the number of bytes written.
    fn encode_in_place(&self, buf: &mut [u8]) -> Result<usize>;

    /// Encode into a freshly allocated vector.
    fn encode_owned(&self) -> Result<Vec<u8>>;
}

impl<T: Message> Encode for T {
    #[inline]
    fn fast_len(&self) -> Option<usize> {
        self.encoded_len()
    }

    fn encode_in_place(&self, buf: &mut [u8]) -> Result<usize> {
        MsgPackCodec::encode_into(self, buf)
    }

    fn encode_owned(&self) -> Result<Vec<u8>> {
        MsgPackCodec::encode(self)
    }
}

/// Object-safe decoding view of a [`Message`].
pub trait Decode: Send {
    /// Decode `data` and overwrite `self` with the result.
    fn decode_from(&mut self, data: &[u8]) -> Result<()>;
}

impl<T: Message> Decode for T {
    fn decode_from(&mut self, data: &[u8]) -> Result<()> {
        *self = MsgPackCodec::decode(data)?;
        Ok(())
    }
}

/// Request metadata as seen by the dispatch runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Sequence number chosen by the client.
    pub seq: u64,
    /// Dotted `"Service.Method"` name.
    pub service_method: String,
}

impl Request {
    /// Create a new request record.
    pub fn new(seq: u64, service_method: impl Into<String>) -> Self {
        Self {
            seq,
            service_method: service_method.into(),
        }
    }
}

/// Response metadata as seen by the dispatch runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Sequence number of the request being answered.
    pub seq: u64,
    /// Reserved, not trusted.
    pub service_method: String,
    /// Application error; empty on success.
    pub error: String,
}

impl Response {
    /// Successful response for `seq`.
    pub fn ok(seq: u64) -> Self {
        Self {
            seq,
            ..Self::default()
        }
    }

    /// Error response for `seq`.
    pub fn error(seq: u64, error: impl Into<String>) -> Self {
        Self {
            seq,
            error: error.into(),
            ..Self::default()
        }
    }
}

/// Client side: encodes outgoing calls.
pub trait RequestWriter: Send {
    /// Send `request`'s header frame then `args` as the body frame, and flush.
    fn write_request(
        &mut self,
        request: &Request,
        args: Option<&dyn Encode>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Flush and shut down the write half of the connection.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Client side: decodes incoming replies.
pub trait ResponseReader: Send {
    /// Read the next response header frame into `response`.
    fn read_response_header(
        &mut self,
        response: &mut Response,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Read the body frame that follows the last header.
    ///
    /// With `reply == None` the frame is still consumed, keeping the stream
    /// aligned.
    fn read_response_body(
        &mut self,
        reply: Option<&mut dyn Decode>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Server side: decodes incoming calls.
pub trait RequestReader: Send {
    /// Read the next request header frame into `request`.
    fn read_request_header(
        &mut self,
        request: &mut Request,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Read the body frame that follows the last header.
    ///
    /// The frame is consumed exactly once whether or not `args` is given.
    fn read_request_body(
        &mut self,
        args: Option<&mut dyn Decode>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Server side: encodes outgoing replies.
pub trait ResponseWriter: Send {
    /// Send `response`'s header frame then `reply` as the body, and flush.
    ///
    /// A non-empty `response.error` suppresses the reply; the body frame is
    /// then always empty.
    fn write_response(
        &mut self,
        response: &Response,
        reply: Option<&dyn Encode>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Flush and shut down the write half of the connection.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}
