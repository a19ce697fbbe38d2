//! Request and response headers.
//!
//! Every logical message is a header frame followed by a body frame. The
//! header tells the peer which call the body belongs to:
//!
//! ```text
//! RequestHeader  { Id: u64, Method: string }
//! ResponseHeader { Id: u64, Method: string, Error: string }
//! ```
//!
//! Headers are encoded with the same MsgPack map format as bodies. They know
//! their exact encoded size, so the codecs always take the in-place
//! marshal path for them.

use serde::{Deserialize, Serialize};

use crate::codec::{msgpack::size, Message};

const ID_KEY: &str = "Id";
const METHOD_KEY: &str = "Method";
const ERROR_KEY: &str = "Error";

/// Header preceding every request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestHeader {
    /// Call sequence number, unique per outstanding call on a connection.
    #[serde(rename = "Id")]
    pub id: u64,
    /// Dotted `"Service.Method"` name.
    #[serde(rename = "Method")]
    pub method: String,
}

impl RequestHeader {
    /// Create a new request header.
    pub fn new(id: u64, method: impl Into<String>) -> Self {
        Self {
            id,
            method: method.into(),
        }
    }

    /// Zero every field, keeping the method string's allocation.
    #[inline]
    pub fn reset(&mut self) {
        self.id = 0;
        self.method.clear();
    }
}

impl Message for RequestHeader {
    fn encoded_len(&self) -> Option<usize> {
        Some(
            size::map_header(2)
                + size::str(ID_KEY.len())
                + size::uint(self.id)
                + size::str(METHOD_KEY.len())
                + size::str(self.method.len()),
        )
    }
}

/// Header preceding every response body.
///
/// `method` is reserved: servers leave it empty and clients must not rely
/// on it. A non-empty `error` means the body frame is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseHeader {
    /// Echo of the request's sequence number.
    #[serde(rename = "Id")]
    pub id: u64,
    /// Reserved.
    #[serde(rename = "Method")]
    pub method: String,
    /// Application error; empty on success.
    #[serde(rename = "Error")]
    pub error: String,
}

impl ResponseHeader {
    /// Create a new response header with an empty method.
    pub fn new(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            method: String::new(),
            error: error.into(),
        }
    }

    /// Check if this header reports an application error.
    #[inline]
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Zero every field, keeping string allocations.
    #[inline]
    pub fn reset(&mut self) {
        self.id = 0;
        self.method.clear();
        self.error.clear();
    }
}

impl Message for ResponseHeader {
    fn encoded_len(&self) -> Option<usize> {
        Some(
            size::map_header(3)
                + size::str(ID_KEY.len())
                + size::uint(self.id)
                + size::str(METHOD_KEY.len())
                + size::str(self.method.len())
                + size::str(ERROR_KEY.len())
                + size::str(self.error.len()),
        )
    }
}
