//! Protocol module - frame layout, varints and headers.
//!
//! Implements the wire format:
//! ```text
//! Message ::= HeaderFrame BodyFrame
//! Frame   ::= UVarint(len) Payload[len]     ; len == 0 => empty payload
//! ```

mod header;
mod varint;

pub use header::{RequestHeader, ResponseHeader};
pub use varint::{decode_uvarint, put_uvarint, UvarintDecoder, MAX_VARINT_LEN};

/// Default maximum frame payload size (1 GB).
pub const DEFAULT_MAX_FRAME_SIZE: u64 = 1_073_741_824;
