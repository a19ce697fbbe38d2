//! Transport module - length-prefixed frames over a byte stream.
//!
//! Provides:
//! - [`FrameReader`] - buffered frame reads with an in-place decode fast path
//! - [`FrameWriter`] - buffered frame writes with temporary-error retry
//! - [`classify`] - the temporary/fatal split for write errors
//!
//! # Frame Format
//!
//! ```text
//! ┌──────────────────┬─────────────────────┐
//! │ uvarint length L │ payload (L bytes)   │
//! └──────────────────┴─────────────────────┘
//! ```
//!
//! `L == 0` is an explicit empty payload. There is no terminator; end of
//! stream between frames means the peer is gone.

mod reader;
mod writer;

use std::io;

pub use reader::FrameReader;
pub use writer::FrameWriter;

/// Whether a failed I/O operation may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry the same operation; nothing was lost.
    Temporary,
    /// The connection is unusable.
    Fatal,
}

/// Classify an I/O error.
///
/// `Interrupted`, `WouldBlock` and `TimedOut` are temporary. Everything else
/// is fatal.
#[inline]
pub fn classify(err: &io::Error) -> ErrorClass {
    match err.kind() {
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            ErrorClass::Temporary
        }
        _ => ErrorClass::Fatal,
    }
}
