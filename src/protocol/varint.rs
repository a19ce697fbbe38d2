//! Unsigned LEB128 varints used as frame length prefixes.
//!
//! ```text
//! 300 = 0b1_0010_1100  ->  [0xAC, 0x02]
//!        low 7 bits first, high bit set on every byte but the last
//! ```
//!
//! Encoding is always minimal. A `u64` never needs more than
//! [`MAX_VARINT_LEN`] bytes.

use crate::error::{FramewireError, Result};

/// Maximum encoded length of a `u64` varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Encode `value` into `buf`, returning the number of bytes written.
///
/// # Example
///
/// ```
/// use framewire::protocol::{put_uvarint, MAX_VARINT_LEN};
///
/// let mut buf = [0u8; MAX_VARINT_LEN];
/// let n = put_uvarint(&mut buf, 300);
/// assert_eq!(&buf[..n], &[0xAC, 0x02]);
/// ```
#[inline]
pub fn put_uvarint(buf: &mut [u8; MAX_VARINT_LEN], mut value: u64) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// Incremental varint decoder fed one byte at a time.
///
/// Used by the frame reader, which pulls bytes from a buffered stream and
/// cannot know the prefix length up front.
#[derive(Debug, Default, Clone, Copy)]
pub struct UvarintDecoder {
    value: u64,
    shift: u32,
    count: usize,
}

impl UvarintDecoder {
    /// Create a decoder with no bytes consumed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next byte.
    ///
    /// Returns `Ok(Some(value))` once the final byte has been seen,
    /// `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the varint overflows 64 bits.
    pub fn push(&mut self, byte: u8) -> Result<Option<u64>> {
        if self.count == MAX_VARINT_LEN {
            return Err(overflow());
        }
        self.count += 1;

        if byte < 0x80 {
            if self.count == MAX_VARINT_LEN && byte > 1 {
                return Err(overflow());
            }
            return Ok(Some(self.value | (u64::from(byte) << self.shift)));
        }

        if self.count == MAX_VARINT_LEN {
            return Err(overflow());
        }
        self.value |= u64::from(byte & 0x7f) << self.shift;
        self.shift += 7;
        Ok(None)
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.count
    }
}

/// Decode a varint from the front of `buf`.
///
/// Returns `Ok(None)` if `buf` ends before the varint does, otherwise the
/// value and the number of bytes it occupied.
pub fn decode_uvarint(buf: &[u8]) -> Result<Option<(u64, usize)>> {
    let mut decoder = UvarintDecoder::new();
    for &byte in buf {
        if let Some(value) = decoder.push(byte)? {
            return Ok(Some((value, decoder.consumed())));
        }
    }
    Ok(None)
}

fn overflow() -> FramewireError {
    FramewireError::Protocol("varint overflows a 64-bit integer".to_string())
}
