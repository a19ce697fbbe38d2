//! MsgPack encoding using `rmp-serde`, and the marshal helper.
//!
//! Structs are always written as maps with field names (`to_vec_named` /
//! `write_named`), never positionally, so headers and bodies stay readable
//! by any MsgPack peer that knows the field names.
//!
//! # Example
//!
//! ```
//! use framewire::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Message {
//!     id: u32,
//!     content: String,
//! }
//!
//! let msg = Message { id: 42, content: "hello".to_string() };
//! let encoded = MsgPackCodec::encode(&msg).unwrap();
//! let decoded: Message = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use std::borrow::Cow;

use bytes::BytesMut;

use super::{Decode, Encode};
use crate::error::Result;

/// MessagePack codec for structured data.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to freshly allocated MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Encode a value into `buf`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized or does not fit.
    pub fn encode_into<T: serde::Serialize + ?Sized>(value: &T, buf: &mut [u8]) -> Result<usize> {
        let capacity = buf.len();
        let mut cursor: &mut [u8] = buf;
        rmp_serde::encode::write_named(&mut cursor, value)?;
        Ok(capacity - cursor.len())
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Serialize `payload` for a frame.
///
/// - `None` yields an empty slice and allocates nothing.
/// - A payload with a known size is encoded in place into `scratch`, which is
///   cleared and regrown but never replaced, and a view of it is returned.
/// - Anything else goes through the generic encoder into a new vector.
pub fn marshal<'a>(
    scratch: &'a mut BytesMut,
    payload: Option<&dyn Encode>,
) -> Result<Cow<'a, [u8]>> {
    let Some(payload) = payload else {
        return Ok(Cow::Borrowed(&[]));
    };

    match payload.fast_len() {
        Some(len) => {
            scratch.clear();
            scratch.resize(len, 0);
            let written = payload.encode_in_place(&mut scratch[..])?;
            scratch.truncate(written);
            Ok(Cow::Borrowed(&scratch[..]))
        }
        None => Ok(Cow::Owned(payload.encode_owned()?)),
    }
}

/// Decode a frame payload into `target`, replacing its contents.
#[inline]
pub fn unmarshal(data: &[u8], target: &mut dyn Decode) -> Result<()> {
    target.decode_from(data)
}

/// Exact MsgPack sizes, for implementing [`Message::encoded_len`].
///
/// [`Message::encoded_len`]: super::Message::encoded_len
pub mod size {
    /// Size of an unsigned integer in its most compact encoding.
    #[inline]
    pub fn uint(value: u64) -> usize {
        if value < 0x80 {
            1
        } else if value <= u8::MAX as u64 {
            2
        } else if value <= u16::MAX as u64 {
            3
        } else if value <= u32::MAX as u64 {
            5
        } else {
            9
        }
    }

    /// Size of a UTF-8 string of `len` bytes, marker included.
    #[inline]
    pub fn str(len: usize) -> usize {
        let marker = if len < 32 {
            1
        } else if len <= u8::MAX as usize {
            2
        } else if len <= u16::MAX as usize {
            3
        } else {
            5
        };
        marker + len
    }

    /// Size of a map header with `entries` key/value pairs.
    #[inline]
    pub fn map_header(entries: usize) -> usize {
        if entries < 16 {
            1
        } else if entries <= u16::MAX as usize {
            3
        } else {
            5
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Message;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug, Default)]
    struct TestStruct {
        id: u32,
        name: String,
        active: bool,
    }

    impl Message for TestStruct {}

    #[derive(Serialize, Deserialize, PartialEq, Debug, Default)]
    struct Note {
        msg: String,
    }

    impl Message for Note {
        fn encoded_len(&self) -> Option<usize> {
            Some(size::map_header(1) + size::str(3) + size::str(self.msg.len()))
        }
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = TestStruct {
            id: 42,
            name: "test".to_string(),
            active: true,
        };

        let encoded = MsgPackCodec::encode(&original).unwrap();
        let decoded: TestStruct = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_to_vec_named_produces_map_format() {
        let test = TestStruct {
            id: 1,
            name: "x".to_string(),
            active: false,
        };

        let encoded = MsgPackCodec::encode(&test).unwrap();

        // 0x83 = fixmap with 3 elements; array format would be 0x93
        assert_eq!(encoded[0], 0x83, "Expected map format, got {:02X}", encoded[0]);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let invalid = b"not valid msgpack";
        let result: Result<TestStruct> = MsgPackCodec::decode(invalid);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_into_matches_encode() {
        let value = Note {
            msg: "hello".to_string(),
        };
        let mut buf = [0u8; 64];
        let n = MsgPackCodec::encode_into(&value, &mut buf).unwrap();
        assert_eq!(&buf[..n], MsgPackCodec::encode(&value).unwrap().as_slice());
    }

    #[test]
    fn test_encode_into_too_small_buffer_fails() {
        let value = Note {
            msg: "hello".to_string(),
        };
        let mut buf = [0u8; 3];
        assert!(MsgPackCodec::encode_into(&value, &mut buf).is_err());
    }

    #[test]
    fn test_marshal_none_is_empty() {
        let mut scratch = BytesMut::new();
        let out = marshal(&mut scratch, None).unwrap();
        assert!(out.is_empty());
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_marshal_sized_uses_scratch() {
        let mut scratch = BytesMut::with_capacity(128);
        let value = Note {
            msg: "hello".to_string(),
        };

        let ptr = {
            let out = marshal(&mut scratch, Some(&value)).unwrap();
            assert!(matches!(out, Cow::Borrowed(_)));
            assert_eq!(out.as_ref(), MsgPackCodec::encode(&value).unwrap().as_slice());
            out.as_ptr()
        };

        // Second round reuses the same allocation.
        let value = Note {
            msg: "bye".to_string(),
        };
        let out = marshal(&mut scratch, Some(&value)).unwrap();
        assert_eq!(out.as_ptr(), ptr);
        assert_eq!(out.as_ref(), MsgPackCodec::encode(&value).unwrap().as_slice());
    }

    #[test]
    fn test_marshal_generic_allocates() {
        let mut scratch = BytesMut::new();
        let value = TestStruct::default();

        let out = marshal(&mut scratch, Some(&value)).unwrap();
        assert!(matches!(out, Cow::Owned(_)));
        assert_eq!(out.as_ref(), MsgPackCodec::encode(&value).unwrap().as_slice());
    }

    #[test]
    fn test_marshal_paths_produce_identical_bytes() {
        let sized = Note {
            msg: "same bytes".to_string(),
        };
        let mut scratch = BytesMut::new();
        let fast = marshal(&mut scratch, Some(&sized)).unwrap().into_owned();
        assert_eq!(fast, sized.encode_owned().unwrap());
    }

    #[test]
    fn test_unmarshal_into_target() {
        let bytes = MsgPackCodec::encode(&Note {
            msg: "in".to_string(),
        })
        .unwrap();
        let mut target = Note::default();
        unmarshal(&bytes, &mut target).unwrap();
        assert_eq!(target.msg, "in");
    }

    #[test]
    fn test_size_helpers_match_encoder() {
        for value in [0u64, 127, 128, 255, 256, 65_535, 65_536, u32::MAX as u64, u64::MAX] {
            assert_eq!(size::uint(value), MsgPackCodec::encode(&value).unwrap().len());
        }
        for len in [0usize, 31, 32, 255, 256, 65_535, 65_536] {
            let s = "a".repeat(len);
            assert_eq!(size::str(len), MsgPackCodec::encode(&s).unwrap().len());
        }
    }
}
