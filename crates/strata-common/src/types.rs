//! Field types and field values.
//!
//! Every field type has a fixed on-page width, so a tuple's byte size is
//! known from its schema alone.
//!
//! Encodings:
//! - `Int`: 4 bytes, big-endian two's complement.
//! - `FixedString(n)`: UTF-8 bytes truncated to at most `n` on a character
//!   boundary, zero-padded to exactly `n`. Trailing zero bytes are stripped
//!   on decode.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of an integer field in bytes.
pub const INT_FIELD_SIZE: usize = 4;

/// Error decoding a single field from its byte window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("field needs {needed} bytes, {available} available")]
    ShortBuffer { needed: usize, available: usize },

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
}

/// Type of one schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// 32-bit signed integer.
    Int,
    /// String stored in exactly `n` bytes.
    FixedString(usize),
}

impl FieldType {
    /// Returns the on-page width of this field in bytes.
    pub fn size(&self) -> usize {
        match self {
            FieldType::Int => INT_FIELD_SIZE,
            FieldType::FixedString(len) => *len,
        }
    }

    /// Returns true if `value` can be stored in a field of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldType::Int, Value::Int(_)) | (FieldType::FixedString(_), Value::Str(_))
        )
    }

    /// Normalizes a value to exactly what a round trip through the page
    /// encoding would produce. Returns None if the value has the wrong type.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (FieldType::Int, Value::Int(v)) => Some(Value::Int(v)),
            (FieldType::FixedString(len), Value::Str(s)) => {
                let kept = truncate_utf8(&s, *len).trim_end_matches('\0');
                if kept.len() == s.len() {
                    Some(Value::Str(s))
                } else {
                    Some(Value::Str(kept.to_string()))
                }
            }
            _ => None,
        }
    }

    /// Appends the encoding of `value` to `buf`, writing exactly `self.size()`
    /// bytes. Returns false without writing if the value has the wrong type.
    pub fn encode(&self, value: &Value, buf: &mut impl BufMut) -> bool {
        match (self, value) {
            (FieldType::Int, Value::Int(v)) => {
                buf.put_i32(*v);
                true
            }
            (FieldType::FixedString(len), Value::Str(s)) => {
                let bytes = truncate_utf8(s, *len).as_bytes();
                buf.put_slice(bytes);
                buf.put_bytes(0, len - bytes.len());
                true
            }
            _ => false,
        }
    }

    /// Decodes one value, consuming exactly `self.size()` bytes from `buf`.
    pub fn decode(&self, buf: &mut impl Buf) -> Result<Value, CodecError> {
        let needed = self.size();
        if buf.remaining() < needed {
            return Err(CodecError::ShortBuffer {
                needed,
                available: buf.remaining(),
            });
        }

        match self {
            FieldType::Int => Ok(Value::Int(buf.get_i32())),
            FieldType::FixedString(len) => {
                let mut raw = vec![0u8; *len];
                buf.copy_to_slice(&mut raw);
                let end = raw.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
                raw.truncate(end);
                String::from_utf8(raw)
                    .map(Value::Str)
                    .map_err(|_| CodecError::InvalidUtf8)
            }
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::FixedString(len) => write!(f, "STRING({})", len),
        }
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Int(i32),
    Str(String),
}

impl Value {
    /// Returns the integer payload, if this is an integer.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Str(_) => None,
        }
    }

    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Int(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Returns the longest prefix of `s` that fits in `max` bytes without
/// splitting a character.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn encode(field_type: FieldType, value: &Value) -> BytesMut {
        let mut buf = BytesMut::new();
        assert!(field_type.encode(value, &mut buf));
        buf
    }

    #[test]
    fn test_field_sizes() {
        assert_eq!(FieldType::Int.size(), 4);
        assert_eq!(FieldType::FixedString(16).size(), 16);
    }

    #[test]
    fn test_int_encoding_is_big_endian() {
        let buf = encode(FieldType::Int, &Value::Int(0x0102_0304));
        assert_eq!(&buf[..], &[1, 2, 3, 4]);

        let buf = encode(FieldType::Int, &Value::Int(-1));
        assert_eq!(&buf[..], &[0xFF; 4]);
    }

    #[test]
    fn test_int_decode() {
        let mut src: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFE, 0x99];
        assert_eq!(FieldType::Int.decode(&mut src), Ok(Value::Int(-2)));
        // Exactly four bytes consumed.
        assert_eq!(src, &[0x99]);
    }

    #[test]
    fn test_string_padded_to_declared_length() {
        let buf = encode(FieldType::FixedString(6), &Value::from("abc"));
        assert_eq!(&buf[..], b"abc\0\0\0");

        let mut src: &[u8] = &buf;
        assert_eq!(
            FieldType::FixedString(6).decode(&mut src),
            Ok(Value::from("abc"))
        );
        assert!(src.is_empty());
    }

    #[test]
    fn test_string_truncated_to_declared_length() {
        let buf = encode(FieldType::FixedString(4), &Value::from("abcdefgh"));
        assert_eq!(&buf[..], b"abcd");
    }

    #[test]
    fn test_string_truncation_respects_char_boundary() {
        // "é" is two bytes; a 3-byte field keeps "aé" but not a split byte.
        let buf = encode(FieldType::FixedString(3), &Value::from("aéb"));
        assert_eq!(&buf[..], "aé".as_bytes());

        let buf = encode(FieldType::FixedString(2), &Value::from("aé"));
        assert_eq!(&buf[..], b"a\0");
    }

    #[test]
    fn test_decode_short_buffer() {
        let mut src: &[u8] = &[1, 2];
        assert_eq!(
            FieldType::Int.decode(&mut src),
            Err(CodecError::ShortBuffer {
                needed: 4,
                available: 2
            })
        );
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let mut src: &[u8] = &[0xC3, 0x28, 0, 0];
        assert_eq!(
            FieldType::FixedString(4).decode(&mut src),
            Err(CodecError::InvalidUtf8)
        );
    }

    #[test]
    fn test_encode_type_mismatch_writes_nothing() {
        let mut buf = BytesMut::new();
        assert!(!FieldType::Int.encode(&Value::from("x"), &mut buf));
        assert!(!FieldType::FixedString(4).encode(&Value::Int(1), &mut buf));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_accepts() {
        assert!(FieldType::Int.accepts(&Value::Int(3)));
        assert!(!FieldType::Int.accepts(&Value::from("3")));
        assert!(FieldType::FixedString(1).accepts(&Value::from("longer than one")));
        assert!(!FieldType::FixedString(1).accepts(&Value::Int(3)));
    }

    #[test]
    fn test_coerce_matches_round_trip() {
        let ft = FieldType::FixedString(5);
        for input in ["", "abc", "abcdefg", "ab\0\0", "añññ"] {
            let coerced = ft.coerce(Value::from(input)).unwrap();
            let buf = encode(ft, &Value::from(input));
            let mut src: &[u8] = &buf;
            assert_eq!(ft.decode(&mut src).unwrap(), coerced, "input {:?}", input);
        }
        assert_eq!(FieldType::Int.coerce(Value::from("1")), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldType::Int.to_string(), "INT");
        assert_eq!(FieldType::FixedString(32).to_string(), "STRING(32)");
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::from("hi").to_string(), "hi");
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int(5).as_int(), Some(5));
        assert_eq!(Value::Int(5).as_str(), None);
        assert_eq!(Value::from("s").as_str(), Some("s"));
        assert_eq!(Value::from("s").as_int(), None);
    }
}
