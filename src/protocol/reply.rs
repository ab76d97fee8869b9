//! Reply definitions
//!
//! One decoded RESP reply. Arrays nest arbitrarily.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

/// Shared nil reply handed out for out-of-range lookups
pub static NIL: ReplyValue = ReplyValue::Nil;

/// A single RESP reply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReplyValue {
    /// Null bulk string or null array
    #[default]
    Nil,

    /// `-ERR ...`
    Error(String),

    /// `+OK`
    Status(String),

    /// `:42`
    Integer(i64),

    /// Binary-safe string, payload shares the buffer it was parsed from
    BulkString(Bytes),

    /// Ordered replies, possibly nested
    Array(Vec<ReplyValue>),
}

impl ReplyValue {
    /// `+OK`
    pub fn ok() -> Self {
        ReplyValue::Status("OK".to_string())
    }

    /// Status reply from any text
    pub fn status(text: impl Into<String>) -> Self {
        ReplyValue::Status(text.into())
    }

    /// Error reply from any text
    pub fn error(text: impl Into<String>) -> Self {
        ReplyValue::Error(text.into())
    }

    /// Bulk string reply, copying the payload
    pub fn bulk(data: impl AsRef<[u8]>) -> Self {
        ReplyValue::BulkString(Bytes::copy_from_slice(data.as_ref()))
    }

    /// Wire type name, as used by `TYPE`-style introspection
    pub fn reply_type(&self) -> &'static str {
        match self {
            ReplyValue::Nil => "nil",
            ReplyValue::Error(_) => "error",
            ReplyValue::Status(_) => "status",
            ReplyValue::Integer(_) => "integer",
            ReplyValue::BulkString(_) => "string",
            ReplyValue::Array(_) => "array",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, ReplyValue::Nil)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ReplyValue::Error(_))
    }

    /// True for status and bulk string replies
    pub fn is_string(&self) -> bool {
        matches!(self, ReplyValue::Status(_) | ReplyValue::BulkString(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ReplyValue::Integer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ReplyValue::Array(_))
    }

    /// Text of a status/error reply, or a bulk string holding valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ReplyValue::Status(s) | ReplyValue::Error(s) => Some(s),
            ReplyValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Raw payload of any string-like reply
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ReplyValue::Status(s) | ReplyValue::Error(s) => Some(s.as_bytes()),
            ReplyValue::BulkString(b) => Some(b),
            _ => None,
        }
    }

    pub fn integer(&self) -> Option<i64> {
        match self {
            ReplyValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Element count of an array, payload length of a string, 0 otherwise
    pub fn len(&self) -> usize {
        match self {
            ReplyValue::Array(items) => items.len(),
            ReplyValue::BulkString(b) => b.len(),
            ReplyValue::Status(s) | ReplyValue::Error(s) => s.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Array element at `index`; anything out of range is nil
    pub fn get(&self, index: usize) -> &ReplyValue {
        match self {
            ReplyValue::Array(items) => items.get(index).unwrap_or(&NIL),
            _ => &NIL,
        }
    }

    /// Encode to RESP bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode_to(&mut buf);
        buf
    }

    /// Append the RESP encoding to `buf`
    pub fn encode_to(&self, buf: &mut BytesMut) {
        match self {
            ReplyValue::Nil => buf.put_slice(b"$-1\r\n"),
            ReplyValue::Error(text) => put_text_line(buf, b'-', text),
            ReplyValue::Status(text) => put_text_line(buf, b'+', text),
            ReplyValue::Integer(n) => put_line(buf, b':', n.to_string().as_bytes()),
            ReplyValue::BulkString(data) => {
                put_line(buf, b'$', data.len().to_string().as_bytes());
                buf.put_slice(data);
                buf.put_slice(b"\r\n");
            }
            ReplyValue::Array(items) => {
                put_line(buf, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.encode_to(buf);
                }
            }
        }
    }
}

/// Status and error lines end at the first CRLF on the wire, so line
/// breaks inside the text are sent as spaces
fn put_text_line(buf: &mut BytesMut, prefix: u8, text: &str) {
    buf.reserve(text.len() + 3);
    buf.put_u8(prefix);
    buf.extend(text.bytes().map(|b| if b == b'\r' || b == b'\n' { b' ' } else { b }));
    buf.put_slice(b"\r\n");
}

fn put_line(buf: &mut BytesMut, prefix: u8, line: &[u8]) {
    buf.reserve(line.len() + 3);
    buf.put_u8(prefix);
    buf.put_slice(line);
    buf.put_slice(b"\r\n");
}

impl From<&str> for ReplyValue {
    fn from(text: &str) -> Self {
        ReplyValue::bulk(text)
    }
}

impl From<i64> for ReplyValue {
    fn from(n: i64) -> Self {
        ReplyValue::Integer(n)
    }
}

impl From<Bytes> for ReplyValue {
    fn from(data: Bytes) -> Self {
        ReplyValue::BulkString(data)
    }
}

impl From<Vec<ReplyValue>> for ReplyValue {
    fn from(items: Vec<ReplyValue>) -> Self {
        ReplyValue::Array(items)
    }
}

impl fmt::Display for ReplyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyValue::Nil => f.write_str("(nil)"),
            ReplyValue::Error(text) => write!(f, "(error) {}", text),
            ReplyValue::Status(text) => f.write_str(text),
            ReplyValue::Integer(n) => write!(f, "(integer) {}", n),
            ReplyValue::BulkString(data) => write!(f, "\"{}\"", data.escape_ascii()),
            ReplyValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}
