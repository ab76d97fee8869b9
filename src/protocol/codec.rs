//! Protocol codec
//!
//! RESP encoding and incremental decoding.
//!
//! ## Wire Format
//!
//! ```text
//! +OK\r\n                      status
//! -ERR message\r\n             error
//! :1000\r\n                    integer
//! $5\r\nhello\r\n              bulk string ($-1 = nil)
//! *2\r\n$3\r\nGET\r\n$1\r\nk\r\n   array (*-1 = nil)
//! ```
//!
//! Requests are always an array of bulk strings.
//!
//! ## Decoding
//!
//! Decoding a frame happens in two passes. A [`FrameScanner`] walks the
//! buffer without allocating and reports how many bytes the first
//! complete frame spans (or that more data is needed), resuming where
//! it stopped when the frame arrives in pieces. The caller then
//! splits exactly those bytes off its `BytesMut`, freezes them, and
//! [`decode_frame`] builds the reply tree with every bulk payload sliced
//! out of that one frozen chunk. The whole tree therefore releases its
//! payload memory as a single reference-counted unit.

use bytes::{BufMut, Bytes, BytesMut};

use super::ReplyValue;
use crate::config::ParserLimits;
use crate::error::{RespError, Result};

/// Length/count/integer lines never legitimately exceed this
const MAX_NUMBER_LINE: usize = 32;

// =============================================================================
// Encoding
// =============================================================================

/// Append one command as an array of bulk strings
pub fn encode_command<A: AsRef<[u8]>>(buf: &mut BytesMut, args: &[A]) {
    let payload: usize = args.iter().map(|a| a.as_ref().len() + 16).sum();
    buf.reserve(payload + 16);

    put_header(buf, b'*', args.len());
    for arg in args {
        let arg = arg.as_ref();
        put_header(buf, b'$', arg.len());
        buf.put_slice(arg);
        buf.put_slice(b"\r\n");
    }
}

fn put_header(buf: &mut BytesMut, prefix: u8, len: usize) {
    buf.put_u8(prefix);
    buf.put_slice(len.to_string().as_bytes());
    buf.put_slice(b"\r\n");
}

// =============================================================================
// Decoding
// =============================================================================

/// Outcome of a failed walk: either a short buffer or a real violation
#[derive(Debug)]
enum Walk {
    Incomplete,
    Invalid(RespError),
}

impl From<RespError> for Walk {
    fn from(err: RespError) -> Self {
        Walk::Invalid(err)
    }
}

/// Read position over a borrowed buffer
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_byte(&mut self) -> std::result::Result<u8, Walk> {
        let byte = *self.buf.get(self.pos).ok_or(Walk::Incomplete)?;
        self.pos += 1;
        Ok(byte)
    }

    /// Line up to (not including) the next CRLF, cursor moves past it
    fn read_line(&mut self, max: Option<usize>) -> std::result::Result<&'a [u8], Walk> {
        let buf = self.buf;
        let rest = &buf[self.pos..];
        match rest.windows(2).position(|w| w == b"\r\n") {
            Some(end) => {
                if matches!(max, Some(max) if end > max) {
                    return Err(RespError::InvalidInteger.into());
                }
                self.pos += end + 2;
                Ok(&rest[..end])
            }
            None => match max {
                Some(max) if rest.len() > max + 1 => Err(RespError::InvalidInteger.into()),
                _ => Err(Walk::Incomplete),
            },
        }
    }

    fn read_number(&mut self) -> std::result::Result<i64, Walk> {
        let line = self.read_line(Some(MAX_NUMBER_LINE))?;
        Ok(parse_i64(line)?)
    }

    /// Skip a bulk payload of `len` bytes plus its CRLF
    fn skip_payload(&mut self, len: usize) -> std::result::Result<(usize, usize), Walk> {
        let start = self.pos;
        let end = start.checked_add(len).ok_or(Walk::Incomplete)?;
        if self.buf.len() < end + 2 {
            return Err(Walk::Incomplete);
        }
        if &self.buf[end..end + 2] != b"\r\n" {
            return Err(RespError::MissingCrlf.into());
        }
        self.pos = end + 2;
        Ok((start, end))
    }
}

fn parse_i64(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(RespError::InvalidInteger)
}

/// Declared length of a bulk string or array; `None` for the `-1` nil form
fn declared_len(n: i64, max: usize, what: &str) -> Result<Option<usize>> {
    match n {
        -1 => Ok(None),
        n if n < 0 => Err(RespError::InvalidLength(n)),
        n if n as u64 > max as u64 => Err(RespError::LimitExceeded(format!(
            "{} length {} exceeds {}",
            what, n, max
        ))),
        n => Ok(Some(n as usize)),
    }
}

/// Resumable measurement of the first frame in a growing buffer.
///
/// Each call to [`advance`](Self::advance) continues from the last
/// element it fully checked, so a large array arriving in many reads
/// is walked once in total rather than once per read. Elements are
/// committed whole: a partly buffered element is re-read next time,
/// nothing before it is.
///
/// The scanner assumes the caller only appends to the buffer between
/// calls; call [`reset`](Self::reset) after splitting a frame off.
#[derive(Debug, Clone)]
pub struct FrameScanner {
    /// Bytes of the frame already checked
    checked: usize,

    /// Elements still expected at each open nesting level, outermost first
    remaining: Vec<usize>,
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self {
            checked: 0,
            remaining: vec![1],
        }
    }
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all progress, ready for the next frame
    pub fn reset(&mut self) {
        self.checked = 0;
        self.remaining.clear();
        self.remaining.push(1);
    }

    /// Bytes checked so far without finding the end of the frame
    pub fn checked(&self) -> usize {
        self.checked
    }

    /// Continue measuring the frame at the front of `buf`.
    ///
    /// Returns the frame size once it is complete, `Ok(None)` while
    /// more bytes are needed.
    pub fn advance(&mut self, buf: &[u8], limits: &ParserLimits) -> Result<Option<usize>> {
        while !self.remaining.is_empty() {
            let mut cursor = Cursor::new(buf);
            cursor.pos = self.checked;
            let opened = match self.element(&mut cursor, limits) {
                Ok(opened) => opened,
                Err(Walk::Incomplete) => return Ok(None),
                Err(Walk::Invalid(err)) => return Err(err),
            };
            self.checked = cursor.pos;

            if let Some(top) = self.remaining.last_mut() {
                *top -= 1;
            }
            match opened {
                Some(count) => self.remaining.push(count),
                None => {
                    while self.remaining.last() == Some(&0) {
                        self.remaining.pop();
                    }
                }
            }
        }
        Ok(Some(self.checked))
    }

    /// Check one element header (and payload for bulk strings).
    ///
    /// Returns the element count of a non-empty array, which the caller
    /// must then walk, `None` for anything already complete.
    fn element(
        &self,
        cursor: &mut Cursor<'_>,
        limits: &ParserLimits,
    ) -> std::result::Result<Option<usize>, Walk> {
        match cursor.read_byte()? {
            b'+' => {
                let line = cursor.read_line(None)?;
                std::str::from_utf8(line).map_err(|_| RespError::InvalidUtf8("status"))?;
            }
            b'-' => {
                let line = cursor.read_line(None)?;
                std::str::from_utf8(line).map_err(|_| RespError::InvalidUtf8("error"))?;
            }
            b':' => {
                cursor.read_number()?;
            }
            b'$' => {
                let n = cursor.read_number()?;
                if let Some(len) = declared_len(n, limits.max_bulk_len, "bulk string")? {
                    cursor.skip_payload(len)?;
                }
            }
            b'*' => {
                let n = cursor.read_number()?;
                if let Some(count) = declared_len(n, limits.max_array_len, "array")? {
                    // Open arrays enclosing this one
                    let depth = self.remaining.len() - 1;
                    if depth >= limits.max_depth {
                        return Err(RespError::LimitExceeded(format!(
                            "array nesting deeper than {}",
                            limits.max_depth
                        ))
                        .into());
                    }
                    if count > 0 {
                        return Ok(Some(count));
                    }
                }
            }
            other => return Err(RespError::InvalidPrefix(other).into()),
        }
        Ok(None)
    }
}

/// Size in bytes of the first complete frame in `buf`.
///
/// Returns `Ok(None)` when `buf` ends before the frame does.
pub fn frame_len(buf: &[u8], limits: &ParserLimits) -> Result<Option<usize>> {
    FrameScanner::new().advance(buf, limits)
}

/// Build the reply tree of one complete frame.
///
/// `frame` must hold exactly the bytes measured by [`frame_len`]; bulk
/// payloads are zero-copy slices of it.
pub fn decode_frame(frame: &Bytes) -> Result<ReplyValue> {
    let mut cursor = Cursor::new(frame.as_ref());
    match build(&mut cursor, frame) {
        Ok(value) if cursor.pos == frame.len() => Ok(value),
        Ok(_) => Err(RespError::Protocol("trailing bytes after frame".to_string())),
        Err(Walk::Incomplete) => Err(RespError::Protocol("truncated frame".to_string())),
        Err(Walk::Invalid(err)) => Err(err),
    }
}

fn build(cursor: &mut Cursor<'_>, src: &Bytes) -> std::result::Result<ReplyValue, Walk> {
    let value = match cursor.read_byte()? {
        b'+' => ReplyValue::Status(utf8_line(cursor, "status")?),
        b'-' => ReplyValue::Error(utf8_line(cursor, "error")?),
        b':' => ReplyValue::Integer(cursor.read_number()?),
        b'$' => match declared_len(cursor.read_number()?, usize::MAX, "bulk string")? {
            None => ReplyValue::Nil,
            Some(len) => {
                let (start, end) = cursor.skip_payload(len)?;
                ReplyValue::BulkString(src.slice(start..end))
            }
        },
        b'*' => match declared_len(cursor.read_number()?, usize::MAX, "array")? {
            None => ReplyValue::Nil,
            Some(count) => {
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(build(cursor, src)?);
                }
                ReplyValue::Array(items)
            }
        },
        other => return Err(RespError::InvalidPrefix(other).into()),
    };
    Ok(value)
}

fn utf8_line(cursor: &mut Cursor<'_>, what: &'static str) -> std::result::Result<String, Walk> {
    let line = cursor.read_line(None)?;
    let text = std::str::from_utf8(line).map_err(|_| RespError::InvalidUtf8(what))?;
    Ok(text.to_owned())
}

/// Split one complete frame off the front of `buf` and decode it.
///
/// Leaves `buf` untouched and returns `Ok(None)` on a short buffer.
pub fn decode_reply(buf: &mut BytesMut, limits: &ParserLimits) -> Result<Option<ReplyValue>> {
    decode_reply_with(buf, &mut FrameScanner::new(), limits)
}

/// [`decode_reply`] that keeps its progress in `scanner` across calls
pub fn decode_reply_with(
    buf: &mut BytesMut,
    scanner: &mut FrameScanner,
    limits: &ParserLimits,
) -> Result<Option<ReplyValue>> {
    match scanner.advance(buf, limits)? {
        Some(len) => {
            scanner.reset();
            let frame = buf.split_to(len).freeze();
            decode_frame(&frame).map(Some)
        }
        None => Ok(None),
    }
}

/// Split one request off the front of `buf`, as its argument vector.
///
/// Requests must be a non-nil array of bulk strings.
pub fn decode_command(buf: &mut BytesMut, limits: &ParserLimits) -> Result<Option<Vec<Bytes>>> {
    decode_command_with(buf, &mut FrameScanner::new(), limits)
}

/// [`decode_command`] that keeps its progress in `scanner` across calls
pub fn decode_command_with(
    buf: &mut BytesMut,
    scanner: &mut FrameScanner,
    limits: &ParserLimits,
) -> Result<Option<Vec<Bytes>>> {
    if let Some(&first) = buf.first() {
        if first != b'*' {
            return Err(RespError::Protocol(format!(
                "expected request array, got prefix {:#04x}",
                first
            )));
        }
    }

    let items = match decode_reply_with(buf, scanner, limits)? {
        None => return Ok(None),
        Some(ReplyValue::Array(items)) => items,
        Some(other) => {
            return Err(RespError::Protocol(format!(
                "expected request array, got {}",
                other.reply_type()
            )))
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            ReplyValue::BulkString(arg) => Ok(arg),
            other => Err(RespError::Protocol(format!(
                "request arguments must be bulk strings, got {}",
                other.reply_type()
            ))),
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}
