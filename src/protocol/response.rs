//! Response parser
//!
//! Collects the replies of a pipelined request from a byte stream that
//! may arrive in arbitrary pieces.

use std::fmt;

use bytes::BytesMut;

use super::codec::{self, FrameScanner};
use super::reply::{ReplyValue, NIL};
use crate::config::ParserLimits;
use crate::error::{RespError, Result};

/// Progress of [`ResponseParser::consume_partial_data`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// All expected replies are present
    Complete,

    /// The buffer ends inside a reply; call again once more bytes arrive
    NotEnoughData,
}

/// Replies of one pipelined request, in arrival order
///
/// Bulk payloads are slices of the chunks they were parsed from, so
/// dropping or clearing the parser releases each chunk as one unit
/// rather than node by node.
#[derive(Debug, Clone, Default)]
pub struct ResponseParser {
    replies: Vec<ReplyValue>,
    limits: ParserLimits,

    /// Progress through the reply that is only partly buffered
    scanner: FrameScanner,

    failed: bool,
}

impl ResponseParser {
    /// Create an empty response with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty response with custom decoder limits
    pub fn with_limits(limits: ParserLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Parse and consume complete replies from the front of `buf`
    /// until `reply_count` replies have been collected.
    ///
    /// Replies collected by earlier calls count toward `reply_count`,
    /// so a caller keeps feeding the same buffer with the same count
    /// until it sees [`ParseStatus::Complete`]. A reply that is only
    /// partly buffered is left in `buf` untouched, and the work already
    /// done on it is kept: the next call resumes after its last fully
    /// buffered element. Between calls `buf` may only grow at the back.
    ///
    /// Malformed data is fatal: the error is returned and every later
    /// call fails with [`RespError::ParserPoisoned`].
    pub fn consume_partial_data(&mut self, buf: &mut BytesMut, reply_count: usize) -> Result<ParseStatus> {
        if self.failed {
            return Err(RespError::ParserPoisoned);
        }

        while self.replies.len() < reply_count {
            match codec::decode_reply_with(buf, &mut self.scanner, &self.limits) {
                Ok(Some(reply)) => self.replies.push(reply),
                Ok(None) => {
                    tracing::trace!(
                        "Have {}/{} replies, waiting for more data ({} of {} bytes checked)",
                        self.replies.len(),
                        reply_count,
                        self.scanner.checked(),
                        buf.len()
                    );
                    return Ok(ParseStatus::NotEnoughData);
                }
                Err(e) => {
                    tracing::warn!("Malformed reply after {} good replies: {}", self.replies.len(), e);
                    self.failed = true;
                    return Err(e);
                }
            }
        }

        Ok(ParseStatus::Complete)
    }

    /// Number of complete replies
    pub fn reply_size(&self) -> usize {
        self.replies.len()
    }

    /// Reply at `index`, or the shared nil reply when out of range.
    ///
    /// A genuine nil reply looks the same; compare against
    /// [`reply_size`](Self::reply_size) to tell them apart.
    pub fn reply(&self, index: usize) -> &ReplyValue {
        self.replies.get(index).unwrap_or(&NIL)
    }

    /// Iterate over the complete replies
    pub fn replies(&self) -> impl Iterator<Item = &ReplyValue> {
        self.replies.iter()
    }

    /// Take ownership of the complete replies
    pub fn into_replies(self) -> Vec<ReplyValue> {
        self.replies
    }

    /// True once malformed data has been seen
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Forget every reply and any earlier failure
    pub fn clear(&mut self) {
        self.replies.clear();
        self.scanner.reset();
        self.failed = false;
    }
}

impl fmt::Display for ResponseParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, reply) in self.replies.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", reply)?;
        }
        Ok(())
    }
}
