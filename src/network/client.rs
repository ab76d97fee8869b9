//! Blocking client
//!
//! Sends a pipelined request and reads back all of its replies.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::config::{Config, ParserLimits};
use crate::error::{RespError, Result};
use crate::protocol::{CommandBuilder, ParseStatus, ResponseParser};

const READ_CHUNK: usize = 16 * 1024;

/// Stream plus bytes received but not yet claimed by a response
struct Wire {
    stream: TcpStream,
    inbound: BytesMut,

    /// Set once an exchange failed; replies can no longer be paired
    /// with requests, so the connection is never used again
    broken: bool,
}

/// Client for one server connection
///
/// Safe to share between threads; each [`call`](Self::call) holds the
/// connection for its whole request/response exchange so pipelines
/// never interleave.
///
/// A failed call (timeout, I/O error, malformed reply) closes the
/// connection: every later call fails with [`RespError::Network`]
/// instead of reading the stale replies of the failed one.
pub struct Client {
    wire: Mutex<Wire>,
    limits: ParserLimits,
    peer_addr: String,
}

impl Client {
    /// Connect to `addr` with timeouts and limits from `config`
    pub fn connect(addr: &str, config: &Config) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| RespError::Network(format!("failed to connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        if config.read_timeout_ms > 0 {
            stream.set_read_timeout(Some(Duration::from_millis(config.read_timeout_ms)))?;
        }
        if config.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(config.write_timeout_ms)))?;
        }
        tracing::debug!("Connected to {}", addr);

        Ok(Self {
            wire: Mutex::new(Wire {
                stream,
                inbound: BytesMut::with_capacity(READ_CHUNK),
                broken: false,
            }),
            limits: config.parser_limits,
            peer_addr: addr.to_string(),
        })
    }

    /// Send every command in `request` and wait for one reply each
    pub fn call(&self, request: &CommandBuilder) -> Result<ResponseParser> {
        let mut outbound = BytesMut::with_capacity(request.byte_size());
        request.serialize_to(&mut outbound)?;
        if request.has_error() {
            tracing::debug!(
                "Sending {} command(s) from a request with rejected commands",
                request.command_size()
            );
        }

        let mut wire = self.wire.lock();
        if wire.broken {
            return Err(RespError::Network(format!(
                "connection to {} was closed after an earlier failure",
                self.peer_addr
            )));
        }

        let result = self.exchange(&mut wire, &outbound, request.command_size());
        if let Err(ref e) = result {
            tracing::debug!("Closing connection to {} after failed call: {}", self.peer_addr, e);
            wire.broken = true;
            wire.inbound.clear();
            let _ = wire.stream.shutdown(Shutdown::Both);
        }
        result
    }

    /// Write one encoded pipeline and read `expected` replies
    fn exchange(&self, wire: &mut Wire, outbound: &[u8], expected: usize) -> Result<ResponseParser> {
        wire.stream.write_all(outbound)?;
        wire.stream.flush()?;

        let mut response = ResponseParser::with_limits(self.limits);
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if response.consume_partial_data(&mut wire.inbound, expected)? == ParseStatus::Complete {
                return Ok(response);
            }

            let n = match wire.stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(RespError::Network(format!(
                        "{} closed the connection after {} of {} replies",
                        self.peer_addr,
                        response.reply_size(),
                        expected
                    )))
                }
                Ok(n) => n,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            wire.inbound.extend_from_slice(&chunk[..n]);
        }
    }

    /// False once a failed call has closed the connection
    pub fn is_usable(&self) -> bool {
        !self.wire.lock().broken
    }

    /// Server address this client talks to
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
