//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use bytes::BytesMut;

use crate::config::ParserLimits;
use crate::error::{RespError, Result};
use crate::protocol::codec::{self, FrameScanner};
use crate::protocol::ReplyValue;
use crate::service::ConnectionDispatcher;

/// Bytes requested from the socket per read
const READ_CHUNK: usize = 16 * 1024;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream, used for both directions
    stream: TcpStream,

    /// Received bytes not yet parsed into commands
    inbound: BytesMut,

    /// Progress through a request that is only partly received
    scanner: FrameScanner,

    /// Encoded replies waiting to be written
    outbound: BytesMut,

    /// Command routing for this connection only
    dispatcher: ConnectionDispatcher,

    limits: ParserLimits,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, dispatcher: ConnectionDispatcher, limits: ParserLimits) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            inbound: BytesMut::with_capacity(READ_CHUNK),
            scanner: FrameScanner::new(),
            outbound: BytesMut::new(),
            dispatcher,
            limits,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 leaves a direction unbounded)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.stream.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads whatever the client pipelined, runs those commands in
    /// order, and writes their replies back in one batch. Returns when
    /// the client disconnects or sends malformed data.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            let n = match self.stream.read(&mut chunk) {
                Ok(0) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Ok(n) => n,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(ref e) if is_disconnect(e.kind()) => {
                    tracing::debug!("Connection to {} ended: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e.into());
                }
            };
            self.inbound.extend_from_slice(&chunk[..n]);

            let parsed = self.parse_commands();
            self.dispatcher.wait();

            if let Err(e) = parsed {
                tracing::warn!("Protocol error from {}: {}", self.peer_addr, e);
                // Answer what was parsed before the bad bytes, then close
                self.queue_replies();
                ReplyValue::error(format!("ERR Protocol error: {}", e)).encode_to(&mut self.outbound);
                let _ = self.flush();
                return Err(e);
            }

            self.queue_replies();
            if let Err(e) = self.flush() {
                if let RespError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) {
                        tracing::debug!(
                            "Client {} disconnected before replies could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Move every complete command out of the inbound buffer
    fn parse_commands(&mut self) -> Result<usize> {
        let mut count = 0;
        while let Some(argv) =
            codec::decode_command_with(&mut self.inbound, &mut self.scanner, &self.limits)?
        {
            tracing::trace!("Received command from {} with {} argument(s)", self.peer_addr, argv.len());
            self.dispatcher.push(argv);
            count += 1;
        }
        Ok(count)
    }

    fn queue_replies(&mut self) {
        for reply in self.dispatcher.take_replies() {
            reply.encode_to(&mut self.outbound);
        }
    }

    fn flush(&mut self) -> Result<()> {
        if self.outbound.is_empty() {
            return Ok(());
        }
        self.stream.write_all(&self.outbound)?;
        self.stream.flush()?;
        self.outbound.clear();
        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}
