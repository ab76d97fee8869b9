//! TCP Server
//!
//! Accepts connections and runs each on its own thread.

use std::io::{ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::{RespError, Result};
use crate::service::HandlerRegistry;
use super::Connection;

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// TCP server speaking RESP
pub struct Server {
    config: Config,

    /// Read-only once the server is built
    registry: Arc<HandlerRegistry>,

    listener: TcpListener,
    local_addr: SocketAddr,

    /// Connections currently being served
    active: Arc<AtomicUsize>,

    shutdown: Arc<AtomicBool>,
}

/// Decrements the active connection count when a connection thread ends
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: Config, registry: HandlerRegistry) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(RespError::Config("max_connections must be at least 1".to_string()));
        }

        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            RespError::Network(format!("failed to bind {}: {}", config.listen_addr, e))
        })?;
        let local_addr = listener.local_addr()?;
        // Non-blocking accept so the loop can observe shutdown
        listener.set_nonblocking(true)?;

        tracing::info!(
            "Server bound to {} with {} command handler(s)",
            local_addr,
            registry.len()
        );

        Ok(Self {
            config,
            registry: Arc::new(registry),
            listener,
            local_addr,
            active: Arc::new(AtomicUsize::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connections currently served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Accept connections until [`shutdown`](Self::shutdown) is called
    pub fn run(&self) -> Result<()> {
        tracing::info!("Server started, listening on {}", self.local_addr);

        while !self.shutdown.load(Ordering::Acquire) {
            match self.listener.accept() {
                Ok((stream, peer_addr)) => self.accept(stream, peer_addr),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_BACKOFF),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                    thread::sleep(ACCEPT_BACKOFF);
                }
            }
        }

        tracing::info!("Server on {} stopped accepting", self.local_addr);
        Ok(())
    }

    fn accept(&self, mut stream: TcpStream, peer_addr: SocketAddr) {
        if self.active.fetch_add(1, Ordering::AcqRel) >= self.config.max_connections {
            self.active.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!("Rejecting {}: connection limit reached", peer_addr);
            let _ = stream.write_all(b"-ERR max number of clients reached\r\n");
            return;
        }
        let guard = ActiveGuard(Arc::clone(&self.active));

        // Each connection takes its own copy of the handler map
        let dispatcher = self.registry.new_dispatcher();
        let limits = self.config.parser_limits;
        let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

        let spawned = thread::Builder::new()
            .name(format!("conn-{}", peer_addr))
            .spawn(move || {
                let _guard = guard;
                let result = stream
                    .set_nonblocking(false)
                    .map_err(RespError::from)
                    .and_then(|_| Connection::new(stream, dispatcher, limits))
                    .and_then(|mut conn| {
                        conn.set_timeouts(read_ms, write_ms)?;
                        conn.handle()
                    });
                if let Err(e) = result {
                    tracing::debug!("Connection from {} closed with error: {}", peer_addr, e);
                }
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn connection thread for {}: {}", peer_addr, e);
        }
    }

    /// Signal the server to stop accepting; open connections finish on their own
    pub fn shutdown(&self) {
        tracing::info!("Shutdown requested for {}", self.local_addr);
        self.shutdown.store(true, Ordering::Release);
    }

    /// Flag that stops [`run`](Self::run) when set, for other threads
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }
}
