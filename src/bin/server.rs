//! respline Server Binary
//!
//! Starts a demo RESP server with a handful of command handlers.

use std::thread;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use respline::network::Server;
use respline::{CommandHandler, Completion, Config, HandlerRegistry, HandlerStatus, ReplyValue};
use tracing_subscriber::{fmt, EnvFilter};

/// respline Server
#[derive(Parser, Debug)]
#[command(name = "respline-server")]
#[command(about = "Demo RESP server: PING, ECHO, SLEEP and MULTI/EXEC")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Idle read timeout in milliseconds (0 = never)
    #[arg(short, long, default_value = "0")]
    read_timeout_ms: u64,

    /// Largest accepted bulk string in MB
    #[arg(long, default_value = "512")]
    max_bulk_mb: usize,
}

// =============================================================================
// Demo Handlers
// =============================================================================

/// `PING [message]`
#[derive(Default)]
struct Ping;

impl CommandHandler for Ping {
    fn run(&mut self, args: &[Bytes], done: Completion) -> HandlerStatus {
        let reply = match args.get(1) {
            Some(message) => ReplyValue::BulkString(message.clone()),
            None => ReplyValue::status("PONG"),
        };
        done.complete(reply);
        HandlerStatus::Ok
    }
}

/// `ECHO message`
#[derive(Default)]
struct Echo;

impl CommandHandler for Echo {
    fn run(&mut self, args: &[Bytes], done: Completion) -> HandlerStatus {
        let reply = match args {
            [_, message] => ReplyValue::BulkString(message.clone()),
            _ => ReplyValue::error("ERR wrong number of arguments for 'echo' command"),
        };
        done.complete(reply);
        HandlerStatus::Ok
    }
}

/// `SLEEP ms`: answers from a background thread after `ms` milliseconds
#[derive(Default)]
struct Sleep;

impl CommandHandler for Sleep {
    fn run(&mut self, args: &[Bytes], done: Completion) -> HandlerStatus {
        let millis = args
            .get(1)
            .and_then(|a| std::str::from_utf8(a).ok())
            .and_then(|s| s.parse::<u64>().ok());
        match millis {
            Some(ms) => {
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(ms));
                    done.complete(ReplyValue::ok());
                });
            }
            None => done.complete(ReplyValue::error("ERR value is not an integer or out of range")),
        }
        HandlerStatus::Ok
    }
}

/// `MULTI` ... `EXEC` | `DISCARD`
///
/// Queues every command after MULTI and hands them back, one array per
/// command, on EXEC.
#[derive(Default)]
struct Multi {
    in_transaction: bool,
    queued: Vec<Vec<Bytes>>,
}

impl CommandHandler for Multi {
    fn run(&mut self, args: &[Bytes], done: Completion) -> HandlerStatus {
        let name = args.first().map(|n| n.to_ascii_lowercase()).unwrap_or_default();

        if !self.in_transaction {
            self.in_transaction = true;
            self.queued.clear();
            done.complete(ReplyValue::ok());
            return HandlerStatus::Continue;
        }

        match name.as_slice() {
            b"exec" => {
                self.in_transaction = false;
                let results = self
                    .queued
                    .drain(..)
                    .map(|argv| ReplyValue::Array(argv.into_iter().map(ReplyValue::BulkString).collect()))
                    .collect();
                done.complete(ReplyValue::Array(results));
                HandlerStatus::Ok
            }
            b"discard" => {
                self.in_transaction = false;
                self.queued.clear();
                done.complete(ReplyValue::ok());
                HandlerStatus::Ok
            }
            b"multi" => {
                done.complete(ReplyValue::error("ERR MULTI calls can not be nested"));
                HandlerStatus::Continue
            }
            _ => {
                self.queued.push(args.to_vec());
                done.complete(ReplyValue::status("QUEUED"));
                HandlerStatus::Continue
            }
        }
    }
}

fn build_registry() -> respline::Result<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    registry.register_default::<Ping>("ping")?;
    registry.register_default::<Echo>("echo")?;
    registry.register_default::<Sleep>("sleep")?;
    registry.register_default::<Multi>("multi")?;
    Ok(registry)
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,respline=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("respline Server v{}", respline::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let config = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.read_timeout_ms)
        .max_bulk_len(args.max_bulk_mb * 1024 * 1024)
        .build();

    let registry = match build_registry() {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to register command handlers: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, registry) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
