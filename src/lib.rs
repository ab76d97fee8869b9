//! # respline
//!
//! RESP (Redis protocol) support for a request/response RPC stack:
//! - Pipelined request building with printf-style formatting
//! - Incremental reply parsing that tolerates partial reads
//! - Per-connection command dispatch with strict in-order execution
//! - Transactions where one handler captures the following commands
//!
//! ## Architecture Overview
//!
//! ```text
//!   client side                            server side
//! ┌────────────────┐                  ┌──────────────────────┐
//! │ CommandBuilder │── RESP bytes ──▶ │   codec (requests)   │
//! └────────────────┘                  └──────────┬───────────┘
//!                                                │ argv
//!                                     ┌──────────▼───────────┐
//!                                     │ ConnectionDispatcher │◀── HandlerRegistry
//!                                     │  (one per socket)    │    (cloned map)
//!                                     └──────────┬───────────┘
//!                                                │ ReplyValue
//! ┌────────────────┐                  ┌──────────▼───────────┐
//! │ ResponseParser │◀── RESP bytes ── │   codec (replies)    │
//! └────────────────┘                  └──────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod service;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{RespError, Result};
pub use config::{Config, ParserLimits};
pub use protocol::{CommandBuilder, FormatArg, ParseStatus, ReplyValue, ResponseParser};
pub use service::{
    CommandHandler, Completion, ConnectionDispatcher, HandlerFactory, HandlerRegistry,
    HandlerStatus,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of respline
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
