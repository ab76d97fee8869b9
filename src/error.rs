//! Error types for respline
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using RespError
pub type Result<T> = std::result::Result<T, RespError>;

/// Unified error type for respline operations
#[derive(Debug, Error)]
pub enum RespError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Request Building Errors
    // -------------------------------------------------------------------------
    #[error("Invalid command format: {0}")]
    Format(String),

    #[error("Empty command")]
    EmptyCommand,

    #[error("Request contains no command")]
    EmptyRequest,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Invalid type prefix: {0:#04x}")]
    InvalidPrefix(u8),

    #[error("Invalid length: {0}")]
    InvalidLength(i64),

    #[error("Invalid integer encoding")]
    InvalidInteger,

    #[error("Invalid UTF-8 in {0} line")]
    InvalidUtf8(&'static str),

    #[error("Missing CRLF after bulk payload")]
    MissingCrlf,

    #[error("Protocol limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Parser already failed on malformed data")]
    ParserPoisoned,

    // -------------------------------------------------------------------------
    // Registry Errors
    // -------------------------------------------------------------------------
    #[error("Command handler name is empty")]
    EmptyHandlerName,

    #[error("Command handler already registered: {0}")]
    DuplicateHandler(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RespError {
    /// True for errors raised on malformed wire data
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            RespError::InvalidPrefix(_)
                | RespError::InvalidLength(_)
                | RespError::InvalidInteger
                | RespError::InvalidUtf8(_)
                | RespError::MissingCrlf
                | RespError::LimitExceeded(_)
                | RespError::Protocol(_)
                | RespError::ParserPoisoned
        )
    }
}
