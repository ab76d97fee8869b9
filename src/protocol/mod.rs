//! Protocol Module
//!
//! RESP (REdis Serialization Protocol) support.
//!
//! ## Building requests
//! A [`CommandBuilder`] pipelines any number of commands into one
//! buffer. Commands always go out as an array of bulk strings:
//! ```text
//! *3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n
//! ```
//!
//! ### Reply Types
//! - `+` status, `-` error, `:` integer
//! - `$` bulk string (`$-1` is nil)
//! - `*` array (`*-1` is nil), arrays nest
//!
//! ## Reading responses
//! A [`ResponseParser`] is fed bytes as they arrive and collects one
//! [`ReplyValue`] per pipelined command.

mod reply;
mod format;
mod request;
mod response;
pub mod codec;

pub use reply::{ReplyValue, NIL};
pub use format::{format_command, FormatArg};
pub use request::CommandBuilder;
pub use response::{ParseStatus, ResponseParser};
