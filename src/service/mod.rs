//! Service Module
//!
//! Server-side command handling.
//!
//! ## Architecture
//! - [`HandlerRegistry`]: name → factory, filled at startup
//! - [`ConnectionDispatcher`]: one per connection, owns the handler
//!   instances that connection created and routes each command to one
//! - [`CommandHandler`]: user code, answers through a [`Completion`]

mod handler;
mod registry;
mod dispatcher;

pub use handler::{CommandHandler, Completion, HandlerFactory, HandlerStatus};
pub use registry::{normalize_name, CommandMap, HandlerRegistry};
pub use dispatcher::ConnectionDispatcher;
