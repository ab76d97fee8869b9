//! Command handler contract
//!
//! What a server plugs in to answer commands.

use bytes::Bytes;
use crossbeam::channel::{bounded, Receiver, Sender};

use crate::protocol::ReplyValue;

/// What a handler wants to happen to the commands after this one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    /// Done; the next command is routed by its name again
    Ok,

    /// Keep routing every following command on this connection to me,
    /// whatever its name, until I return `Ok`
    Continue,
}

/// Answers one command name on one connection.
///
/// A connection creates its own instance per command name on first use
/// and keeps it until the connection closes, so a handler may carry
/// per-connection state (a queued transaction, for example).
pub trait CommandHandler: Send {
    /// Handle `args` (`args[0]` is the command name as the client sent it).
    ///
    /// The reply goes through `done`, either before returning or later
    /// from another thread. The connection does not start its next
    /// command until `done` has been completed or dropped.
    fn run(&mut self, args: &[Bytes], done: Completion) -> HandlerStatus;
}

/// Creates the per-connection instances of a handler
pub trait HandlerFactory: Send + Sync {
    fn new_handler(&self) -> Box<dyn CommandHandler>;
}

impl<F> HandlerFactory for F
where
    F: Fn() -> Box<dyn CommandHandler> + Send + Sync,
{
    fn new_handler(&self) -> Box<dyn CommandHandler> {
        self()
    }
}

/// Output slot and completion signal of one command, used exactly once.
///
/// Dropping it without calling [`complete`](Self::complete) answers the
/// client with an error instead.
#[derive(Debug)]
pub struct Completion {
    tx: Sender<ReplyValue>,
}

impl Completion {
    /// Deliver the reply and release the connection's pipeline
    pub fn complete(self, reply: ReplyValue) {
        // The connection may be gone by now; the reply is dropped with it
        let _ = self.tx.send(reply);
    }
}

/// A fresh completion token and the receiving end the dispatcher waits on
pub(crate) fn completion_pair() -> (Completion, Receiver<ReplyValue>) {
    let (tx, rx) = bounded(1);
    (Completion { tx }, rx)
}
