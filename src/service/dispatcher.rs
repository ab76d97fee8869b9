//! Connection dispatcher
//!
//! Per-connection command routing.
//!
//! ## Ordering
//!
//! Commands run strictly one at a time in arrival order. A handler may
//! finish a command later (from another thread, after I/O, ...); until
//! its [`Completion`](super::Completion) fires, queued commands wait and
//! nothing else on this connection runs. [`poll`](ConnectionDispatcher::poll)
//! never blocks, [`wait`](ConnectionDispatcher::wait) is the explicit
//! point where the connection blocks on an in-flight command.
//!
//! ## Capture
//!
//! ```text
//!            handler returns Continue
//!   Normal ───────────────────────────▶ Captured(handler)
//!     ▲                                      │   │ Continue
//!     └──────── captured handler Ok ─────────┘ ◀─┘
//! ```
//!
//! While captured, every command goes to the capturing handler
//! regardless of its name, unknown names included.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use crossbeam::channel::{Receiver, TryRecvError};

use super::handler::{completion_pair, CommandHandler, HandlerStatus};
use super::registry::{normalize_name, CommandMap};
use crate::protocol::ReplyValue;

/// Reply sent when a handler drops its completion without answering
const DROPPED_REPLY: &str = "ERR command handler dropped its reply";

/// A command whose handler has not completed yet
struct InFlight {
    /// Key of the handler instance running it
    handler: String,
    status: HandlerStatus,
    reply: Receiver<ReplyValue>,
}

/// Command routing state of one connection
pub struct ConnectionDispatcher {
    /// Factories shared with the registry
    commands: CommandMap,

    /// Instances created by this connection, one per command name
    handlers: HashMap<String, Box<dyn CommandHandler>>,

    /// Key into `handlers` of the handler holding a transaction
    captured: Option<String>,

    /// Parsed commands not yet started
    queue: VecDeque<Vec<Bytes>>,

    in_flight: Option<InFlight>,

    /// Finished replies in command order
    replies: Vec<ReplyValue>,
}

impl ConnectionDispatcher {
    /// Create the dispatcher of a new connection
    pub fn new(commands: CommandMap) -> Self {
        Self {
            commands,
            handlers: HashMap::new(),
            captured: None,
            queue: VecDeque::new(),
            in_flight: None,
            replies: Vec::new(),
        }
    }

    /// Queue a parsed command (`argv[0]` is its name)
    pub fn push(&mut self, argv: Vec<Bytes>) {
        self.queue.push_back(argv);
    }

    /// Run queued commands until one is still in flight or none are left.
    ///
    /// Returns how many replies became ready during this call.
    pub fn poll(&mut self) -> usize {
        let before = self.replies.len();
        loop {
            let outcome = match &self.in_flight {
                Some(in_flight) => in_flight.reply.try_recv(),
                None => match self.queue.pop_front() {
                    Some(argv) => {
                        self.start(argv);
                        continue;
                    }
                    None => break,
                },
            };

            match outcome {
                Ok(reply) => self.finish(reply),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.finish(ReplyValue::error(DROPPED_REPLY)),
            }
        }
        self.replies.len() - before
    }

    /// Like [`poll`](Self::poll), but blocks on in-flight commands until
    /// the queue is drained.
    pub fn wait(&mut self) -> usize {
        let before = self.replies.len();
        loop {
            self.poll();
            let outcome = match &self.in_flight {
                Some(in_flight) => in_flight.reply.recv(),
                None => break,
            };
            match outcome {
                Ok(reply) => self.finish(reply),
                Err(_) => self.finish(ReplyValue::error(DROPPED_REPLY)),
            }
        }
        self.replies.len() - before
    }

    /// Start one command, or answer it immediately if nobody handles it
    fn start(&mut self, argv: Vec<Bytes>) {
        let key = match &self.captured {
            Some(key) => key.clone(),
            None => {
                let Some(name) = argv.first() else {
                    self.replies.push(ReplyValue::error("ERR empty command"));
                    return;
                };
                let key = normalize_name(name);
                if !self.handlers.contains_key(&key) {
                    let Some(factory) = self.commands.get(&key) else {
                        tracing::debug!("Unknown command '{}'", name.escape_ascii());
                        self.replies.push(ReplyValue::error(format!(
                            "ERR unknown command '{}'",
                            name.escape_ascii()
                        )));
                        return;
                    };
                    tracing::trace!("Creating connection handler for '{}'", key);
                    self.handlers.insert(key.clone(), factory.new_handler());
                }
                key
            }
        };

        let Some(handler) = self.handlers.get_mut(&key) else {
            // Captured keys always point at an instance we created
            self.captured = None;
            self.replies.push(ReplyValue::error(format!("ERR no handler instance for '{}'", key)));
            return;
        };

        let (done, reply) = completion_pair();
        let status = handler.run(&argv, done);
        self.in_flight = Some(InFlight {
            handler: key,
            status,
            reply,
        });
    }

    /// Record the reply of the in-flight command and apply its status
    fn finish(&mut self, reply: ReplyValue) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        self.replies.push(reply);

        match in_flight.status {
            HandlerStatus::Continue => {
                if self.captured.is_none() {
                    tracing::trace!("Connection captured by '{}'", in_flight.handler);
                }
                self.captured = Some(in_flight.handler);
            }
            HandlerStatus::Ok => {
                if self.captured.take().is_some() {
                    tracing::trace!("Connection released by '{}'", in_flight.handler);
                }
            }
        }
    }

    /// Drain the replies that are ready, in command order
    pub fn take_replies(&mut self) -> Vec<ReplyValue> {
        std::mem::take(&mut self.replies)
    }

    /// True while a handler holds the connection in a transaction
    pub fn is_captured(&self) -> bool {
        self.captured.is_some()
    }

    /// Name of the capturing handler, if any
    pub fn captured_by(&self) -> Option<&str> {
        self.captured.as_deref()
    }

    /// True while a command waits for its completion
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Commands queued behind the in-flight one
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Number of handler instances this connection has created
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Drop for ConnectionDispatcher {
    fn drop(&mut self) {
        if let Some(key) = &self.captured {
            tracing::debug!("Connection closed inside a '{}' transaction, abandoning it", key);
        }
        if !self.queue.is_empty() || self.in_flight.is_some() {
            let unfinished = self.queue.len() + usize::from(self.in_flight.is_some());
            tracing::debug!("Connection closed with {} unfinished command(s)", unfinished);
        }
    }
}
