//! Handler registry
//!
//! Process-wide map from command name to handler factory.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::dispatcher::ConnectionDispatcher;
use super::handler::{CommandHandler, HandlerFactory};
use crate::error::{RespError, Result};

/// Command name to factory, shared by reference with every connection
pub type CommandMap = HashMap<String, Arc<dyn HandlerFactory>>;

/// Lowercase ASCII form used for every registry key and lookup
pub fn normalize_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_ascii_lowercase()
}

/// Registered command handlers
///
/// Filled once while the server is configured; after that it is only
/// read, and each new connection takes its own copy of the map.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    commands: CommandMap,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for the (case-insensitive) command `name`.
    ///
    /// A name can only be registered once.
    pub fn add_command_handler(&mut self, name: &str, factory: Arc<dyn HandlerFactory>) -> Result<()> {
        if name.is_empty() {
            return Err(RespError::EmptyHandlerName);
        }

        let key = normalize_name(name.as_bytes());
        if self.commands.contains_key(&key) {
            tracing::warn!("Refusing to register command '{}' twice", key);
            return Err(RespError::DuplicateHandler(key));
        }

        tracing::debug!("Registered command handler '{}'", key);
        self.commands.insert(key, factory);
        Ok(())
    }

    /// Register a factory by value
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<()>
    where
        F: HandlerFactory + 'static,
    {
        self.add_command_handler(name, Arc::new(factory))
    }

    /// Register a handler type whose instances start from `Default`
    pub fn register_default<H>(&mut self, name: &str) -> Result<()>
    where
        H: CommandHandler + Default + 'static,
    {
        self.register(name, || Box::new(H::default()) as Box<dyn CommandHandler>)
    }

    /// Copy of the map for a new connection; factories are shared, not cloned
    pub fn clone_command_map(&self) -> CommandMap {
        self.commands.clone()
    }

    /// Per-connection dispatcher over the current map
    pub fn new_dispatcher(&self) -> ConnectionDispatcher {
        ConnectionDispatcher::new(self.clone_command_map())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&normalize_name(name.as_bytes()))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("commands", &self.names())
            .finish()
    }
}
