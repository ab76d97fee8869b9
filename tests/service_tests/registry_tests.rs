//! Registry Tests
//!
//! Tests for handler registration and name lookup.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use respline::service::normalize_name;
use respline::{
    CommandHandler, Completion, HandlerFactory, HandlerRegistry, HandlerStatus, ReplyValue,
    RespError,
};

// =============================================================================
// Helper Types
// =============================================================================

#[derive(Default)]
struct Pong;

impl CommandHandler for Pong {
    fn run(&mut self, _args: &[Bytes], done: Completion) -> HandlerStatus {
        done.complete(ReplyValue::status("PONG"));
        HandlerStatus::Ok
    }
}

/// Factory that counts how many instances it has built
#[derive(Default)]
struct CountingFactory {
    built: AtomicUsize,
}

impl HandlerFactory for CountingFactory {
    fn new_handler(&self) -> Box<dyn CommandHandler> {
        self.built.fetch_add(1, Ordering::SeqCst);
        Box::new(Pong)
    }
}

// =============================================================================
// Registration Tests
// =============================================================================

#[test]
fn test_register_and_lookup() {
    let mut registry = HandlerRegistry::new();
    assert!(registry.is_empty());

    registry.register_default::<Pong>("ping").unwrap();

    assert_eq!(registry.len(), 1);
    assert!(registry.contains("ping"));
    assert!(!registry.contains("pong"));
}

#[test]
fn test_names_are_case_insensitive() {
    let mut registry = HandlerRegistry::new();
    registry.register_default::<Pong>("PiNg").unwrap();

    assert!(registry.contains("ping"));
    assert!(registry.contains("PING"));
    assert_eq!(registry.names(), vec!["ping"]);

    let err = registry.register_default::<Pong>("PING").unwrap_err();
    assert!(matches!(err, RespError::DuplicateHandler(name) if name == "ping"));
}

#[test]
fn test_duplicate_registration_keeps_first() {
    let first = Arc::new(CountingFactory::default());
    let second = Arc::new(CountingFactory::default());

    let mut registry = HandlerRegistry::new();
    registry.add_command_handler("get", first.clone()).unwrap();
    assert!(registry.add_command_handler("get", second.clone()).is_err());

    let map = registry.clone_command_map();
    map["get"].new_handler();
    assert_eq!(first.built.load(Ordering::SeqCst), 1);
    assert_eq!(second.built.load(Ordering::SeqCst), 0);
}

#[test]
fn test_empty_name_rejected() {
    let mut registry = HandlerRegistry::new();
    let err = registry.register_default::<Pong>("").unwrap_err();

    assert!(matches!(err, RespError::EmptyHandlerName));
    assert!(registry.is_empty());
}

#[test]
fn test_register_closure_factory() {
    let mut registry = HandlerRegistry::new();
    registry
        .register("echo", || Box::new(Pong) as Box<dyn CommandHandler>)
        .unwrap();
    assert!(registry.contains("ECHO"));
}

#[test]
fn test_names_sorted() {
    let mut registry = HandlerRegistry::new();
    for name in ["set", "GET", "del"] {
        registry.register_default::<Pong>(name).unwrap();
    }
    assert_eq!(registry.names(), vec!["del", "get", "set"]);
}

// =============================================================================
// Map Sharing Tests
// =============================================================================

#[test]
fn test_cloned_map_shares_factories() {
    let factory = Arc::new(CountingFactory::default());
    let mut registry = HandlerRegistry::new();
    registry.add_command_handler("ping", factory.clone()).unwrap();

    let a = registry.clone_command_map();
    let b = registry.clone_command_map();

    assert!(Arc::ptr_eq(&a["ping"], &b["ping"]));
    assert_eq!(Arc::strong_count(&factory), 4);
}

#[test]
fn test_cloned_map_unaffected_by_later_registration() {
    let mut registry = HandlerRegistry::new();
    registry.register_default::<Pong>("ping").unwrap();
    let snapshot = registry.clone_command_map();

    registry.register_default::<Pong>("echo").unwrap();

    assert_eq!(snapshot.len(), 1);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_normalize_name() {
    assert_eq!(normalize_name(b"MULTI"), "multi");
    assert_eq!(normalize_name(b"Client-List"), "client-list");
    assert_eq!(normalize_name(b"get\xff"), "get\u{fffd}");
}
