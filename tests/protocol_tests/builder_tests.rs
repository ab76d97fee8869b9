//! Tests for CommandBuilder
//!
//! These tests verify:
//! - Wire encoding of added commands
//! - Sticky error flag behavior
//! - Serialization of partial pipelines
//! - Copy, merge and clear semantics

use bytes::BytesMut;
use respline::{add_command, CommandBuilder, FormatArg, RespError};

// =============================================================================
// Helper Functions
// =============================================================================

fn serialized(request: &CommandBuilder) -> Vec<u8> {
    let mut out = BytesMut::new();
    request.serialize_to(&mut out).unwrap();
    out.to_vec()
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_add_command_without_arguments() {
    let mut request = CommandBuilder::new();
    request.add_command("PING").unwrap();

    assert_eq!(request.command_size(), 1);
    assert!(!request.has_error());
    assert_eq!(serialized(&request), b"*1\r\n$4\r\nPING\r\n");
}

#[test]
fn test_add_command_with_format() {
    let mut request = CommandBuilder::new();
    add_command!(request, "SET %s %s", "key", "value").unwrap();

    assert_eq!(
        serialized(&request),
        b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n"
    );
}

#[test]
fn test_binary_argument_keeps_embedded_nul() {
    let data = [b'a', 0, b'b', b'c'];
    let mut request = CommandBuilder::new();
    add_command!(request, "SET %s %b", "key", &data[..]).unwrap();

    let commands = request.commands().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0][2].len(), 4);
    assert_eq!(&commands[0][2][..], &data[..]);
    assert_eq!(
        serialized(&request),
        b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$4\r\na\0bc\r\n"
    );
}

#[test]
fn test_add_command_by_components() {
    let mut request = CommandBuilder::new();
    request
        .add_command_by_components(&["set", "key with space", ""])
        .unwrap();

    assert_eq!(
        serialized(&request),
        b"*3\r\n$3\r\nset\r\n$14\r\nkey with space\r\n$0\r\n\r\n"
    );
}

#[test]
fn test_pipeline_concatenates_commands() {
    let mut request = CommandBuilder::new();
    request.add_command("PING").unwrap();
    add_command!(request, "GET %s", "k").unwrap();
    request.add_command_by_components(&[&b"DEL"[..], &b"k"[..]]).unwrap();

    assert_eq!(request.command_size(), 3);
    assert_eq!(
        serialized(&request),
        b"*1\r\n$4\r\nPING\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n*2\r\n$3\r\nDEL\r\n$1\r\nk\r\n"
    );
    assert_eq!(request.byte_size(), request.as_bytes().len());
}

#[test]
fn test_add_command_v_with_explicit_args() {
    let mut request = CommandBuilder::new();
    request
        .add_command_v("INCRBY %s %d", &[FormatArg::Str("counter"), FormatArg::Int(-5)])
        .unwrap();

    let commands = request.commands().unwrap();
    assert_eq!(commands[0][2].as_ref(), b"-5");
}

// =============================================================================
// Error Flag Tests
// =============================================================================

#[test]
fn test_empty_name_fails_without_touching_buffer() {
    let mut request = CommandBuilder::new();
    request.add_command("PING").unwrap();
    let before = request.as_bytes().to_vec();

    let err = request.add_command("").unwrap_err();

    assert!(matches!(err, RespError::EmptyCommand));
    assert!(request.has_error());
    assert_eq!(request.command_size(), 1);
    assert_eq!(request.as_bytes(), &before[..]);
}

#[test]
fn test_empty_components_fail() {
    let mut request = CommandBuilder::new();
    let none: [&str; 0] = [];

    assert!(request.add_command_by_components(&none).is_err());
    assert!(request.has_error());
    assert_eq!(request.command_size(), 0);
}

#[test]
fn test_malformed_format_sets_sticky_error() {
    let mut request = CommandBuilder::new();

    assert!(add_command!(request, "SET %s %s", "only-one").is_err());
    assert!(request.has_error());

    // Later successes never clear the flag
    request.add_command("PING").unwrap();
    add_command!(request, "GET %s", "k").unwrap();
    assert!(request.has_error());
    assert_eq!(request.command_size(), 2);
}

#[test]
fn test_oversized_width_is_rejected() {
    let mut request = CommandBuilder::new();

    let err = add_command!(request, "SET %99999999999999999999s", "x").unwrap_err();
    assert!(matches!(err, RespError::Format(_)));
    assert!(request.has_error());
    assert!(request.is_empty());
}

#[test]
fn test_partial_pipeline_still_serializes() {
    let mut request = CommandBuilder::new();
    request.add_command("PING").unwrap();
    assert!(add_command!(request, "GET %q", "k").is_err());
    request.add_command("ECHO").unwrap();

    assert!(request.has_error());
    assert_eq!(
        serialized(&request),
        b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nECHO\r\n"
    );
}

#[test]
fn test_serialize_empty_request_fails() {
    let request = CommandBuilder::new();
    let mut out = BytesMut::new();

    let err = request.serialize_to(&mut out).unwrap_err();

    assert!(matches!(err, RespError::EmptyRequest));
    assert!(out.is_empty());
}

// =============================================================================
// Copy / Merge / Clear Tests
// =============================================================================

#[test]
fn test_clone_is_deep() {
    let mut original = CommandBuilder::new();
    original.add_command("PING").unwrap();
    let _ = original.add_command("");

    let mut copy = original.clone();
    copy.add_command("ECHO").unwrap();

    assert_eq!(original.command_size(), 1);
    assert_eq!(copy.command_size(), 2);
    assert!(copy.has_error());
    assert_eq!(serialized(&original), b"*1\r\n$4\r\nPING\r\n");
}

#[test]
fn test_merge_from_appends_commands_and_error() {
    let mut first = CommandBuilder::new();
    first.add_command("PING").unwrap();

    let mut second = CommandBuilder::new();
    add_command!(second, "GET %s", "k").unwrap();
    let _ = second.add_command("");

    first.merge_from(&second);

    assert_eq!(first.command_size(), 2);
    assert!(first.has_error());
    assert_eq!(
        serialized(&first),
        b"*1\r\n$4\r\nPING\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n"
    );
}

#[test]
fn test_clear_resets_everything() {
    let mut request = CommandBuilder::new();
    request.add_command("PING").unwrap();
    let _ = request.add_command("");

    request.clear();

    assert!(request.is_empty());
    assert!(!request.has_error());
    assert_eq!(request.byte_size(), 0);
}

#[test]
fn test_display_lists_commands() {
    let mut request = CommandBuilder::new();
    add_command!(request, "SET %s %s", "k", "v").unwrap();
    request.add_command("PING").unwrap();

    assert_eq!(request.to_string(), "[SET k v] [PING]");
}
