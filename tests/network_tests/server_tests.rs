//! Server Tests
//!
//! End-to-end tests: a real server on an ephemeral port and a blocking
//! client talking RESP to it.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use respline::network::{Client, Server};
use respline::{
    add_command, CommandBuilder, CommandHandler, Completion, Config, HandlerRegistry,
    HandlerStatus, ReplyValue, RespError,
};

// =============================================================================
// Helper Types
// =============================================================================

#[derive(Default)]
struct Echo;

impl CommandHandler for Echo {
    fn run(&mut self, args: &[Bytes], done: Completion) -> HandlerStatus {
        let reply = match args.get(1) {
            Some(arg) => ReplyValue::BulkString(arg.clone()),
            None => ReplyValue::status("PONG"),
        };
        done.complete(reply);
        HandlerStatus::Ok
    }
}

/// Answers from a background thread
#[derive(Default)]
struct Later;

impl CommandHandler for Later {
    fn run(&mut self, _args: &[Bytes], done: Completion) -> HandlerStatus {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            done.complete(ReplyValue::status("LATER"));
        });
        HandlerStatus::Ok
    }
}

/// Counts commands between MULTI and EXEC
#[derive(Default)]
struct Multi {
    queued: i64,
}

impl CommandHandler for Multi {
    fn run(&mut self, args: &[Bytes], done: Completion) -> HandlerStatus {
        if args[0].eq_ignore_ascii_case(b"multi") {
            self.queued = 0;
            done.complete(ReplyValue::ok());
            HandlerStatus::Continue
        } else if args[0].eq_ignore_ascii_case(b"exec") {
            done.complete(ReplyValue::Integer(self.queued));
            HandlerStatus::Ok
        } else {
            self.queued += 1;
            done.complete(ReplyValue::status("QUEUED"));
            HandlerStatus::Continue
        }
    }
}

struct TestServer {
    server: Arc<Server>,
    thread: Option<JoinHandle<()>>,
    addr: String,
}

impl TestServer {
    fn start(max_connections: usize) -> Self {
        let mut registry = HandlerRegistry::new();
        registry.register_default::<Echo>("echo").unwrap();
        registry.register_default::<Echo>("ping").unwrap();
        registry.register_default::<Later>("later").unwrap();
        registry.register_default::<Multi>("multi").unwrap();

        let config = Config::builder()
            .listen_addr("127.0.0.1:0")
            .max_connections(max_connections)
            .build();
        let server = Arc::new(Server::bind(config, registry).unwrap());
        let addr = server.local_addr().to_string();

        let runner = Arc::clone(&server);
        let thread = thread::spawn(move || {
            runner.run().unwrap();
        });

        Self {
            server,
            thread: Some(thread),
            addr,
        }
    }

    fn client(&self) -> Client {
        Client::connect(&self.addr, &Config::default()).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn call(client: &Client, commands: &[&[&str]]) -> Vec<ReplyValue> {
    let mut request = CommandBuilder::new();
    for command in commands {
        request.add_command_by_components(*command).unwrap();
    }
    client.call(&request).unwrap().into_replies()
}

// =============================================================================
// Request / Reply Tests
// =============================================================================

#[test]
fn test_single_command() {
    let server = TestServer::start(16);
    let client = server.client();

    assert_eq!(call(&client, &[&["PING"]]), vec![ReplyValue::status("PONG")]);
}

#[test]
fn test_pipeline_keeps_order() {
    let server = TestServer::start(16);
    let client = server.client();

    let replies = call(
        &client,
        &[&["echo", "a"], &["later"], &["echo", "b"], &["nope"], &["ECHO", "c"]],
    );

    assert_eq!(replies.len(), 5);
    assert_eq!(replies[0], ReplyValue::bulk("a"));
    assert_eq!(replies[1], ReplyValue::status("LATER"));
    assert_eq!(replies[2], ReplyValue::bulk("b"));
    assert_eq!(replies[3], ReplyValue::error("ERR unknown command 'nope'"));
    assert_eq!(replies[4], ReplyValue::bulk("c"));
}

#[test]
fn test_binary_argument_round_trip() {
    let server = TestServer::start(16);
    let client = server.client();

    let blob = [0u8, b'\r', b'\n', 255, b' '];
    let mut request = CommandBuilder::new();
    add_command!(request, "ECHO %b", &blob[..]).unwrap();

    let response = client.call(&request).unwrap();
    assert_eq!(response.reply(0).as_bytes(), Some(&blob[..]));
}

#[test]
fn test_transaction_over_the_wire() {
    let server = TestServer::start(16);
    let client = server.client();

    let replies = call(
        &client,
        &[&["MULTI"], &["ECHO", "x"], &["anything"], &["EXEC"], &["ECHO", "y"]],
    );

    assert_eq!(
        replies,
        vec![
            ReplyValue::ok(),
            ReplyValue::status("QUEUED"),
            ReplyValue::status("QUEUED"),
            ReplyValue::Integer(2),
            ReplyValue::bulk("y"),
        ]
    );
}

#[test]
fn test_connections_keep_separate_capture() {
    let server = TestServer::start(16);
    let first = server.client();
    let second = server.client();

    call(&first, &[&["MULTI"]]);

    // The other connection still dispatches by name
    assert_eq!(call(&second, &[&["ECHO", "free"]]), vec![ReplyValue::bulk("free")]);
    assert_eq!(call(&first, &[&["ECHO", "held"]]), vec![ReplyValue::status("QUEUED")]);
}

#[test]
fn test_client_shared_between_threads() {
    let server = TestServer::start(16);
    let client = Arc::new(server.client());

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                let word = format!("w{}", i);
                for _ in 0..10 {
                    let replies = call(&client, &[&["ECHO", word.as_str()], &["PING"]]);
                    assert_eq!(replies[0], ReplyValue::bulk(word.as_str()));
                    assert_eq!(replies[1], ReplyValue::status("PONG"));
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_malformed_request_closes_connection() {
    let server = TestServer::start(16);
    let mut stream = TcpStream::connect(&server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    stream.write_all(b"*1\r\n$4\r\nPING\r\n*1\r\n$x\r\n").unwrap();

    let mut received = Vec::new();
    stream.read_to_end(&mut received).unwrap();
    let text = String::from_utf8_lossy(&received);

    assert!(text.starts_with("+PONG\r\n-ERR Protocol error"), "got {:?}", text);
}

#[test]
fn test_connection_limit() {
    let server = TestServer::start(1);
    let held = server.client();
    assert_eq!(call(&held, &[&["PING"]]).len(), 1);

    let mut rejected = TcpStream::connect(&server.addr).unwrap();
    rejected.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut received = Vec::new();
    let _ = rejected.read_to_end(&mut received);

    assert_eq!(&received[..], b"-ERR max number of clients reached\r\n");
}

#[test]
fn test_empty_request_is_rejected_locally() {
    let server = TestServer::start(16);
    let client = server.client();

    let err = client.call(&CommandBuilder::new()).unwrap_err();
    assert!(matches!(err, RespError::EmptyRequest));

    // Nothing was sent, so the connection is still good
    assert!(client.is_usable());
    assert_eq!(call(&client, &[&["PING"]]), vec![ReplyValue::status("PONG")]);
}

#[test]
fn test_timed_out_call_closes_client() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    // Answers every request, but only after the client stopped waiting
    let peer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 256];
        for reply in [&b"+FIRST\r\n"[..], &b"+SECOND\r\n"[..]] {
            if stream.read(&mut buf).unwrap_or(0) == 0 {
                return;
            }
            thread::sleep(Duration::from_millis(300));
            let _ = stream.write_all(reply);
        }
    });

    let config = Config::builder().read_timeout_ms(100).build();
    let client = Client::connect(&addr, &config).unwrap();

    let mut first = CommandBuilder::new();
    first.add_command("FIRST").unwrap();
    assert!(client.call(&first).is_err());
    assert!(!client.is_usable());

    // Let the late reply arrive; it must never be read as the next answer
    thread::sleep(Duration::from_millis(400));

    let mut second = CommandBuilder::new();
    second.add_command("SECOND").unwrap();
    match client.call(&second) {
        Err(RespError::Network(_)) => {}
        Ok(response) => panic!("got a reply on a closed connection: {}", response),
        Err(other) => panic!("expected a network error, got {:?}", other),
    }

    peer.join().unwrap();
}

#[test]
fn test_bind_rejects_zero_connections() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_connections(0)
        .build();

    let result = Server::bind(config, HandlerRegistry::new());
    assert!(matches!(result, Err(RespError::Config(_))));
}
