//! Server Tests
//!
//! The event loop is driven one iteration at a time from the test thread,
//! so connection bookkeeping can be inspected between steps.

use std::thread;
use std::time::Duration;

use tidekv::protocol::{ErrorCode, Response};
use tidekv::{Client, Config, Server};

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config() -> Config {
    Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_poll_wait_ms(10)
        .worker_threads(1)
        .build()
}

fn bind(config: Config) -> Server {
    Server::bind(config).unwrap()
}

fn pump(server: &mut Server, iterations: usize) {
    for _ in 0..iterations {
        server.poll_once().unwrap();
    }
}

fn connect(server: &Server) -> Client {
    let client = Client::connect(server.local_addr()).unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    client
}

/// Send one request, let the server handle it, then read the reply
fn round_trip(server: &mut Server, client: &mut Client, args: &[&str]) -> Response {
    client.send(args).unwrap();
    client.flush().unwrap();
    pump(server, 5);
    client.recv().unwrap()
}

// =============================================================================
// Connection Lifecycle Tests
// =============================================================================

#[test]
fn test_bind_rejects_invalid_config() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_connections(0)
        .build();
    assert!(Server::bind(config).is_err());
}

#[test]
fn test_accept_and_disconnect() {
    let mut server = bind(test_config());
    assert_eq!(server.connection_count(), 0);

    let first = connect(&server);
    let second = connect(&server);
    pump(&mut server, 3);
    assert_eq!(server.connection_count(), 2);

    drop(first);
    pump(&mut server, 3);
    assert_eq!(server.connection_count(), 1);

    drop(second);
    pump(&mut server, 3);
    assert_eq!(server.connection_count(), 0);
}

#[test]
fn test_request_reply() {
    let mut server = bind(test_config());
    let mut client = connect(&server);

    assert_eq!(round_trip(&mut server, &mut client, &["set", "k", "v"]), Response::Nil);
    assert_eq!(round_trip(&mut server, &mut client, &["get", "k"]), Response::str("v"));
    assert_eq!(server.engine().len(), 1);
}

#[test]
fn test_error_reply_keeps_connection_open() {
    let mut server = bind(test_config());
    let mut client = connect(&server);

    assert_eq!(
        round_trip(&mut server, &mut client, &["bogus"]),
        Response::error(ErrorCode::Unknown, "unknown command")
    );
    assert_eq!(server.connection_count(), 1);
    assert_eq!(round_trip(&mut server, &mut client, &["keys"]), Response::Arr(Vec::new()));
}

#[test]
fn test_oversized_frame_closes_connection() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_poll_wait_ms(10)
        .max_message_size(1024)
        .build();
    let mut server = bind(config);
    let mut client = connect(&server);
    pump(&mut server, 2);
    assert_eq!(server.connection_count(), 1);

    client.send_raw(&4096u32.to_le_bytes()).unwrap();
    pump(&mut server, 3);
    assert_eq!(server.connection_count(), 0);
    assert!(client.recv().is_err());
}

#[test]
fn test_malformed_body_closes_connection() {
    let mut server = bind(test_config());
    let mut client = connect(&server);

    // body claims two strings but carries none
    let mut frame = Vec::new();
    frame.extend_from_slice(&4u32.to_le_bytes());
    frame.extend_from_slice(&2u32.to_le_bytes());
    client.send_raw(&frame).unwrap();
    pump(&mut server, 3);

    assert_eq!(server.connection_count(), 0);
}

#[test]
fn test_connection_limit() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_poll_wait_ms(10)
        .max_connections(1)
        .build();
    let mut server = bind(config);

    let mut kept = connect(&server);
    pump(&mut server, 2);
    let mut rejected = connect(&server);
    pump(&mut server, 2);

    assert_eq!(server.connection_count(), 1);
    assert!(rejected.request(&["keys"]).is_err());
    assert_eq!(round_trip(&mut server, &mut kept, &["keys"]), Response::Arr(Vec::new()));
}

// =============================================================================
// Timer Tests
// =============================================================================

#[test]
fn test_idle_connection_is_closed() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_poll_wait_ms(10)
        .idle_timeout_ms(50)
        .build();
    let mut server = bind(config);
    let _client = connect(&server);
    pump(&mut server, 1);
    assert_eq!(server.connection_count(), 1);

    thread::sleep(Duration::from_millis(80));
    pump(&mut server, 1);
    assert_eq!(server.connection_count(), 0);
}

#[test]
fn test_active_connection_survives_idle_timeout() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_poll_wait_ms(10)
        .idle_timeout_ms(200)
        .build();
    let mut server = bind(config);
    let mut client = connect(&server);

    for _ in 0..6 {
        thread::sleep(Duration::from_millis(50));
        assert_eq!(round_trip(&mut server, &mut client, &["get", "k"]), Response::Nil);
    }
    assert_eq!(server.connection_count(), 1);
}

#[test]
fn test_keys_expire_between_requests() {
    let mut server = bind(test_config());
    let mut client = connect(&server);

    round_trip(&mut server, &mut client, &["set", "k", "v"]);
    assert_eq!(
        round_trip(&mut server, &mut client, &["pexpire", "k", "30"]),
        Response::Int(1)
    );

    thread::sleep(Duration::from_millis(50));
    pump(&mut server, 1);
    assert_eq!(server.engine().len(), 0);
    assert_eq!(round_trip(&mut server, &mut client, &["get", "k"]), Response::Nil);
}
