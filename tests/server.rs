//! End-to-end tests that drive a real server over loopback TCP.
//!
//! Each test binds its own server on an ephemeral port and runs the event
//! loop on a background thread. The raw-socket tests build their frames by
//! hand so the wire format is checked independently of the crate's own
//! encoder.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use kvd::{KvdClient, KvdServer, MemStore};

const MAX_MSG: u32 = 32 << 20;

fn spawn_server() -> SocketAddr {
    let addr = "127.0.0.1:0".parse().unwrap();
    let server = KvdServer::bind(MemStore::new(), addr).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || {
        let _ = server.run();
    });
    addr
}

/// builds a request frame by hand: len, nargs, then length-prefixed args
fn frame(args: &[&[u8]]) -> Vec<u8> {
    let body: u32 = 4 + args.iter().map(|a| 4 + a.len() as u32).sum::<u32>();
    let mut out = Vec::new();
    out.extend_from_slice(&body.to_le_bytes());
    out.extend_from_slice(&(args.len() as u32).to_le_bytes());
    for arg in args {
        out.extend_from_slice(&(arg.len() as u32).to_le_bytes());
        out.extend_from_slice(arg);
    }
    out
}

/// reads one response frame, returning (status, payload)
fn read_response(stream: &mut TcpStream) -> (u32, Vec<u8>) {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).unwrap();
    let reslen = u32::from_le_bytes(header) as usize;
    assert!(reslen >= 4);

    let mut body = vec![0u8; reslen];
    stream.read_exact(&mut body).unwrap();
    let status = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    (status, body.split_off(4))
}

#[test]
fn set_get_del_lifecycle() {
    let addr = spawn_server();
    let mut client = KvdClient::connect(addr).unwrap();

    client.set(b"foo", b"bar").unwrap();
    assert_eq!(client.get(b"foo").unwrap(), Some(b"bar".to_vec()));
    client.del(b"foo").unwrap();
    assert_eq!(client.get(b"foo").unwrap(), None);
}

#[test]
fn get_on_a_fresh_server_reports_missing() {
    let addr = spawn_server();
    let mut client = KvdClient::connect(addr).unwrap();

    assert_eq!(client.get(b"missing").unwrap(), None);
}

#[test]
fn set_overwrites_an_existing_key() {
    let addr = spawn_server();
    let mut client = KvdClient::connect(addr).unwrap();

    client.set(b"k", b"v1").unwrap();
    client.set(b"k", b"v2").unwrap();
    assert_eq!(client.get(b"k").unwrap(), Some(b"v2".to_vec()));
}

#[test]
fn deleting_a_missing_key_succeeds() {
    let addr = spawn_server();
    let mut client = KvdClient::connect(addr).unwrap();

    client.del(b"never-set").unwrap();
}

#[test]
fn unknown_commands_are_answered_with_err() {
    let addr = spawn_server();
    let mut stream = TcpStream::connect(addr).unwrap();

    stream.write_all(&frame(&[b"ping"])).unwrap();
    assert_eq!(read_response(&mut stream), (1, Vec::new()));

    // a zero-argument frame is also an error, not a dropped connection
    stream.write_all(&frame(&[])).unwrap();
    assert_eq!(read_response(&mut stream), (1, Vec::new()));

    // the connection is still usable afterwards
    stream.write_all(&frame(&[b"set", b"k", b"v"])).unwrap();
    assert_eq!(read_response(&mut stream), (0, Vec::new()));
}

#[test]
fn an_oversize_frame_closes_the_connection_without_a_response() {
    let addr = spawn_server();
    let mut stream = TcpStream::connect(addr).unwrap();

    stream.write_all(&(MAX_MSG + 1).to_le_bytes()).unwrap();

    // the server hangs up after the length word alone; depending on
    // timing the read observes EOF or a reset
    let mut byte = [0u8; 1];
    match stream.read(&mut byte) {
        Ok(0) => {}
        Ok(n) => panic!("expected no response, read {} bytes", n),
        Err(err) => assert_eq!(err.kind(), ErrorKind::ConnectionReset),
    }
}

#[test]
fn pipelined_requests_are_answered_in_order() {
    let addr = spawn_server();
    let mut stream = TcpStream::connect(addr).unwrap();

    let mut batch = Vec::new();
    batch.extend_from_slice(&frame(&[b"set", b"a", b"1"]));
    batch.extend_from_slice(&frame(&[b"set", b"b", b"2"]));
    batch.extend_from_slice(&frame(&[b"get", b"a"]));
    batch.extend_from_slice(&frame(&[b"get", b"b"]));
    batch.extend_from_slice(&frame(&[b"del", b"a"]));
    batch.extend_from_slice(&frame(&[b"get", b"a"]));
    stream.write_all(&batch).unwrap();

    assert_eq!(read_response(&mut stream), (0, Vec::new()));
    assert_eq!(read_response(&mut stream), (0, Vec::new()));
    assert_eq!(read_response(&mut stream), (0, b"1".to_vec()));
    assert_eq!(read_response(&mut stream), (0, b"2".to_vec()));
    assert_eq!(read_response(&mut stream), (0, Vec::new()));
    assert_eq!(read_response(&mut stream), (2, Vec::new()));
}

#[test]
fn a_frame_split_across_many_writes_parses_like_one() {
    let addr = spawn_server();
    let mut stream = TcpStream::connect(addr).unwrap();

    let whole = frame(&[b"set", b"split-key", b"split-value"]);
    for chunk in whole.chunks(3) {
        stream.write_all(chunk).unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(read_response(&mut stream), (0, Vec::new()));

    stream.write_all(&frame(&[b"get", b"split-key"])).unwrap();
    assert_eq!(read_response(&mut stream), (0, b"split-value".to_vec()));
}

#[test]
fn a_large_value_round_trips() {
    let addr = spawn_server();
    let mut client = KvdClient::connect(addr).unwrap();

    // large enough that the response cannot fit in one socket write
    let value: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
    client.set(b"big", &value).unwrap();
    assert_eq!(client.get(b"big").unwrap(), Some(value));
}

#[test]
fn connections_are_independent() {
    let addr = spawn_server();
    let mut writer = KvdClient::connect(addr).unwrap();
    let mut reader = KvdClient::connect(addr).unwrap();

    writer.set(b"shared", b"value").unwrap();
    assert_eq!(reader.get(b"shared").unwrap(), Some(b"value".to_vec()));

    // dropping one client must not disturb the other
    drop(writer);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(reader.get(b"shared").unwrap(), Some(b"value".to_vec()));
}

#[test]
fn the_store_survives_many_keys_from_one_connection() {
    let addr = spawn_server();
    let mut client = KvdClient::connect(addr).unwrap();

    // enough keys to force several rounds of incremental rehashing
    for i in 0..2_000u32 {
        let key = format!("key-{}", i);
        let value = format!("value-{}", i);
        client.set(key.as_bytes(), value.as_bytes()).unwrap();
    }
    for i in 0..2_000u32 {
        let key = format!("key-{}", i);
        let value = format!("value-{}", i);
        assert_eq!(
            client.get(key.as_bytes()).unwrap(),
            Some(value.into_bytes())
        );
    }
}
