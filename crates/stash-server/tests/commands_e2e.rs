//! End-to-end command scenarios over a real localhost socket.

use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use stash_server::Server;
use stash_wire::{ErrCode, HEADER_LEN, Reply, encode_request};

struct TestServer {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start() -> Self {
        let mut server = Server::bind("127.0.0.1:0".parse().unwrap(), 18).unwrap();
        let addr = server.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            server.run(&thread_stop, Duration::from_millis(10)).unwrap();
        });
        Self { addr, stop, handle: Some(handle) }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

fn send(stream: &mut TcpStream, words: &[&str]) {
    let frame = encode_request(words).unwrap();
    stream.write_all(&frame).unwrap();
}

fn recv(stream: &mut TcpStream) -> Reply {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).unwrap();
    let len = u32::from_le_bytes(header) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).unwrap();
    Reply::decode(&body).unwrap()
}

fn roundtrip(stream: &mut TcpStream, words: &[&str]) -> Reply {
    send(stream, words);
    recv(stream)
}

#[test]
fn string_lifecycle() {
    let server = TestServer::start();
    let mut conn = server.connect();

    assert_eq!(roundtrip(&mut conn, &["set", "str", "foo", "bar"]), Reply::Nil);
    assert_eq!(roundtrip(&mut conn, &["get", "str", "foo"]), Reply::Str(b"bar".to_vec()));
    assert_eq!(roundtrip(&mut conn, &["del", "str", "foo"]), Reply::Int(1));
    assert_eq!(roundtrip(&mut conn, &["get", "str", "foo"]), Reply::Nil);
}

#[test]
fn empty_string_value_is_not_nil() {
    let server = TestServer::start();
    let mut conn = server.connect();

    assert_eq!(roundtrip(&mut conn, &["set", "str", "k", ""]), Reply::Nil);
    assert_eq!(roundtrip(&mut conn, &["get", "str", "k"]), Reply::Str(Vec::new()));
}

#[test]
fn sorted_set_lifecycle() {
    let server = TestServer::start();
    let mut conn = server.connect();

    assert_eq!(roundtrip(&mut conn, &["zadd", "zset", "10", "alice"]), Reply::Int(1));
    assert_eq!(roundtrip(&mut conn, &["zadd", "zset", "20", "bob"]), Reply::Int(1));
    assert_eq!(roundtrip(&mut conn, &["zcard", "zset"]), Reply::Int(2));
    assert_eq!(roundtrip(&mut conn, &["zscore", "zset", "alice"]), Reply::Int(10));
    assert_eq!(roundtrip(&mut conn, &["zrem", "zset", "alice"]), Reply::Int(1));
    assert_eq!(
        roundtrip(&mut conn, &["zscore", "zset", "alice"]),
        Reply::err(ErrCode::Arg, "key don't exists")
    );
}

#[test]
fn zadd_type_error_leaves_set_unchanged() {
    let server = TestServer::start();
    let mut conn = server.connect();

    assert_eq!(
        roundtrip(&mut conn, &["zadd", "zset", "notanumber", "alice"]),
        Reply::err(ErrCode::Type, "expect score number")
    );
    assert_eq!(roundtrip(&mut conn, &["zcard", "zset"]), Reply::Int(0));
}

#[test]
fn zadd_score_collision_rejected() {
    let server = TestServer::start();
    let mut conn = server.connect();

    assert_eq!(roundtrip(&mut conn, &["zadd", "zset", "10", "alice"]), Reply::Int(1));
    assert_eq!(
        roundtrip(&mut conn, &["zadd", "zset", "10", "bob"]),
        Reply::err(ErrCode::Arg, "key or value already exists")
    );
    assert_eq!(roundtrip(&mut conn, &["zcard", "zset"]), Reply::Int(1));
    assert_eq!(roundtrip(&mut conn, &["zscore", "zset", "alice"]), Reply::Int(10));
}

#[test]
fn unknown_cmd_keeps_connection_usable() {
    let server = TestServer::start();
    let mut conn = server.connect();

    assert_eq!(
        roundtrip(&mut conn, &["FOOBAR"]),
        Reply::err(ErrCode::Unknown, "Unknown cmd")
    );
    assert_eq!(roundtrip(&mut conn, &["set", "str", "a", "b"]), Reply::Nil);
    assert_eq!(roundtrip(&mut conn, &["get", "str", "a"]), Reply::Str(b"b".to_vec()));
}

#[test]
fn keys_spans_both_stores() {
    let server = TestServer::start();
    let mut conn = server.connect();

    roundtrip(&mut conn, &["set", "str", "foo", "bar"]);
    roundtrip(&mut conn, &["zadd", "zset", "1", "alice"]);
    let Reply::Arr(keys) = roundtrip(&mut conn, &["keys"]) else {
        panic!("expected array reply");
    };
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&Reply::Str(b"foo".to_vec())));
    assert!(keys.contains(&Reply::Str(b"alice".to_vec())));
}

#[test]
fn oversize_reply_degrades_to_too_big() {
    let server = TestServer::start();
    let mut conn = server.connect();

    for i in 0..600 {
        let key = format!("key-{i:04}");
        assert_eq!(roundtrip(&mut conn, &["set", "str", key.as_str(), "v"]), Reply::Nil);
    }
    assert_eq!(
        roundtrip(&mut conn, &["keys"]),
        Reply::err(ErrCode::TooBig, "response is too big.")
    );
    // and the connection is still fine
    assert_eq!(roundtrip(&mut conn, &["get", "str", "key-0000"]), Reply::Str(b"v".to_vec()));
}

#[test]
fn stores_are_shared_across_connections() {
    let server = TestServer::start();
    let mut writer = server.connect();
    let mut reader = server.connect();

    assert_eq!(roundtrip(&mut writer, &["set", "str", "shared", "v"]), Reply::Nil);
    assert_eq!(
        roundtrip(&mut reader, &["get", "str", "shared"]),
        Reply::Str(b"v".to_vec())
    );
}
