//! End-to-end scenarios exercising the public API surface across HPACK,
//! the priority tree, flow control, the connection preface, and the
//! HTTP/1.1 client + pool.

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;
use std::time::Instant;

use corehttp::h1::{Client, Dialer, Method};
use corehttp::h2::flow_control::{FlowController, Window};
use corehttp::h2::priority::PriorityTree;
use corehttp::h2::stream::CancelToken;
use corehttp::h2::CONNECTION_PREFACE;
use corehttp::hpack::{Decoder, Encoder, HeaderField};
use corehttp::transport::Transport;
use corehttp::wire::huffman;
use corehttp::wire::varint::{decode_int, encode_int};

/// E1. HPACK round trip, RFC 7541 §C.2.4 style.
#[test]
fn e1_hpack_round_trip_populates_dynamic_table_newest_first() {
    let headers = vec![
        HeaderField::new(":method", "GET"),
        HeaderField::new(":scheme", "http"),
        HeaderField::new(":path", "/"),
        HeaderField::new(":authority", "www.example.com"),
        HeaderField::new("cache-control", "no-cache"),
        HeaderField::new("custom-key", "custom-value"),
    ];

    let mut encoder = Encoder::new(4096);
    let block = encoder.encode(&headers);

    let mut decoder = Decoder::new(4096);
    let decoded = decoder.decode(&block).unwrap();
    assert_eq!(decoded, headers);
    assert_eq!(decoder.dynamic_table_len(), 3, "custom-key, cache-control, :authority are indexable");
}

/// E2. Static-table encode.
#[test]
fn e2_static_table_encode_is_one_octet() {
    let mut encoder = Encoder::new(4096);
    let block = encoder.encode(&[HeaderField::new(":method", "GET")]);
    assert_eq!(block, vec![0x82]);
}

/// E3. Integer encode.
#[test]
fn e3_integer_encode_1337_with_five_bit_prefix() {
    let mut out = Vec::new();
    encode_int(5, 0, 1337, &mut out);
    assert_eq!(out, vec![31, 154, 10]);
    let (value, consumed) = decode_int(5, &out).unwrap();
    assert_eq!(value, 1337);
    assert_eq!(consumed, out.len());
}

/// E4. Huffman.
#[test]
fn e4_huffman_matches_rfc_example_and_round_trips() {
    let encoded = huffman::encode(b"www.example.com");
    assert_eq!(encoded, vec![0xF1, 0xE3, 0xC2, 0xE5, 0xF2, 0x3A, 0x6B, 0xA0, 0xAB, 0x90, 0xF4, 0xFF]);
    let decoded = huffman::decode(&encoded).unwrap();
    assert_eq!(decoded, b"www.example.com");
}

/// E5. Stream cycle prevention: the chain 3->5, 5->1, 1->3 must not raise,
/// and must reparent 1 to the root instead.
#[test]
fn e5_priority_cycle_is_broken_by_reattaching_to_root() {
    let mut tree = PriorityTree::new();
    tree.add_stream(1, 0, 15, false);
    tree.add_stream(3, 0, 15, false);
    tree.add_stream(5, 0, 15, false);

    tree.update_priority(3, 5, 15, false).unwrap();
    tree.update_priority(5, 1, 15, false).unwrap();
    tree.update_priority(1, 3, 15, false).unwrap();

    assert_eq!(tree.parent_of(1), Some(0), "cycle-closing update reattaches to the root instead");
}

/// E6. Stream self-dependency.
#[test]
fn e6_self_dependency_is_rejected() {
    let mut tree = PriorityTree::new();
    tree.add_stream(7, 0, 15, false);
    let err = tree.update_priority(7, 7, 15, false).unwrap_err();
    assert_eq!(err, corehttp::h2::priority::PriorityError::SelfDependency);
}

/// E7. Flow control negative window.
#[test]
fn e7_window_goes_negative_then_partially_recovers() {
    let mut conn_window = Window::new(65_535);
    let mut stream_window = Window::new(10);

    let sent = FlowController::send_data(&mut conn_window, &mut stream_window, 10).unwrap();
    assert_eq!(sent, 10);
    assert_eq!(stream_window.current(), 0);

    stream_window.apply_settings_delta(-5).unwrap();
    assert_eq!(stream_window.current(), -5);

    stream_window.increment(6).unwrap();
    assert_eq!(stream_window.current(), 1);
}

/// E8. Connection preface is exactly 24 octets and any deviation is
/// distinguishable from the real preface.
#[test]
fn e8_connection_preface_is_24_octets_and_deviation_is_detectable() {
    assert_eq!(CONNECTION_PREFACE.len(), 24);
    let mut corrupted = *CONNECTION_PREFACE;
    corrupted[0] = b'X';
    assert_ne!(&corrupted, CONNECTION_PREFACE);
}

struct ScriptedTransport {
    reads: VecDeque<Vec<u8>>,
}

impl Transport for ScriptedTransport {
    fn read_with_deadline(&mut self, buf: &mut [u8], _deadline: Option<Instant>) -> io::Result<usize> {
        match self.reads.pop_front() {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.reads.push_front(chunk[n..].to_vec());
                }
                Ok(n)
            }
            None => Ok(0),
        }
    }
    fn write_with_deadline(&mut self, _buf: &[u8], _deadline: Option<Instant>) -> io::Result<()> {
        Ok(())
    }
    fn set_deadline(&mut self, _deadline: Option<Instant>) {}
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct ScriptedDialer {
    responses: Mutex<VecDeque<Vec<u8>>>,
}

impl Dialer<ScriptedTransport> for ScriptedDialer {
    fn dial(&self, _host_port: &str, _deadline: Option<Instant>) -> io::Result<ScriptedTransport> {
        let data = self.responses.lock().unwrap().pop_front().unwrap_or_default();
        Ok(ScriptedTransport { reads: [data].into() })
    }
}

/// E9. HTTP/1.1 connection reuse.
#[test]
fn e9_two_back_to_back_gets_dial_once() {
    let dialer = ScriptedDialer {
        responses: Mutex::new(
            [b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec()].into(),
        ),
    };
    let mut config = corehttp::config::ClientConfig::default();
    config.pool = config.pool.with_max_conns_per_host(1);
    let client = Client::new(dialer, config);
    let cancel = CancelToken::new();

    client.send(Method::Get, "http://h/", &[], None, &cancel).unwrap();
    client.send(Method::Get, "http://h/", &[], None, &cancel).unwrap();

    let stats = client.pool().stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.idle, 1);
}

/// E10. HTTP/1.1 chunked body.
#[test]
fn e10_chunked_body_yields_bytes_then_eof_and_stays_reusable() {
    let dialer = ScriptedDialer {
        responses: Mutex::new([b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n".to_vec()].into()),
    };
    let client = Client::new(dialer, corehttp::config::ClientConfig::default());
    let cancel = CancelToken::new();

    let response = client.send(Method::Get, "http://h/", &[], None, &cancel).unwrap();
    assert_eq!(response.body.as_ref(), b"hello");
    assert_eq!(client.pool().stats().idle, 1, "the connection must be returned to the idle pool");
}
