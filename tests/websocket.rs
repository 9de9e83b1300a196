use std::sync::{Arc, Mutex};

use squall::error::{Error, HandshakeError};
use squall::httpserver::{HttpConnection, HttpRequest, Transport};
use squall::settings::Settings;
use squall::websocket::{upgrade, WebSocketConnection, WsVersion};

#[derive(Clone, Default)]
struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    written: Vec<u8>,
    closed: bool,
}

impl Transport for MockTransport {
    fn write(&mut self, data: &[u8]) {
        self.inner.lock().unwrap().written.extend_from_slice(data);
    }

    fn close(&mut self) {
        self.inner.lock().unwrap().closed = true;
    }
}

impl MockTransport {
    fn written(&self) -> Vec<u8> {
        self.inner.lock().unwrap().written.clone()
    }

    fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.lock().unwrap().written)
    }

    fn closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

/// Run the HTTP side of the upgrade: parse `raw` as a request and hand
/// the transport plus surplus bytes back, as an embedder would.
fn receive_request(raw: &[u8]) -> (HttpRequest, MockTransport, Vec<u8>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let transport = MockTransport::default();
    let mut conn = HttpConnection::new(
        transport.clone(),
        "10.0.0.1",
        "http",
        Arc::new(Settings::default()),
    );
    let request = conn
        .data_received(raw)
        .expect("handshake request should parse")
        .expect("handshake request should be complete");
    let (transport, surplus) = conn.into_upgrade_parts();
    (request, transport, surplus)
}

fn connect(raw: &[u8]) -> (WebSocketConnection<MockTransport>, MockTransport, Vec<Vec<u8>>) {
    let (request, transport, surplus) = receive_request(raw);
    let probe = transport.clone();
    let (ws, messages) =
        upgrade(&request, transport, "squall/test", &surplus).expect("upgrade should succeed");
    (ws, probe, messages)
}

const DRAFT17_HANDSHAKE: &[u8] = b"GET /chat HTTP/1.1\r\n\
    Host: server.example.com\r\n\
    Upgrade: websocket\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
    Origin: http://example.com\r\n\
    Sec-WebSocket-Version: 13\r\n\r\n";

/// An unmasked-in-effect client frame: the mask bit is set but the key
/// is all zeroes, so the payload goes over the wire in the clear.
fn client_frame(byte0: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() < 126);
    let mut out = vec![byte0, 0x80 | payload.len() as u8, 0, 0, 0, 0];
    out.extend_from_slice(payload);
    out
}

#[test]
fn draft17_handshake_derives_accept_key() {
    let (ws, probe, messages) = connect(DRAFT17_HANDSHAKE);
    assert_eq!(ws.version(), WsVersion::Rfc6455);
    assert!(messages.is_empty());

    let response = String::from_utf8(probe.written()).unwrap();
    assert!(response.starts_with("HTTP/1.1 101 Web Socket Protocol Handshake\r\n"));
    assert!(response.contains("Upgrade: WebSocket\r\n"));
    assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
    assert!(response.contains("WebSocket-Origin: http://example.com\r\n"));
    assert!(response.contains("WebSocket-Location: ws://server.example.com/chat\r\n"));
    assert!(!probe.closed());
}

#[test]
fn masked_text_frame_decodes() {
    let (mut ws, _probe, _) = connect(DRAFT17_HANDSHAKE);
    // "Hello" masked with 37 fa 21 3d, from the protocol examples
    let frame = [
        0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
    ];
    let messages = ws.data_received(&frame).unwrap();
    assert_eq!(messages, vec![b"Hello".to_vec()]);
}

#[test]
fn frame_split_across_reads_decodes_once() {
    let (mut ws, _probe, _) = connect(DRAFT17_HANDSHAKE);
    let frame = [
        0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
    ];
    let mut messages = Vec::new();
    for b in frame.iter() {
        messages.extend(ws.data_received(std::slice::from_ref(b)).unwrap());
    }
    assert_eq!(messages, vec![b"Hello".to_vec()]);
}

#[test]
fn fragmented_message_is_reassembled() {
    let (mut ws, _probe, _) = connect(DRAFT17_HANDSHAKE);
    let mut input = client_frame(0x01, b"he"); // text, fin clear
    input.extend_from_slice(&client_frame(0x80, b"llo")); // continuation, fin set
    let messages = ws.data_received(&input).unwrap();
    assert_eq!(messages, vec![b"hello".to_vec()]);
}

#[test]
fn surplus_after_handshake_is_consumed() {
    let mut raw = DRAFT17_HANDSHAKE.to_vec();
    raw.extend_from_slice(&client_frame(0x81, b"early"));
    let (_ws, _probe, messages) = connect(&raw);
    assert_eq!(messages, vec![b"early".to_vec()]);
}

#[test]
fn ping_is_answered_with_pong() {
    let (mut ws, probe, _) = connect(DRAFT17_HANDSHAKE);
    probe.take_written();
    let messages = ws.data_received(&client_frame(0x89, b"pi")).unwrap();
    assert!(messages.is_empty());
    assert_eq!(probe.written(), [0x8a, 0x02, b'p', b'i']);
    assert!(ws.is_open());
}

#[test]
fn close_is_echoed_and_connection_dropped() {
    let (mut ws, probe, _) = connect(DRAFT17_HANDSHAKE);
    probe.take_written();
    ws.data_received(&client_frame(0x88, &[0x03, 0xe8])).unwrap();
    assert_eq!(probe.written(), [0x88, 0x02, 0x03, 0xe8]);
    assert!(probe.closed());
    assert!(!ws.is_open());
}

#[test]
fn send_message_frames_text() {
    let (mut ws, probe, _) = connect(DRAFT17_HANDSHAKE);
    probe.take_written();
    ws.send_message(b"hey");
    assert_eq!(probe.written(), [0x81, 0x03, b'h', b'e', b'y']);
}

#[test]
fn bad_opcode_drops_connection() {
    let (mut ws, probe, _) = connect(DRAFT17_HANDSHAKE);
    let result = ws.data_received(&client_frame(0x83, b"?"));
    assert!(result.is_err());
    assert!(probe.closed());
    assert!(!ws.is_open());
}

#[test]
fn unknown_version_gets_426() {
    let raw = b"GET /chat HTTP/1.1\r\n\
        Host: x\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 99\r\n\r\n";
    let (request, transport, surplus) = receive_request(raw);
    let probe = transport.clone();
    let result = upgrade(&request, transport, "squall/test", &surplus);
    assert!(matches!(
        result,
        Err(Error::Handshake(HandshakeError::UnsupportedVersion))
    ));
    assert_eq!(
        probe.written(),
        b"HTTP/1.1 426 Upgrade Required\r\nSec-WebSocket-Version: 8\r\n\r\n"
    );
    assert!(probe.closed());
}

#[test]
fn missing_upgrade_header_gets_403() {
    let raw = b"GET /chat HTTP/1.1\r\nHost: x\r\n\r\n";
    let (request, transport, surplus) = receive_request(raw);
    let probe = transport.clone();
    let result = upgrade(&request, transport, "squall/test", &surplus);
    assert!(matches!(
        result,
        Err(Error::Handshake(HandshakeError::NotAnUpgrade))
    ));
    let response = String::from_utf8(probe.written()).unwrap();
    assert!(response.starts_with("HTTP/1.1 403 Forbidden\r\n"));
    assert!(response.ends_with("Can \"Upgrade\" only to \"WebSocket\"."));
    assert!(probe.closed());
}

const DRAFT76_HANDSHAKE: &[u8] = b"GET /demo HTTP/1.1\r\n\
    Host: example.com\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Key2: 12998 5 Y3 1  .P00\r\n\
    Upgrade: WebSocket\r\n\
    Sec-WebSocket-Key1: 4 @1  46546xW%0l 1 5\r\n\
    Origin: http://example.com\r\n\r\n";

#[test]
fn draft76_challenge_is_answered() {
    // nonce arrives right behind the headers
    let mut raw = DRAFT76_HANDSHAKE.to_vec();
    raw.extend_from_slice(b"^n:ds[4U");
    let (ws, probe, messages) = connect(&raw);
    assert_eq!(ws.version(), WsVersion::Hixie76);
    assert!(messages.is_empty());

    let written = probe.written();
    let response = String::from_utf8_lossy(&written);
    assert!(response.starts_with("HTTP/1.1 101 Web Socket Protocol Handshake\r\n"));
    assert!(response.contains("Sec-WebSocket-Origin: http://example.com\r\n"));
    assert!(response.contains("Sec-WebSocket-Location: ws://example.com/demo\r\n"));
    // the reply from the protocol draft's worked example
    assert!(written.ends_with(b"8jKS'y:G*Co,Wxa-"));
}

#[test]
fn draft76_nonce_may_trickle_in() {
    let (mut ws, probe, _) = connect(DRAFT76_HANDSHAKE);
    probe.take_written();
    assert!(ws.data_received(b"^n:d").unwrap().is_empty());
    assert!(probe.written().is_empty());
    assert!(ws.data_received(b"s[4U").unwrap().is_empty());
    assert_eq!(probe.written(), b"8jKS'y:G*Co,Wxa-");
}

#[test]
fn draft76_frames_after_challenge() {
    let mut raw = DRAFT76_HANDSHAKE.to_vec();
    raw.extend_from_slice(b"^n:ds[4U");
    let (mut ws, probe, _) = connect(&raw);
    probe.take_written();

    let messages = ws.data_received(b"\x00hello\xff\x00bye\xff").unwrap();
    assert_eq!(messages, vec![b"hello".to_vec(), b"bye".to_vec()]);

    ws.send_message(b"hi");
    assert_eq!(probe.written(), b"\x00hi\xff");
}

#[test]
fn draft75_without_challenge_keys() {
    let raw = b"GET /demo HTTP/1.1\r\n\
        Host: example.com\r\n\
        Connection: Upgrade\r\n\
        Upgrade: WebSocket\r\n\
        Origin: http://example.com\r\n\r\n";
    let (mut ws, probe, _) = connect(raw);
    assert_eq!(ws.version(), WsVersion::Hixie75);

    let response = String::from_utf8(probe.take_written()).unwrap();
    assert!(response.starts_with("HTTP/1.1 101 Web Socket Protocol Handshake\r\n"));
    assert!(response.contains("WebSocket-Origin: http://example.com\r\n"));
    assert!(response.contains("WebSocket-Location: ws://example.com/demo\r\n"));

    // no challenge round trip: frames decode immediately
    let messages = ws.data_received(b"\x00direct\xff").unwrap();
    assert_eq!(messages, vec![b"direct".to_vec()]);
}

#[test]
fn hixie_close_handshake() {
    let mut raw = DRAFT76_HANDSHAKE.to_vec();
    raw.extend_from_slice(b"^n:ds[4U");
    let (mut ws, probe, _) = connect(&raw);
    probe.take_written();

    ws.data_received(b"\xff\x00").unwrap();
    assert_eq!(probe.written(), b"\xff\x00");
    assert!(probe.closed());
    assert!(!ws.is_open());
}

#[test]
fn hixie_junk_frame_type_drops_connection() {
    let mut raw = DRAFT76_HANDSHAKE.to_vec();
    raw.extend_from_slice(b"^n:ds[4U");
    let (mut ws, probe, _) = connect(&raw);
    assert!(ws.data_received(&[0x02]).is_err());
    assert!(probe.closed());
}

#[test]
fn draft76_zero_space_key_is_rejected() {
    let raw = b"GET /demo HTTP/1.1\r\n\
        Host: example.com\r\n\
        Connection: Upgrade\r\n\
        Upgrade: WebSocket\r\n\
        Sec-WebSocket-Key1: 12345\r\n\
        Sec-WebSocket-Key2: 12998 5 Y3 1  .P00\r\n\r\n";
    let (request, transport, surplus) = receive_request(raw);
    let probe = transport.clone();
    // the handshake itself succeeds; the challenge phase fails
    let (mut ws, _) = upgrade(&request, transport, "squall/test", &surplus).unwrap();
    let result = ws.data_received(b"^n:ds[4U");
    assert!(matches!(
        result,
        Err(Error::Handshake(HandshakeError::ZeroSpaceKey))
    ));
    assert!(probe.closed());
}
