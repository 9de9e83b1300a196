//! Websocket upgrade and connection handling.
//!
//! Two handshake generations are negotiated from the request headers:
//! `Sec-WebSocket-Version` 7, 8 or 13 selects the RFC 6455 protocol;
//! no version header selects the legacy hixie protocol, draft 76 when
//! the challenge keys are present and draft 75 otherwise. A known
//! upgrade with an unknown version is answered `426 Upgrade Required`.
//! The codec picked at the handshake is fixed for the connection's
//! lifetime.

pub mod frame;
pub mod hixie;
pub mod key;

pub use frame::{FrameCodec, FrameEvent, FrameHead, OpCode};
pub use hixie::{HixieCodec, HixieEvent};

use crate::error::{Error, HandshakeError};
use crate::httpserver::{HttpRequest, Transport};

/// Which handshake the connection settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsVersion {
    Rfc6455,
    Hixie76,
    Hixie75,
}

enum Codec {
    Rfc6455(FrameCodec),
    Hixie(HixieCodec),
}

/// Draft-76 clients send 8 nonce bytes after their headers; nothing
/// may be decoded until the challenge is answered.
struct PendingChallenge {
    key1: String,
    key2: String,
    nonce: Vec<u8>,
}

/// A websocket connection that has taken over a transport.
pub struct WebSocketConnection<T: Transport> {
    transport: T,
    codec: Codec,
    version: WsVersion,
    challenge: Option<PendingChallenge>,
    open: bool,
}

/// Negotiate the upgrade and take over the transport.
///
/// `surplus` is whatever the HTTP layer had already buffered past the
/// request; messages completed by it are returned alongside the
/// connection. On a failed negotiation the refusal has been written
/// and the transport closed.
pub fn upgrade<T: Transport>(
    request: &HttpRequest,
    mut transport: T,
    server_name: &str,
    surplus: &[u8],
) -> Result<(WebSocketConnection<T>, Vec<Vec<u8>>), Error> {
    let upgrade_ok = request
        .headers
        .get("Upgrade")
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    if !upgrade_ok {
        let message = "Can \"Upgrade\" only to \"WebSocket\".";
        transport.write(
            format!(
                "HTTP/1.1 403 Forbidden\r\nContent-Length: {}\r\n\r\n{}",
                message.len(),
                message
            )
            .as_bytes(),
        );
        transport.close();
        return Err(HandshakeError::NotAnUpgrade.into());
    }

    let origin = request
        .headers
        .get("Origin")
        .or_else(|| request.headers.get("Sec-Websocket-Origin"))
        .unwrap_or("")
        .to_owned();

    let (codec, version, challenge) = match request.headers.get("Sec-Websocket-Version") {
        Some("7") | Some("8") | Some("13") => {
            log::info!("using ws spec (draft 17)");
            let sec_key = match request.headers.get("Sec-Websocket-Key") {
                Some(k) => k,
                None => {
                    transport.write(b"HTTP/1.1 400 Bad Request\r\n\r\n");
                    transport.close();
                    return Err(HandshakeError::MissingSecKey.into());
                }
            };
            let accept = key::derive_accept_key(sec_key.as_bytes());
            transport.write(
                format!(
                    "HTTP/1.1 101 Web Socket Protocol Handshake\r\n\
                     Upgrade: WebSocket\r\n\
                     Connection: Upgrade\r\n\
                     Sec-WebSocket-Accept: {}\r\n\
                     Server: {}\r\n\
                     WebSocket-Origin: {}\r\n\
                     WebSocket-Location: ws://{}{}\r\n\r\n",
                    accept, server_name, origin, request.host, request.path
                )
                .as_bytes(),
            );
            (Codec::Rfc6455(FrameCodec::new()), WsVersion::Rfc6455, None)
        }
        Some(_) => {
            transport
                .write(b"HTTP/1.1 426 Upgrade Required\r\nSec-WebSocket-Version: 8\r\n\r\n");
            transport.close();
            return Err(HandshakeError::UnsupportedVersion.into());
        }
        None => {
            let key1 = request.headers.get("Sec-Websocket-Key1").map(str::to_owned);
            let key2 = request.headers.get("Sec-Websocket-Key2").map(str::to_owned);
            let (version, origin_header, location_header, challenge) = match (key1, key2) {
                (Some(k1), Some(k2)) => {
                    log::info!("using ws draft 76 header exchange");
                    (
                        WsVersion::Hixie76,
                        "Sec-WebSocket-Origin",
                        "Sec-WebSocket-Location",
                        Some(PendingChallenge {
                            key1: k1,
                            key2: k2,
                            nonce: Vec::new(),
                        }),
                    )
                }
                _ => {
                    log::info!("using old ws spec (draft 75)");
                    (
                        WsVersion::Hixie75,
                        "WebSocket-Origin",
                        "WebSocket-Location",
                        None,
                    )
                }
            };
            transport.write(
                format!(
                    "HTTP/1.1 101 Web Socket Protocol Handshake\r\n\
                     Upgrade: WebSocket\r\n\
                     Connection: Upgrade\r\n\
                     Server: {}\r\n\
                     {}: {}\r\n\
                     {}: ws://{}{}\r\n\r\n",
                    server_name,
                    origin_header,
                    origin,
                    location_header,
                    request.host,
                    request.path
                )
                .as_bytes(),
            );
            (Codec::Hixie(HixieCodec::new()), version, challenge)
        }
    };

    let mut conn = WebSocketConnection {
        transport,
        codec,
        version,
        challenge,
        open: true,
    };
    let messages = conn.data_received(surplus)?;
    Ok((conn, messages))
}

impl<T: Transport> WebSocketConnection<T> {
    pub fn version(&self) -> WsVersion {
        self.version
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Feed received bytes, returning completed messages. Control
    /// traffic (ping, the closing handshake, the draft-76 challenge)
    /// is answered on the transport directly.
    pub fn data_received(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
        if !self.open {
            return Ok(Vec::new());
        }

        let mut data = data;
        let rest;
        if let Some(challenge) = &mut self.challenge {
            let want = 8 - challenge.nonce.len();
            let take = want.min(data.len());
            challenge.nonce.extend_from_slice(&data[..take]);
            if challenge.nonce.len() < 8 {
                return Ok(Vec::new());
            }
            let mut nonce = [0_u8; 8];
            nonce.copy_from_slice(&challenge.nonce);
            let token = match key::hixie76_token(&challenge.key1, &challenge.key2, &nonce) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("invalid draft 76 challenge: {}", e);
                    self.transport.close();
                    self.open = false;
                    return Err(e.into());
                }
            };
            self.transport.write(&token);
            self.challenge = None;
            rest = data[take..].to_vec();
            data = &rest;
        }

        let mut messages = Vec::new();
        match &mut self.codec {
            Codec::Rfc6455(codec) => {
                let events = match codec.feed(data) {
                    Ok(ev) => ev,
                    Err(e) => {
                        log::warn!("invalid websocket data: {}", e);
                        self.transport.close();
                        self.open = false;
                        return Err(e.into());
                    }
                };
                for event in events {
                    match event {
                        FrameEvent::Message(m) => messages.push(m),
                        FrameEvent::Ping(payload) => {
                            self.transport
                                .write(&frame::encode_frame(OpCode::Pong, &payload));
                        }
                        FrameEvent::Close(payload) => {
                            self.transport
                                .write(&frame::encode_frame(OpCode::Close, &payload));
                            self.transport.close();
                            self.open = false;
                            break;
                        }
                    }
                }
            }
            Codec::Hixie(codec) => {
                let events = match codec.feed(data) {
                    Ok(ev) => ev,
                    Err(e) => {
                        log::warn!("invalid websocket data: {}", e);
                        self.transport.close();
                        self.open = false;
                        return Err(e.into());
                    }
                };
                for event in events {
                    match event {
                        HixieEvent::Message(m) => messages.push(m),
                        HixieEvent::Closing => {
                            self.transport.write(&hixie::CLOSE_FRAME);
                            self.transport.close();
                            self.open = false;
                            break;
                        }
                    }
                }
            }
        }
        Ok(messages)
    }

    /// Send a message, framed for whichever protocol was negotiated.
    pub fn send_message(&mut self, payload: &[u8]) {
        if !self.open {
            return;
        }
        match &self.codec {
            Codec::Rfc6455(_) => self
                .transport
                .write(&frame::encode_frame(OpCode::Text, payload)),
            Codec::Hixie(_) => self.transport.write(&hixie::encode_frame(payload)),
        }
    }

    /// Start the closing handshake and drop the transport.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        match &self.codec {
            Codec::Rfc6455(_) => self
                .transport
                .write(&frame::encode_frame(OpCode::Close, b"")),
            Codec::Hixie(_) => self.transport.write(&hixie::CLOSE_FRAME),
        }
        self.transport.close();
        self.open = false;
    }
}
