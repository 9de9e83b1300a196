//! Non-blocking HTTP/1.x connection handling.
//!
//! [`HttpConnection`] sits between a byte transport and the request
//! lifecycle: it parses requests incrementally, accumulates bodies,
//! answers `Expect: 100-continue`, and decides keep-alive after each
//! response. It never blocks; the embedder pushes bytes in with
//! [`HttpConnection::data_received`].

pub mod parser;
pub mod body;
pub mod request;

pub use parser::{ParseEvent, RequestHead, StreamParser, parse_request_head};
pub use body::BodySink;
pub use request::HttpRequest;

use std::sync::Arc;

use crate::error::{Error, ParseError};
use crate::escape::parse_qs_bytes;
use crate::httputil::{multipart_boundary, parse_multipart_form_data};
use crate::settings::Settings;

/// Outbound half of a connection.
///
/// Implementations are expected to buffer internally; `write` must not
/// block.
pub trait Transport {
    fn write(&mut self, data: &[u8]);
    fn close(&mut self);
}

enum Phase {
    /// Reading a request head.
    Headers,
    /// Reading a body of known length.
    Body {
        request: Box<HttpRequest>,
        sink: BodySink,
    },
    /// A request has been delivered and awaits `finish_request`.
    Busy,
    Closed,
}

/// One HTTP connection over an arbitrary transport.
pub struct HttpConnection<T: Transport> {
    transport: T,
    settings: Arc<Settings>,
    parser: StreamParser,
    phase: Phase,
    remote_ip: String,
    protocol: String,
    /// Bytes received while a request was in flight.
    deferred: Vec<u8>,
    notify_finish: Option<Box<dyn FnOnce() + Send>>,
}

impl<T: Transport> HttpConnection<T> {
    /// `remote_ip` and `protocol` describe the physical peer; proxy
    /// header overrides happen per request when `xheaders` is set.
    pub fn new(
        transport: T,
        remote_ip: impl Into<String>,
        protocol: impl Into<String>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            transport,
            settings,
            parser: StreamParser::new(),
            phase: Phase::Headers,
            remote_ip: remote_ip.into(),
            protocol: protocol.into(),
            deferred: Vec::new(),
            notify_finish: None,
        }
    }

    /// Write response bytes to the peer.
    pub fn write(&mut self, data: &[u8]) {
        self.transport.write(data);
    }

    /// Close the connection outright.
    pub fn close(&mut self) {
        self.transport.close();
        self.phase = Phase::Closed;
        self.fire_notify_finish();
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.phase, Phase::Closed)
    }

    /// Register a callback fired exactly once, when the current
    /// request finishes or the connection goes away.
    pub fn set_notify_finish(&mut self, f: Box<dyn FnOnce() + Send>) {
        self.notify_finish = Some(f);
    }

    fn fire_notify_finish(&mut self) {
        if let Some(f) = self.notify_finish.take() {
            f();
        }
    }

    /// The transport reports the peer hung up.
    pub fn connection_lost(&mut self) {
        self.phase = Phase::Closed;
        self.fire_notify_finish();
    }

    /// Push received bytes through the parser.
    ///
    /// Returns a complete request once its head and body have arrived.
    /// A malformed request is logged, the connection is dropped, and
    /// the error is surfaced to the caller.
    pub fn data_received(&mut self, data: &[u8]) -> Result<Option<HttpRequest>, Error> {
        match self.phase {
            Phase::Closed => return Ok(None),
            Phase::Busy => {
                self.deferred.extend_from_slice(data);
                return Ok(None);
            }
            _ => {}
        }

        let mut input = data;
        loop {
            match &mut self.phase {
                Phase::Headers => match self.parser.feed(input) {
                    ParseEvent::HeaderBlock(block) => match self.on_headers(&block) {
                        Ok(Some(request)) => return Ok(Some(request)),
                        Ok(None) => input = b"",
                        Err(e) => {
                            log::warn!("malformed HTTP request from {}: {}", self.remote_ip, e);
                            self.close();
                            return Err(e);
                        }
                    },
                    ParseEvent::Incomplete => return Ok(None),
                    ParseEvent::BodyChunk { .. } => unreachable!(),
                },
                Phase::Body { sink, .. } => match self.parser.feed(input) {
                    ParseEvent::BodyChunk { data, done } => {
                        sink.write(&data)?;
                        if done {
                            let request = self.on_body_complete()?;
                            return Ok(Some(request));
                        }
                        input = b"";
                    }
                    ParseEvent::Incomplete => return Ok(None),
                    ParseEvent::HeaderBlock(_) => unreachable!(),
                },
                Phase::Busy | Phase::Closed => return Ok(None),
            }
        }
    }

    fn on_headers(&mut self, block: &[u8]) -> Result<Option<HttpRequest>, Error> {
        let head = parse_request_head(block)?;
        let content_length = match head.headers.get("Content-Length") {
            Some(v) => v.parse::<usize>().map_err(|_| ParseError::BadContentLength)?,
            None => 0,
        };

        let expects_continue = head
            .headers
            .get("Expect")
            .map(|v| v.eq_ignore_ascii_case("100-continue"))
            .unwrap_or(false);

        let request = HttpRequest::new(
            head.method,
            head.uri,
            head.version,
            head.headers,
            self.remote_ip.clone(),
            self.protocol.clone(),
            self.settings.xheaders,
        );

        if content_length == 0 {
            self.phase = Phase::Busy;
            return Ok(Some(request));
        }

        if expects_continue {
            self.transport.write(b"HTTP/1.1 100 (Continue)\r\n\r\n");
        }

        let sink = BodySink::with_expected(content_length, self.settings.body_spill_threshold)?;
        self.parser.expect_raw_body(content_length);
        self.phase = Phase::Body {
            request: Box::new(request),
            sink,
        };
        Ok(None)
    }

    fn on_body_complete(&mut self) -> Result<HttpRequest, Error> {
        let phase = std::mem::replace(&mut self.phase, Phase::Busy);
        let (request, sink) = match phase {
            Phase::Body { request, sink } => (request, sink),
            _ => unreachable!(),
        };
        let mut request = *request;
        request.body = sink.into_bytes()?;

        if matches!(request.method.as_str(), "POST" | "PATCH" | "PUT") {
            let content_type = request.headers.get("Content-Type").unwrap_or("").to_owned();
            if content_type.starts_with("application/x-www-form-urlencoded") {
                // blank form values are dropped, unlike query arguments
                let mut pairs = parse_qs_bytes(&request.body, false);
                request.arguments.append(&mut pairs);
            } else if content_type.starts_with("multipart/form-data") {
                match multipart_boundary(&content_type) {
                    Some(boundary) => {
                        let body = std::mem::take(&mut request.body);
                        parse_multipart_form_data(
                            boundary,
                            &body,
                            &mut request.arguments,
                            &mut request.files,
                        );
                        request.body = body;
                    }
                    None => log::warn!("invalid multipart/form-data: no boundary"),
                }
            }
        }

        Ok(request)
    }

    /// Finish the in-flight request: record timing, fire the finish
    /// callback, and either close or go back to reading, depending on
    /// keep-alive. Bytes of a pipelined follow-up request received in
    /// the meantime are processed, so the next request may be returned
    /// right here.
    pub fn finish_request(
        &mut self,
        request: &mut HttpRequest,
    ) -> Result<Option<HttpRequest>, Error> {
        // a connection that already went away stays gone
        if matches!(self.phase, Phase::Closed) {
            return Ok(None);
        }
        request.record_finish();
        self.fire_notify_finish();

        if self.should_disconnect(request) {
            self.transport.close();
            self.phase = Phase::Closed;
            return Ok(None);
        }

        self.phase = Phase::Headers;
        self.parser.expect_headers();
        let deferred = std::mem::take(&mut self.deferred);
        self.data_received(&deferred)
    }

    fn should_disconnect(&self, request: &HttpRequest) -> bool {
        if self.settings.no_keep_alive {
            return true;
        }
        let connection = request
            .headers
            .get("Connection")
            .unwrap_or("")
            .to_ascii_lowercase();
        if request.supports_http_1_1() {
            connection == "close"
        } else if request.headers.contains("Content-Length")
            || matches!(request.method.as_str(), "HEAD" | "GET")
        {
            connection != "keep-alive"
        } else {
            true
        }
    }

    /// Tear the connection apart, handing the transport and any
    /// buffered surplus bytes to a protocol that takes over the socket.
    pub fn into_upgrade_parts(mut self) -> (T, Vec<u8>) {
        let mut surplus = self.parser.take_buffer();
        surplus.extend_from_slice(&self.deferred);
        (self.transport, surplus)
    }
}
