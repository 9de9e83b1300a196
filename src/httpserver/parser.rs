//! Incremental request parsing.
//!
//! The parser owns a byte buffer and alternates between two modes:
//! accumulating a header block up to the blank line, and counting off
//! a fixed-length raw body. Bytes past what the current mode consumes
//! stay buffered for the next mode, so results never depend on how
//! input was chunked by the transport.

use crate::error::ParseError;
use crate::httputil::HttpHeaders;

/// What the parser is currently reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Accumulate until `\r\n\r\n`.
    Headers,
    /// Accumulate exactly this many bytes.
    RawBody(usize),
}

/// Output of a [`StreamParser::feed`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseEvent {
    /// A complete header block, terminator stripped.
    HeaderBlock(Vec<u8>),
    /// Some raw body bytes. `done` marks the last chunk.
    BodyChunk { data: Vec<u8>, done: bool },
    /// More input is needed.
    Incomplete,
}

/// Resumable byte stream parser.
#[derive(Debug)]
pub struct StreamParser {
    buf: Vec<u8>,
    mode: Mode,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            mode: Mode::Headers,
        }
    }

    /// Switch to raw body mode. Surplus bytes already buffered count
    /// toward the body.
    pub fn expect_raw_body(&mut self, length: usize) {
        self.mode = Mode::RawBody(length);
    }

    /// Switch back to header mode.
    pub fn expect_headers(&mut self) {
        self.mode = Mode::Headers;
    }

    /// Bytes buffered but not yet consumed by a completed event.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Take the buffered surplus, e.g. when a protocol upgrade takes
    /// over the raw byte stream.
    pub fn take_buffer(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Append `data` and try to advance the current mode.
    ///
    /// Header mode emits nothing until the whole block has arrived.
    /// Raw body mode hands back whatever is available, counting the
    /// declared length down, so a large body never accumulates here.
    /// Call again with an empty slice to drain further events from
    /// bytes that are already buffered.
    pub fn feed(&mut self, data: &[u8]) -> ParseEvent {
        self.buf.extend_from_slice(data);

        match self.mode {
            Mode::Headers => match find_terminator(&self.buf) {
                Some(end) => {
                    let mut rest = self.buf.split_off(end + 4);
                    std::mem::swap(&mut self.buf, &mut rest);
                    rest.truncate(end);
                    ParseEvent::HeaderBlock(rest)
                }
                None => ParseEvent::Incomplete,
            },
            Mode::RawBody(remaining) => {
                if self.buf.is_empty() && remaining > 0 {
                    return ParseEvent::Incomplete;
                }
                let take = remaining.min(self.buf.len());
                let mut rest = self.buf.split_off(take);
                std::mem::swap(&mut self.buf, &mut rest);
                let remaining = remaining - take;
                self.mode = Mode::RawBody(remaining);
                ParseEvent::BodyChunk {
                    data: rest,
                    done: remaining == 0,
                }
            }
        }
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// A parsed request head: start line plus headers.
#[derive(Debug)]
pub struct RequestHead {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: HttpHeaders,
}

/// Parse a header block into a [`RequestHead`].
///
/// The start line must have exactly three space-separated tokens and
/// the version token must begin with `HTTP/`.
pub fn parse_request_head(block: &[u8]) -> Result<RequestHead, ParseError> {
    let text = std::str::from_utf8(block).map_err(|_| ParseError::MalformedStartLine)?;
    let (start_line, header_block) = match text.split_once("\r\n") {
        Some((s, h)) => (s, h),
        None => (text, ""),
    };

    let mut tokens = start_line.split(' ');
    let method = tokens.next().filter(|t| !t.is_empty());
    let uri = tokens.next();
    let version = tokens.next();
    let (method, uri, version) = match (method, uri, version, tokens.next()) {
        (Some(m), Some(u), Some(v), None) => (m, u, v),
        _ => return Err(ParseError::MalformedStartLine),
    };
    if !version.starts_with("HTTP/") {
        return Err(ParseError::MalformedVersion);
    }

    Ok(RequestHead {
        method: method.to_owned(),
        uri: uri.to_owned(),
        version: version.to_owned(),
        headers: HttpHeaders::parse(header_block)?,
    })
}
