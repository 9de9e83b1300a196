//! Chunked transfer encoding.

use crate::httpserver::HttpRequest;
use crate::httputil::HttpHeaders;

use super::OutputTransform;

/// Applies `Transfer-Encoding: chunked` to responses of unknown
/// length on HTTP/1.1 connections.
pub struct ChunkedTransform {
    chunking: bool,
}

impl ChunkedTransform {
    pub fn new(request: &HttpRequest) -> Self {
        Self {
            chunking: request.supports_http_1_1(),
        }
    }
}

impl OutputTransform for ChunkedTransform {
    fn transform_first_chunk(
        &mut self,
        status: u16,
        headers: &mut HttpHeaders,
        chunk: &mut Vec<u8>,
        finishing: bool,
    ) {
        if !self.chunking {
            return;
        }
        // 304 responses carry no body; a declared length or an
        // existing transfer encoding also rules chunking out
        if status == 304
            || headers.contains("Content-Length")
            || headers.contains("Transfer-Encoding")
        {
            self.chunking = false;
            return;
        }
        headers.set("Transfer-Encoding", "chunked");
        self.transform_chunk(chunk, finishing);
    }

    fn transform_chunk(&mut self, chunk: &mut Vec<u8>, finishing: bool) {
        if !self.chunking {
            return;
        }
        let mut out = Vec::with_capacity(chunk.len() + 16);
        // empty chunks are not emitted, a zero chunk would end the body
        if !chunk.is_empty() {
            out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            out.extend_from_slice(chunk);
            out.extend_from_slice(b"\r\n");
        }
        if finishing {
            out.extend_from_slice(b"0\r\n\r\n");
        }
        *chunk = out;
    }
}
