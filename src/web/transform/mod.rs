//! Output transforms.
//!
//! A transform rewrites outgoing chunks, and on the first chunk may
//! also rewrite the response headers. Transforms are applied in order
//! on every flush; whether one stays active is decided once, when the
//! first chunk goes out.

pub mod chunked;
pub mod gzip;

pub use chunked::ChunkedTransform;
pub use gzip::GzipTransform;

use crate::httputil::HttpHeaders;

pub trait OutputTransform {
    /// Rewrite the first chunk, before headers hit the wire. The
    /// headers may be modified; `finishing` is set when this flush is
    /// also the last one.
    fn transform_first_chunk(
        &mut self,
        status: u16,
        headers: &mut HttpHeaders,
        chunk: &mut Vec<u8>,
        finishing: bool,
    );

    /// Rewrite a subsequent chunk.
    fn transform_chunk(&mut self, chunk: &mut Vec<u8>, finishing: bool);
}
