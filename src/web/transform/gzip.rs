//! Gzip content encoding.

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::httpserver::HttpRequest;
use crate::httputil::HttpHeaders;

use super::OutputTransform;

/// Content types worth compressing.
const CONTENT_TYPES: [&str; 11] = [
    "text/plain",
    "text/html",
    "text/css",
    "text/xml",
    "application/javascript",
    "application/x-javascript",
    "application/xml",
    "application/atom+xml",
    "text/javascript",
    "application/json",
    "application/xhtml+xml",
];

/// Responses shorter than this are not worth the gzip header.
const MIN_LENGTH: usize = 5;

/// Compresses eligible responses for clients that accept gzip.
pub struct GzipTransform {
    gzipping: bool,
    encoder: Option<GzEncoder<Vec<u8>>>,
}

impl GzipTransform {
    pub fn new(request: &HttpRequest) -> Self {
        let accepts = request
            .headers
            .get("Accept-Encoding")
            .map(|v| v.contains("gzip"))
            .unwrap_or(false);
        Self {
            gzipping: accepts && request.supports_http_1_1(),
            encoder: None,
        }
    }
}

impl OutputTransform for GzipTransform {
    fn transform_first_chunk(
        &mut self,
        _status: u16,
        headers: &mut HttpHeaders,
        chunk: &mut Vec<u8>,
        finishing: bool,
    ) {
        // advertise content negotiation whether or not we compress
        match headers.get("Vary") {
            Some(v) => {
                let v = format!("{}, Accept-Encoding", v);
                headers.set("Vary", v);
            }
            None => headers.set("Vary", "Accept-Encoding"),
        }

        if self.gzipping {
            let ctype = headers
                .get("Content-Type")
                .unwrap_or("")
                .split(';')
                .next()
                .unwrap_or("")
                .to_owned();
            self.gzipping = CONTENT_TYPES.contains(&ctype.as_str())
                && (!finishing || chunk.len() >= MIN_LENGTH)
                && (finishing || !headers.contains("Content-Length"))
                && !headers.contains("Content-Encoding");
        }
        if self.gzipping {
            headers.set("Content-Encoding", "gzip");
            self.encoder = Some(GzEncoder::new(Vec::new(), Compression::default()));
            self.transform_chunk(chunk, finishing);
            if headers.contains("Content-Length") {
                headers.set("Content-Length", chunk.len().to_string());
            }
        }
    }

    fn transform_chunk(&mut self, chunk: &mut Vec<u8>, finishing: bool) {
        if !self.gzipping {
            return;
        }
        let encoder = match self.encoder.as_mut() {
            Some(e) => e,
            None => return,
        };
        // writes into a Vec cannot fail
        if encoder.write_all(chunk).is_err() {
            return;
        }
        if finishing {
            // encoder is gone after this, so later calls are no-ops
            match self.encoder.take().map(|e| e.finish()) {
                Some(Ok(buf)) => *chunk = buf,
                _ => chunk.clear(),
            }
        } else {
            if encoder.flush().is_err() {
                return;
            }
            *chunk = std::mem::take(encoder.get_mut());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;

    use flate2::read::GzDecoder;

    fn request(version: &str, accept: Option<&str>) -> HttpRequest {
        let mut headers = HttpHeaders::new();
        if let Some(a) = accept {
            headers.add("Accept-Encoding", a);
        }
        HttpRequest::new(
            "GET".into(),
            "/".into(),
            version.into(),
            headers,
            "1.2.3.4".into(),
            "http".into(),
            false,
        )
    }

    fn html_headers() -> HttpHeaders {
        let mut h = HttpHeaders::new();
        h.set("Content-Type", "text/html; charset=UTF-8");
        h
    }

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn compresses_eligible_response() {
        let mut t = GzipTransform::new(&request("HTTP/1.1", Some("gzip, deflate")));
        let mut headers = html_headers();
        headers.set("Content-Length", "100");
        let mut chunk = vec![b'x'; 100];
        t.transform_first_chunk(200, &mut headers, &mut chunk, true);

        assert_eq!(headers.get("Content-Encoding"), Some("gzip"));
        assert_eq!(headers.get("Vary"), Some("Accept-Encoding"));
        assert_eq!(
            headers.get("Content-Length"),
            Some(chunk.len().to_string().as_str())
        );
        assert_eq!(gunzip(&chunk), vec![b'x'; 100]);
    }

    #[test]
    fn streams_across_flushes() {
        let mut t = GzipTransform::new(&request("HTTP/1.1", Some("gzip")));
        let mut headers = html_headers();
        let mut first = b"hello ".to_vec();
        t.transform_first_chunk(200, &mut headers, &mut first, false);
        let mut second = b"world".to_vec();
        t.transform_chunk(&mut second, true);

        let mut all = first;
        all.extend_from_slice(&second);
        assert_eq!(gunzip(&all), b"hello world");
    }

    #[test]
    fn skips_clients_without_gzip() {
        let mut t = GzipTransform::new(&request("HTTP/1.1", None));
        let mut headers = html_headers();
        let mut chunk = vec![b'x'; 100];
        t.transform_first_chunk(200, &mut headers, &mut chunk, true);
        assert!(!headers.contains("Content-Encoding"));
        assert_eq!(chunk, vec![b'x'; 100]);
        // Vary still advertised
        assert_eq!(headers.get("Vary"), Some("Accept-Encoding"));
    }

    #[test]
    fn skips_http_10() {
        let mut t = GzipTransform::new(&request("HTTP/1.0", Some("gzip")));
        let mut headers = html_headers();
        let mut chunk = vec![b'x'; 100];
        t.transform_first_chunk(200, &mut headers, &mut chunk, true);
        assert!(!headers.contains("Content-Encoding"));
    }

    #[test]
    fn skips_ineligible_content_type() {
        let mut t = GzipTransform::new(&request("HTTP/1.1", Some("gzip")));
        let mut headers = HttpHeaders::new();
        headers.set("Content-Type", "image/png");
        let mut chunk = vec![b'x'; 100];
        t.transform_first_chunk(200, &mut headers, &mut chunk, true);
        assert!(!headers.contains("Content-Encoding"));
    }

    #[test]
    fn skips_tiny_response() {
        let mut t = GzipTransform::new(&request("HTTP/1.1", Some("gzip")));
        let mut headers = html_headers();
        let mut chunk = b"hi".to_vec();
        t.transform_first_chunk(200, &mut headers, &mut chunk, true);
        assert!(!headers.contains("Content-Encoding"));
        assert_eq!(chunk, b"hi");
    }

    #[test]
    fn skips_already_encoded() {
        let mut t = GzipTransform::new(&request("HTTP/1.1", Some("gzip")));
        let mut headers = html_headers();
        headers.set("Content-Encoding", "br");
        let mut chunk = vec![b'x'; 100];
        t.transform_first_chunk(200, &mut headers, &mut chunk, true);
        assert_eq!(headers.get("Content-Encoding"), Some("br"));
    }
}
