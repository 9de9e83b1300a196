//! The parsed request model.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use crate::escape::parse_qs_bytes;
use crate::httputil::{HttpFile, HttpHeaders};

/// A single HTTP request, as handed to the embedder once headers (and
/// body, if any) have been read off the wire.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,

    /// Peer address, possibly overridden by proxy headers.
    pub remote_ip: String,
    /// `"http"` or `"https"`, possibly overridden by proxy headers.
    pub protocol: String,
    pub host: String,

    pub path: String,
    pub query: String,

    /// Query string arguments, later merged with form bodies.
    /// Ordered; repeated names keep every value.
    pub arguments: Vec<(String, Vec<u8>)>,
    pub files: Vec<(String, HttpFile)>,

    start_time: Instant,
    finish_time: Option<Instant>,
}

impl HttpRequest {
    /// Build a request from a parsed head.
    ///
    /// `remote_ip` and `protocol` describe the physical connection.
    /// With `xheaders`, a proxy may override them: `X-Real-Ip` (then
    /// `X-Forwarded-For`) replaces the address when it parses as an IP,
    /// and `X-Scheme` (then `X-Forwarded-Proto`) replaces the scheme
    /// when it is exactly `http` or `https`. Invalid values fall back
    /// to the physical ones.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        method: String,
        uri: String,
        version: String,
        headers: HttpHeaders,
        remote_ip: String,
        protocol: String,
        xheaders: bool,
    ) -> Self {
        let (remote_ip, protocol) = if xheaders {
            let ip = headers
                .get("X-Real-Ip")
                .or_else(|| headers.get("X-Forwarded-For"))
                .filter(|v| v.parse::<IpAddr>().is_ok())
                .map(str::to_owned)
                .unwrap_or(remote_ip);
            let proto = headers
                .get("X-Scheme")
                .or_else(|| headers.get("X-Forwarded-Proto"))
                .filter(|v| *v == "http" || *v == "https")
                .map(str::to_owned)
                .unwrap_or(protocol);
            (ip, proto)
        } else {
            (remote_ip, protocol)
        };

        let host = headers
            .get("Host")
            .unwrap_or("127.0.0.1")
            .to_owned();

        let (path, query) = match uri.split_once('?') {
            Some((p, q)) => (p.to_owned(), q.to_owned()),
            None => (uri.clone(), String::new()),
        };
        let arguments = parse_qs_bytes(query.as_bytes(), true);

        Self {
            method,
            uri,
            version,
            headers,
            body: Vec::new(),
            remote_ip,
            protocol,
            host,
            path,
            query,
            arguments,
            files: Vec::new(),
            start_time: Instant::now(),
            finish_time: None,
        }
    }

    pub fn supports_http_1_1(&self) -> bool {
        self.version == "HTTP/1.1"
    }

    pub fn full_url(&self) -> String {
        format!("{}://{}{}", self.protocol, self.host, self.uri)
    }

    /// Mark the request finished. Called by the connection.
    pub fn record_finish(&mut self) {
        self.finish_time = Some(Instant::now());
    }

    /// Elapsed time so far, or total time once finished.
    pub fn request_time(&self) -> Duration {
        match self.finish_time {
            Some(t) => t - self.start_time,
            None => self.start_time.elapsed(),
        }
    }

    /// Last value for `name`, if present.
    pub fn argument(&self, name: &str) -> Option<&[u8]> {
        self.arguments
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Every value for `name`, in order of appearance.
    pub fn argument_list(&self, name: &str) -> Vec<&[u8]> {
        self.arguments
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
            .collect()
    }

    /// Cookies from the `Cookie` header. Unparsable pairs are skipped.
    pub fn cookies(&self) -> Vec<(String, String)> {
        let header = match self.headers.get("Cookie") {
            Some(h) => h,
            None => return Vec::new(),
        };
        header
            .split(';')
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=')?;
                Some((k.trim().to_owned(), v.trim().trim_matches('"').to_owned()))
            })
            .collect()
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}
