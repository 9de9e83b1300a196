//! The request lifecycle state machine.
//!
//! A [`RequestLifecycle`] owns one request from dispatch to the final
//! flush. Output is buffered in the lifecycle, pushed through the
//! transform chain on `flush`, and sealed exactly once by `finish`.
//! A handler may suspend the lifecycle instead of finishing, keeping
//! the connection open until the embedder finishes it later.

use std::sync::Arc;
use std::time::SystemTime;

use sha1::{Digest, Sha1};

use crate::error::{Error, HttpError, LifecycleError};
use crate::escape::{create_signed_value, decode_signed_value};
use crate::httpserver::{HttpConnection, HttpRequest, Transport};
use crate::httputil::{HttpHeaders, format_http_date, reason_phrase};
use crate::settings::Settings;

use super::handler::{Handler, Outcome};
use super::transform::{ChunkedTransform, GzipTransform, OutputTransform};

pub const SUPPORTED_METHODS: [&str; 7] =
    ["GET", "HEAD", "POST", "DELETE", "PATCH", "PUT", "OPTIONS"];

/// Headers describing the entity, stripped from 304 responses.
const ENTITY_HEADERS: [&str; 8] = [
    "Allow",
    "Content-Encoding",
    "Content-Language",
    "Content-Length",
    "Content-MD5",
    "Content-Range",
    "Content-Type",
    "Last-Modified",
];

/// Signed cookies stay valid this long.
const SIGNED_COOKIE_DAYS: u64 = 31;

/// Where a request stands.
///
/// There is no dedicated error state: a failed dispatch is routed
/// through [`RequestLifecycle::send_error`], which renders the error
/// page and finishes, so an errored request ends up `Finished` like
/// any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Preparing,
    Dispatched,
    /// The handler kept the request open; only the embedder can move
    /// it forward now.
    Suspended,
    Finishing,
    Finished,
}

pub struct RequestLifecycle {
    pub request: HttpRequest,
    settings: Arc<Settings>,
    state: LifecycleState,
    status: u16,
    headers: HttpHeaders,
    write_buffer: Vec<u8>,
    headers_written: bool,
    transforms: Vec<Box<dyn OutputTransform>>,
}

impl RequestLifecycle {
    pub fn new(request: HttpRequest, settings: Arc<Settings>) -> Self {
        let mut transforms: Vec<Box<dyn OutputTransform>> = Vec::new();
        if settings.gzip {
            transforms.push(Box::new(GzipTransform::new(&request)));
        }
        transforms.push(Box::new(ChunkedTransform::new(&request)));

        let mut lifecycle = Self {
            request,
            settings,
            state: LifecycleState::Created,
            status: 200,
            headers: HttpHeaders::new(),
            write_buffer: Vec::new(),
            headers_written: false,
            transforms,
        };
        lifecycle.clear();
        lifecycle
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Reset the response to its default headers and empty body.
    pub fn clear(&mut self) {
        let mut headers = HttpHeaders::new();
        headers.set("Server", self.settings.server_name.clone());
        headers.set("Content-Type", "text/html; charset=UTF-8");
        headers.set("Date", format_http_date(SystemTime::now()));
        // an HTTP/1.0 client asking for keep-alive gets the echo that
        // tells it the server agreed
        if !self.request.supports_http_1_1()
            && self
                .request
                .headers
                .get("Connection")
                .map(|v| v.eq_ignore_ascii_case("keep-alive"))
                .unwrap_or(false)
        {
            headers.set("Connection", "Keep-Alive");
        }
        self.headers = headers;
        self.write_buffer.clear();
        self.status = 200;
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn check_header_value(&self, value: &str) -> Result<(), LifecycleError> {
        // reject header injection attempts
        if value.len() > self.settings.max_header_value_len
            || value.bytes().any(|b| b < 0x20)
        {
            return Err(LifecycleError::UnsafeHeaderValue);
        }
        Ok(())
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), LifecycleError> {
        self.check_header_value(value)?;
        self.headers.set(name, value);
        Ok(())
    }

    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), LifecycleError> {
        self.check_header_value(value)?;
        self.headers.add(name, value);
        Ok(())
    }

    pub fn clear_header(&mut self, name: &str) {
        self.headers.remove(name);
    }

    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Last query/form value for `name`, stripped of surrounding
    /// whitespace. Missing without a default is a 400.
    pub fn get_argument(&self, name: &str, default: Option<&str>) -> Result<String, HttpError> {
        match self.request.argument(name) {
            Some(v) => Ok(String::from_utf8_lossy(v).trim().to_owned()),
            None => match default {
                Some(d) => Ok(d.to_owned()),
                None => Err(HttpError::with_log(
                    400,
                    format!("Missing argument {}", name),
                )),
            },
        }
    }

    pub fn get_arguments(&self, name: &str) -> Vec<String> {
        self.request
            .argument_list(name)
            .into_iter()
            .map(|v| String::from_utf8_lossy(v).trim().to_owned())
            .collect()
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) -> Result<(), LifecycleError> {
        self.set_cookie_with(name, value, "/", None, None)
    }

    /// Set a cookie with explicit attributes. `expires` is an absolute
    /// time; `domain` widens the cookie's scope.
    pub fn set_cookie_with(
        &mut self,
        name: &str,
        value: &str,
        path: &str,
        domain: Option<&str>,
        expires: Option<SystemTime>,
    ) -> Result<(), LifecycleError> {
        self.check_header_value(value)?;
        let mut cookie = format!("{}={}", name, value);
        if let Some(d) = domain {
            cookie.push_str("; Domain=");
            cookie.push_str(d);
        }
        if let Some(t) = expires {
            cookie.push_str("; Expires=");
            cookie.push_str(&format_http_date(t));
        }
        if !path.is_empty() {
            cookie.push_str("; Path=");
            cookie.push_str(path);
        }
        self.headers.add("Set-Cookie", cookie);
        Ok(())
    }

    /// Set a cookie signed with the configured secret.
    pub fn set_secure_cookie(&mut self, name: &str, value: &[u8]) -> Result<(), HttpError> {
        let secret = self
            .settings
            .cookie_secret
            .as_deref()
            .ok_or_else(|| HttpError::with_log(500, "cookie_secret is not configured"))?;
        let signed = create_signed_value(secret, name, value, unix_now());
        self.set_cookie(name, &signed)?;
        Ok(())
    }

    /// Read back a cookie set by [`set_secure_cookie`](Self::set_secure_cookie).
    pub fn get_secure_cookie(&self, name: &str) -> Option<Vec<u8>> {
        let secret = self.settings.cookie_secret.as_deref()?;
        let value = self.request.cookie(name)?;
        decode_signed_value(secret, name, &value, unix_now(), SIGNED_COOKIE_DAYS)
    }

    /// The XSRF token for this session, minting one (and its cookie)
    /// if the client has none yet.
    pub fn xsrf_token(&mut self) -> String {
        if let Some(token) = self.request.cookie("_xsrf") {
            return token;
        }
        let raw: [u8; 16] = rand::random();
        let mut token = String::with_capacity(32);
        for b in raw {
            token.push_str(&format!("{:02x}", b));
        }
        self.headers
            .add("Set-Cookie", format!("_xsrf={}; Path=/", token));
        token
    }

    fn check_xsrf_cookie(&self) -> Result<(), HttpError> {
        let token = self
            .request
            .argument("_xsrf")
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .or_else(|| self.request.headers.get("X-Xsrftoken").map(str::to_owned))
            .or_else(|| self.request.headers.get("X-Csrftoken").map(str::to_owned));
        let token = match token {
            Some(t) => t,
            None => {
                return Err(HttpError::with_log(
                    403,
                    "'_xsrf' argument missing from POST",
                ))
            }
        };
        if self.request.cookie("_xsrf").as_deref() != Some(token.as_str()) {
            return Err(HttpError::with_log(
                403,
                "XSRF cookie does not match POST argument",
            ));
        }
        Ok(())
    }

    /// Buffer response bytes. The data goes out on the next flush.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), LifecycleError> {
        if matches!(self.state, LifecycleState::Finished) {
            return Err(LifecycleError::WriteAfterFinish);
        }
        self.write_buffer.extend_from_slice(chunk);
        Ok(())
    }

    fn generate_headers(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(
            format!(
                "{} {} {}\r\n",
                self.request.version,
                self.status,
                reason_phrase(self.status)
            )
            .as_bytes(),
        );
        for (name, value) in self.headers.iter() {
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out
    }

    /// Push buffered output through the transforms and onto the wire.
    /// The first flush also writes the response head.
    pub fn flush<T: Transport>(&mut self, conn: &mut HttpConnection<T>, include_footers: bool) {
        let mut chunk = std::mem::take(&mut self.write_buffer);
        let mut transforms = std::mem::take(&mut self.transforms);

        let header_bytes = if !self.headers_written {
            self.headers_written = true;
            for t in transforms.iter_mut() {
                t.transform_first_chunk(self.status, &mut self.headers, &mut chunk, include_footers);
            }
            self.generate_headers()
        } else {
            for t in transforms.iter_mut() {
                t.transform_chunk(&mut chunk, include_footers);
            }
            Vec::new()
        };
        self.transforms = transforms;

        // HEAD answers with headers only
        if self.request.method == "HEAD" {
            chunk.clear();
        }

        if !header_bytes.is_empty() {
            conn.write(&header_bytes);
        }
        if !chunk.is_empty() {
            conn.write(&chunk);
        }
    }

    /// Seal the response: apply conditional-GET handling, flush the
    /// tail, log the request, and settle keep-alive on the connection.
    ///
    /// Calling this a second time is an error, loudly. Returns the
    /// next pipelined request, if the connection already has one.
    pub fn finish<T: Transport>(
        &mut self,
        conn: &mut HttpConnection<T>,
    ) -> Result<Option<HttpRequest>, Error> {
        if matches!(self.state, LifecycleState::Finished) {
            return Err(LifecycleError::AlreadyFinished.into());
        }
        self.state = LifecycleState::Finishing;

        if !self.headers_written {
            if self.status == 200
                && matches!(self.request.method.as_str(), "GET" | "HEAD")
                && !self.headers.contains("Etag")
            {
                let etag = format!("\"{}\"", sha1_hex(&self.write_buffer));
                let matched = self
                    .request
                    .headers
                    .get("If-None-Match")
                    .map(|inm| inm.contains(&etag))
                    .unwrap_or(false);
                if matched {
                    self.write_buffer.clear();
                    self.status = 304;
                } else {
                    self.headers.set("Etag", etag);
                }
            }
            if self.status == 304 {
                for name in ENTITY_HEADERS {
                    self.headers.remove(name);
                }
                self.write_buffer.clear();
            } else if !self.headers.contains("Content-Length") {
                self.headers
                    .set("Content-Length", self.write_buffer.len().to_string());
            }
        }

        self.flush(conn, true);
        self.log_request();
        self.state = LifecycleState::Finished;
        conn.finish_request(&mut self.request)
    }

    /// Answer with a redirect and finish.
    pub fn redirect<T: Transport>(
        &mut self,
        conn: &mut HttpConnection<T>,
        url: &str,
        permanent: bool,
    ) -> Result<Option<HttpRequest>, Error> {
        if self.headers_written {
            return Err(LifecycleError::HeadersWritten.into());
        }
        self.set_status(if permanent { 301 } else { 302 });
        self.set_header("Location", url).map_err(Error::from)?;
        self.finish(conn)
    }

    /// Replace the pending response with an error page and finish.
    ///
    /// If headers already went out, the response cannot be changed;
    /// the request is finished as-is.
    pub fn send_error<T: Transport, H: Handler + ?Sized>(
        &mut self,
        conn: &mut HttpConnection<T>,
        handler: &mut H,
        status: u16,
        error: Option<&HttpError>,
    ) -> Result<Option<HttpRequest>, Error> {
        if self.headers_written {
            log::error!("cannot send error response after headers written");
            if !matches!(self.state, LifecycleState::Finished) {
                return self.finish(conn);
            }
            return Ok(None);
        }
        self.clear();
        self.set_status(status);
        if let Some(challenge) = error.and_then(HttpError::challenge) {
            self.set_header("WWW-Authenticate", challenge)
                .map_err(Error::from)?;
        }
        handler.write_error(self, status, error);
        self.finish(conn)
    }

    /// Run a handler against this request.
    ///
    /// Unsupported methods and handler errors turn into error pages;
    /// a suspending handler leaves the lifecycle in
    /// [`LifecycleState::Suspended`] with nothing finished.
    pub fn execute<T: Transport, H: Handler>(
        &mut self,
        handler: &mut H,
        conn: &mut HttpConnection<T>,
    ) -> Result<Option<HttpRequest>, Error> {
        self.state = LifecycleState::Preparing;

        if !SUPPORTED_METHODS.contains(&self.request.method.as_str()) {
            return self.dispatch_error(conn, handler, HttpError::new(405));
        }

        if self.settings.xsrf_cookies
            && !matches!(self.request.method.as_str(), "GET" | "HEAD" | "OPTIONS")
        {
            if let Err(e) = self.check_xsrf_cookie() {
                return self.dispatch_error(conn, handler, e);
            }
        }

        if let Err(e) = handler.prepare(self) {
            return self.dispatch_error(conn, handler, e);
        }

        let outcome = match self.request.method.as_str() {
            "GET" => handler.get(self),
            "HEAD" => handler.head(self),
            "POST" => handler.post(self),
            "DELETE" => handler.delete(self),
            "PATCH" => handler.patch(self),
            "PUT" => handler.put(self),
            "OPTIONS" => handler.options(self),
            _ => unreachable!(),
        };

        match outcome {
            Ok(Outcome::Done) => {
                self.state = LifecycleState::Dispatched;
                let next = self.finish(conn)?;
                handler.on_finish();
                Ok(next)
            }
            Ok(Outcome::Suspend) => {
                self.state = LifecycleState::Suspended;
                Ok(None)
            }
            Err(e) => self.dispatch_error(conn, handler, e),
        }
    }

    fn dispatch_error<T: Transport, H: Handler + ?Sized>(
        &mut self,
        conn: &mut HttpConnection<T>,
        handler: &mut H,
        error: HttpError,
    ) -> Result<Option<HttpRequest>, Error> {
        if error.status < 500 {
            log::warn!(
                "{} {} {}: {}",
                error.status,
                self.request.method,
                self.request.uri,
                error
            );
        } else {
            log::error!(
                "{} {} {}: {}",
                error.status,
                self.request.method,
                self.request.uri,
                error
            );
        }
        let next = self.send_error(conn, handler, error.status, Some(&error))?;
        handler.on_finish();
        Ok(next)
    }

    fn log_request(&self) {
        let ms = self.request.request_time().as_secs_f64() * 1000.0;
        let summary = format!(
            "{} {} ({})",
            self.request.method, self.request.uri, self.request.remote_ip
        );
        if self.status < 400 {
            log::info!("{} {} {:.2}ms", self.status, summary, ms);
        } else if self.status < 500 {
            log::warn!("{} {} {:.2}ms", self.status, summary, ms);
        } else {
            log::error!("{} {} {:.2}ms", self.status, summary, ms);
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn sha1_hex(data: &[u8]) -> String {
    let mut sha1 = Sha1::default();
    sha1.update(data);
    let digest = sha1.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for b in digest {
        hex.push_str(&format!("{:02x}", b));
    }
    hex
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn etag_is_quoted_sha1() {
        assert_eq!(
            format!("\"{}\"", sha1_hex(b"hello")),
            "\"aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d\""
        );
    }
}
