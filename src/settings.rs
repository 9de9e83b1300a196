//! Server configuration.

/// Knobs shared by the connection layer and the request lifecycle.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Trust `X-Real-Ip` / `X-Forwarded-For` and `X-Scheme` /
    /// `X-Forwarded-Proto` from a fronting proxy.
    pub xheaders: bool,
    /// Close every connection after one request.
    pub no_keep_alive: bool,
    /// Enable the gzip output transform.
    pub gzip: bool,
    /// Render tracebacks in error pages.
    pub debug: bool,
    /// Require an XSRF token on state-changing requests.
    pub xsrf_cookies: bool,
    /// Secret for signed cookies. Signing is unavailable without it.
    pub cookie_secret: Option<String>,
    /// Bodies at least this large spill to a temporary file.
    pub body_spill_threshold: usize,
    /// Longest accepted response header value.
    pub max_header_value_len: usize,
    /// Value of the `Server` response header.
    pub server_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            xheaders: false,
            no_keep_alive: false,
            gzip: false,
            debug: false,
            xsrf_cookies: false,
            cookie_secret: None,
            body_spill_threshold: 100_000,
            max_header_value_len: 4000,
            server_name: concat!("squall/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}
