use std::fmt::{Display, Formatter};

use super::LifecycleError;

/// An error which maps directly to an HTTP status code.
///
/// Handlers return this to abort a request; the lifecycle renders
/// a matching error page. `log_message` only goes to the log, never
/// to the client.
#[derive(Debug)]
pub struct HttpError {
    pub status: u16,
    pub log_message: Option<String>,
    challenge: Option<String>,
}

impl HttpError {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            log_message: None,
            challenge: None,
        }
    }

    pub fn with_log(status: u16, log_message: impl Into<String>) -> Self {
        Self {
            status,
            log_message: Some(log_message.into()),
            challenge: None,
        }
    }

    /// A 401 demanding credentials. The error page carries a
    /// `WWW-Authenticate: <auth_type> realm="<realm>"` challenge.
    pub fn authentication_required(auth_type: &str, realm: &str) -> Self {
        Self {
            status: 401,
            log_message: None,
            challenge: Some(format!("{} realm=\"{}\"", auth_type, realm)),
        }
    }

    /// The `WWW-Authenticate` value to send along, if any.
    pub fn challenge(&self) -> Option<&str> {
        self.challenge.as_deref()
    }
}

impl From<LifecycleError> for HttpError {
    fn from(e: LifecycleError) -> Self {
        HttpError::with_log(500, e.to_string())
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.log_message {
            Some(m) => write!(f, "HTTP {}: {}", self.status, m),
            None => write!(f, "HTTP {}", self.status),
        }
    }
}

// use default impl
impl std::error::Error for HttpError {}
