//! The request handler trait.

use crate::error::HttpError;
use crate::httputil::reason_phrase;

use super::lifecycle::RequestLifecycle;

/// What a verb method did with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The response is complete; the lifecycle may auto-finish.
    Done,
    /// The handler keeps the request open. The lifecycle suspends and
    /// the embedder must call `finish` on it later.
    Suspend,
}

fn method_not_allowed() -> Result<Outcome, HttpError> {
    Err(HttpError::new(405))
}

/// Application code for one request.
///
/// Implement the verb methods you support; the rest answer 405. A
/// method returning [`Outcome::Suspend`] opts out of the automatic
/// finish, keeping the connection open for a later reply.
pub trait Handler {
    /// Runs before the verb method. An error here skips dispatch.
    fn prepare(&mut self, _cx: &mut RequestLifecycle) -> Result<(), HttpError> {
        Ok(())
    }

    fn get(&mut self, _cx: &mut RequestLifecycle) -> Result<Outcome, HttpError> {
        method_not_allowed()
    }

    fn head(&mut self, _cx: &mut RequestLifecycle) -> Result<Outcome, HttpError> {
        method_not_allowed()
    }

    fn post(&mut self, _cx: &mut RequestLifecycle) -> Result<Outcome, HttpError> {
        method_not_allowed()
    }

    fn delete(&mut self, _cx: &mut RequestLifecycle) -> Result<Outcome, HttpError> {
        method_not_allowed()
    }

    fn patch(&mut self, _cx: &mut RequestLifecycle) -> Result<Outcome, HttpError> {
        method_not_allowed()
    }

    fn put(&mut self, _cx: &mut RequestLifecycle) -> Result<Outcome, HttpError> {
        method_not_allowed()
    }

    fn options(&mut self, _cx: &mut RequestLifecycle) -> Result<Outcome, HttpError> {
        method_not_allowed()
    }

    /// Render an error page. Overridable; the default writes a small
    /// HTML page, with the error detail appended in debug mode.
    fn write_error(&mut self, cx: &mut RequestLifecycle, status: u16, error: Option<&HttpError>) {
        let detail = if cx.settings().debug {
            error.map(|e| e.to_string())
        } else {
            None
        };
        let body = error_page(status, detail.as_deref());
        // write on a freshly cleared lifecycle cannot fail
        let _ = cx.write(body.as_bytes());
    }

    /// Runs after the response has been finished.
    fn on_finish(&mut self) {}
}

/// The stock error page body.
pub fn error_page(status: u16, detail: Option<&str>) -> String {
    let reason = reason_phrase(status);
    match detail {
        Some(d) => format!(
            "<html><title>{s}: {r}</title><body>{s}: {r}<pre>{d}</pre></body></html>",
            s = status,
            r = reason,
            d = d
        ),
        None => format!(
            "<html><title>{s}: {r}</title><body>{s}: {r}</body></html>",
            s = status,
            r = reason
        ),
    }
}
