#![allow(missing_docs)]
//! Errors

mod parse;
mod frame;
mod handshake;
mod http;
mod lifecycle;

pub use parse::ParseError;
pub use frame::FrameError;
pub use handshake::HandshakeError;
pub use http::HttpError;
pub use lifecycle::LifecycleError;

use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum Error {
    Parse(ParseError),

    Frame(FrameError),

    Handshake(HandshakeError),

    Http(HttpError),

    Lifecycle(LifecycleError),

    Io(std::io::Error),
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self { Error::Parse(e) }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self { Error::Frame(e) }
}

impl From<HandshakeError> for Error {
    fn from(e: HandshakeError) -> Self { Error::Handshake(e) }
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self { Error::Http(e) }
}

impl From<LifecycleError> for Error {
    fn from(e: LifecycleError) -> Self { Error::Lifecycle(e) }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error { Error::Io(e) }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use Error::*;
        match self {
            Parse(e) => write!(f, "Parse error: {}", e),
            Frame(e) => write!(f, "Frame error: {}", e),
            Handshake(e) => write!(f, "Handshake error: {}", e),
            Http(e) => write!(f, "Http error: {}", e),
            Lifecycle(e) => write!(f, "Lifecycle error: {}", e),
            Io(e) => write!(f, "Io error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match self {
            Parse(e) => e.source(),
            Frame(e) => e.source(),
            Handshake(e) => e.source(),
            Http(e) => e.source(),
            Lifecycle(e) => e.source(),
            Io(e) => e.source(),
        }
    }
}
