use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    MalformedStartLine,

    MalformedVersion,

    MalformedHeaderLine,

    BadContentLength,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use ParseError::*;
        match self {
            MalformedStartLine => write!(f, "Malformed request start line"),
            MalformedVersion => write!(f, "Malformed HTTP version"),
            MalformedHeaderLine => write!(f, "Malformed header line"),
            BadContentLength => write!(f, "Content-Length is not a number"),
        }
    }
}

// use default impl
impl std::error::Error for ParseError {}
