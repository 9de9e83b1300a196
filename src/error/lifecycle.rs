use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq, Eq)]
pub enum LifecycleError {
    AlreadyFinished,

    WriteAfterFinish,

    HeadersWritten,

    UnsafeHeaderValue,
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use LifecycleError::*;
        match self {
            AlreadyFinished => write!(f, "finish() called twice"),
            WriteAfterFinish => write!(f, "Cannot write() after finish()"),
            HeadersWritten => write!(f, "Headers have already been written"),
            UnsafeHeaderValue => write!(f, "Unsafe header value"),
        }
    }
}

// use default impl
impl std::error::Error for LifecycleError {}
