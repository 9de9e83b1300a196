use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq, Eq)]
pub enum HandshakeError {
    NotAnUpgrade,

    UnsupportedVersion,

    MissingSecKey,

    ZeroSpaceKey,

    BadChallengeKey,
}

impl Display for HandshakeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use HandshakeError::*;
        match self {
            NotAnUpgrade => write!(f, "Can \"Upgrade\" only to \"WebSocket\""),
            UnsupportedVersion => write!(f, "Unsupported websocket version"),
            MissingSecKey => write!(f, "Sec-WebSocket-Key header is missing"),
            ZeroSpaceKey => write!(f, "Challenge key contains no spaces"),
            BadChallengeKey => write!(f, "Challenge key is out of range"),
        }
    }
}

// use default impl
impl std::error::Error for HandshakeError {}
