use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq, Eq)]
pub enum FrameError {
    IllegalOpCode,

    FragmentedControl,

    NotEnoughData,

    IllegalFrameType,

    IllegalCloseSequence,
}

impl Display for FrameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use FrameError::*;
        match self {
            IllegalOpCode => write!(f, "Illegal opcode value"),
            FragmentedControl => write!(f, "Control frame must not be fragmented"),
            NotEnoughData => write!(f, "Not enough data to parse"),
            IllegalFrameType => write!(f, "Illegal frame type byte"),
            IllegalCloseSequence => write!(f, "Illegal close sequence"),
        }
    }
}

// use default impl
impl std::error::Error for FrameError {}
