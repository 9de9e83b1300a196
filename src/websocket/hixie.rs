//! Legacy (hixie-75/76) frame codec.
//!
//! Frames are sentinel-delimited: `0x00`, payload bytes, `0xFF`. The
//! closing handshake is the inverted pair `0xFF 0x00`. The decoder is
//! a byte-at-a-time state machine, so chunk boundaries cannot confuse
//! it.

use crate::error::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Waiting for the frame type byte.
    WaitForFrameType,
    /// Accumulating payload bytes until the end sentinel.
    InsideFrame,
    /// Frame type was `0xFF`; a `0x00` completes a closing frame.
    WaitForClose,
}

#[derive(Debug, PartialEq, Eq)]
pub enum HixieEvent {
    Message(Vec<u8>),
    /// The peer started the closing handshake.
    Closing,
}

/// Decoder for the sentinel-framed legacy protocol.
#[derive(Debug)]
pub struct HixieCodec {
    state: DecodeState,
    frame: Vec<u8>,
}

impl Default for HixieCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl HixieCodec {
    pub fn new() -> Self {
        Self {
            state: DecodeState::WaitForFrameType,
            frame: Vec::new(),
        }
    }

    /// Feed received bytes, collecting completed frames.
    ///
    /// After a closing frame the rest of the input is discarded.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<HixieEvent>, FrameError> {
        let mut events = Vec::new();
        for &b in data {
            match self.state {
                DecodeState::WaitForFrameType => match b {
                    0x00 => self.state = DecodeState::InsideFrame,
                    0xff => self.state = DecodeState::WaitForClose,
                    _ => return Err(FrameError::IllegalFrameType),
                },
                DecodeState::InsideFrame => {
                    if b == 0xff {
                        events.push(HixieEvent::Message(std::mem::take(&mut self.frame)));
                        self.state = DecodeState::WaitForFrameType;
                    } else {
                        self.frame.push(b);
                    }
                }
                DecodeState::WaitForClose => {
                    if b == 0x00 {
                        events.push(HixieEvent::Closing);
                        return Ok(events);
                    }
                    return Err(FrameError::IllegalCloseSequence);
                }
            }
        }
        Ok(events)
    }
}

/// Wrap a message in the sentinel pair.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    out.push(0x00);
    out.extend_from_slice(payload);
    out.push(0xff);
    out
}

/// The closing handshake bytes.
pub const CLOSE_FRAME: [u8; 2] = [0xff, 0x00];
