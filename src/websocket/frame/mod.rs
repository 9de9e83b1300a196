//! Websocket data frames.
//!
//! [RFC-6455 Section5](https://datatracker.ietf.org/doc/html/rfc6455#section-5)
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! :                     Payload Data continued ...                :
//! + - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - +
//! |                     Payload Data continued ...                |
//! +---------------------------------------------------------------+
//! ```

pub mod flag;
pub mod length;
pub mod mask;

pub use flag::{Fin, OpCode};
pub use length::PayloadLen;
pub use mask::Mask;

use crate::error::FrameError;

/// Websocket frame head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHead {
    pub fin: Fin,
    pub opcode: OpCode,
    pub mask: Mask,
    pub length: PayloadLen,
}

impl FrameHead {
    /// Constructor.
    #[inline]
    pub const fn new(fin: Fin, opcode: OpCode, mask: Mask, length: PayloadLen) -> Self {
        Self {
            fin,
            opcode,
            mask,
            length,
        }
    }

    /// Append the encoded head to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        // fin, opcode
        let b1 = self.fin as u8 | self.opcode as u8;
        // mask, payload length
        let b2 = self.mask.to_flag() | self.length.to_flag();
        buf.push(b1);
        buf.push(b2);

        // extended payload length
        match &self.length {
            PayloadLen::Standard(_) => {}
            PayloadLen::Extended1(v) => buf.extend_from_slice(&v.to_be_bytes()),
            PayloadLen::Extended2(v) => buf.extend_from_slice(&v.to_be_bytes()),
        };

        // mask key
        match &self.mask {
            Mask::Key(k) => buf.extend_from_slice(k),
            Mask::Skip => buf.extend_from_slice(&[0_u8; 4]),
            Mask::None => {}
        };
    }

    /// Parse from provided buffer, returns [`FrameHead`] and the count
    /// of read bytes if the parse succeeds.
    /// If there is not enough data to parse, a
    /// [`FrameError::NotEnoughData`] error will be returned.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), FrameError> {
        if buf.len() < 2 {
            return Err(FrameError::NotEnoughData);
        }

        let mut n: usize = 2;

        let b1 = buf[0];
        let b2 = buf[1];

        let fin = Fin::from_flag(b1);
        let opcode = OpCode::from_flag(b1)?;

        let mut mask = Mask::from_flag(b2);
        let mut length = PayloadLen::from_flag(b2);

        match length {
            PayloadLen::Standard(_) => {}
            PayloadLen::Extended1(_) => {
                if buf.len() < n + 2 {
                    return Err(FrameError::NotEnoughData);
                }
                let mut raw = [0_u8; 2];
                raw.copy_from_slice(&buf[n..n + 2]);
                length = PayloadLen::from_byte2(raw);
                n += 2;
            }
            PayloadLen::Extended2(_) => {
                if buf.len() < n + 8 {
                    return Err(FrameError::NotEnoughData);
                }
                let mut raw = [0_u8; 8];
                raw.copy_from_slice(&buf[n..n + 8]);
                length = PayloadLen::from_byte8(raw);
                n += 8;
            }
        };

        if !matches!(mask, Mask::None) {
            if buf.len() < n + 4 {
                return Err(FrameError::NotEnoughData);
            }
            let mut key = [0_u8; 4];
            key.copy_from_slice(&buf[n..n + 4]);
            mask = if key.iter().all(|&b| b == 0) {
                Mask::Skip
            } else {
                Mask::Key(key)
            };
            n += 4;
        }

        Ok((
            FrameHead {
                fin,
                opcode,
                mask,
                length,
            },
            n,
        ))
    }
}

/// Something a fed-in frame asks of the connection.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameEvent {
    /// A complete (possibly reassembled) message.
    Message(Vec<u8>),
    /// A ping, to be answered with a pong carrying the same payload.
    Ping(Vec<u8>),
    /// A close, to be answered with a close echo.
    Close(Vec<u8>),
}

/// Server-side frame codec.
///
/// Input may arrive in arbitrary slices: a frame that is not complete
/// yet, head included, stays buffered untouched until more data
/// arrives. Payload length is validated against the buffered bytes
/// before anything is copied out. Fragments accumulate until a frame
/// with the fin bit closes the message.
#[derive(Debug, Default)]
pub struct FrameCodec {
    buf: Vec<u8>,
    message: Vec<u8>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes, collecting the events of every frame that
    /// completed.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<FrameEvent>, FrameError> {
        self.buf.extend_from_slice(data);
        let mut events = Vec::new();

        loop {
            let (head, head_len) = match FrameHead::decode(&self.buf) {
                Ok(v) => v,
                Err(FrameError::NotEnoughData) => break,
                Err(e) => return Err(e),
            };
            let payload_len = head.length.to_num() as usize;
            if self.buf.len() - head_len < payload_len {
                break;
            }

            let mut payload = self.buf[head_len..head_len + payload_len].to_vec();
            self.buf.drain(..head_len + payload_len);
            if let Mask::Key(key) = head.mask {
                mask::apply_mask(key, &mut payload);
            }

            // control frames may arrive between fragments and must not
            // touch the message buffer
            if head.opcode.is_control() {
                if matches!(head.fin, Fin::N) {
                    return Err(FrameError::FragmentedControl);
                }
                match head.opcode {
                    OpCode::Close => events.push(FrameEvent::Close(payload)),
                    OpCode::Ping => events.push(FrameEvent::Ping(payload)),
                    _ => {}
                }
                continue;
            }

            self.message.extend_from_slice(&payload);

            if matches!(head.fin, Fin::Y) {
                events.push(FrameEvent::Message(std::mem::take(&mut self.message)));
            }
        }

        Ok(events)
    }

    /// Bytes waiting for the rest of their frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Encode a complete unmasked frame, as servers send them.
pub fn encode_frame(opcode: OpCode, payload: &[u8]) -> Vec<u8> {
    let head = FrameHead::new(
        Fin::Y,
        opcode,
        Mask::None,
        PayloadLen::from_num(payload.len() as u64),
    );
    let mut out = Vec::with_capacity(payload.len() + 10);
    head.encode(&mut out);
    out.extend_from_slice(payload);
    out
}
