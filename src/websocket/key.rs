//! Handshake key derivation, for both generations of the protocol.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::Md5;
use sha1::{Digest, Sha1};

use crate::error::HandshakeError;

const GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Derive `Sec-WebSocket-Accept` from `Sec-WebSocket-Key`.
#[inline]
pub fn derive_accept_key(sec_key: &[u8]) -> String {
    let mut sha1 = Sha1::default();
    sha1.update(sec_key);
    sha1.update(GUID);
    STANDARD.encode(sha1.finalize())
}

/// Reduce a draft-76 challenge key: the digits, read as one number,
/// divided by the count of spaces.
///
/// A key without spaces, or whose digits overflow, is a protocol
/// violation rather than a crash.
fn key_number(key: &str) -> Result<u32, HandshakeError> {
    let mut digits = 0_u64;
    let mut spaces = 0_u64;
    for c in key.chars() {
        if let Some(d) = c.to_digit(10) {
            digits = digits
                .checked_mul(10)
                .and_then(|n| n.checked_add(d as u64))
                .ok_or(HandshakeError::BadChallengeKey)?;
        } else if c == ' ' {
            spaces += 1;
        }
    }
    if spaces == 0 {
        return Err(HandshakeError::ZeroSpaceKey);
    }
    u32::try_from(digits / spaces).map_err(|_| HandshakeError::BadChallengeKey)
}

/// Compute the draft-76 challenge response: the md5 of both reduced
/// keys (big-endian) and the 8-byte nonce the client sent after its
/// headers.
pub fn hixie76_token(
    key1: &str,
    key2: &str,
    nonce: &[u8; 8],
) -> Result<[u8; 16], HandshakeError> {
    let n1 = key_number(key1)?;
    let n2 = key_number(key2)?;

    let mut md5 = Md5::default();
    md5.update(n1.to_be_bytes());
    md5.update(n2.to_be_bytes());
    md5.update(nonce);
    Ok(md5.finalize().into())
}
