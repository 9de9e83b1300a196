//! Escaping and signing helpers.
//!
//! Percent decoding, query string parsing, and the signed-value
//! primitive used for tamper-proof cookies.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

const fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Percent-decode a byte string. Invalid escapes are kept literally.
///
/// With `plus_as_space`, `+` decodes to a space, as in
/// `application/x-www-form-urlencoded` values.
pub fn url_unescape(input: &[u8], plus_as_space: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b == b'%' && i + 2 < input.len() {
            if let (Some(hi), Some(lo)) = (hex_val(input[i + 1]), hex_val(input[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        if b == b'+' && plus_as_space {
            out.push(b' ');
        } else {
            out.push(b);
        }
        i += 1;
    }
    out
}

/// Parse a query string into ordered `(name, value)` pairs.
///
/// Pairs without an `=` are skipped. With `keep_blank_values` unset,
/// pairs whose decoded value is empty are dropped as well.
pub fn parse_qs_bytes(query: &[u8], keep_blank_values: bool) -> Vec<(String, Vec<u8>)> {
    let mut out = Vec::new();
    for pair in query.split(|&b| b == b'&') {
        if pair.is_empty() {
            continue;
        }
        let eq = match pair.iter().position(|&b| b == b'=') {
            Some(i) => i,
            None => continue,
        };
        let value = url_unescape(&pair[eq + 1..], true);
        if value.is_empty() && !keep_blank_values {
            continue;
        }
        let name = url_unescape(&pair[..eq], true);
        out.push((String::from_utf8_lossy(&name).into_owned(), value));
    }
    out
}

/// Compare two byte strings without leaking the mismatch position.
pub fn time_independent_equals(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0_u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

fn signature(secret: &str, parts: &[&[u8]]) -> String {
    // Hmac::new_from_slice only fails on absurd key sizes, which
    // sha1 does not have.
    let mut mac = match Hmac::<Sha1>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => unreachable!(),
    };
    for p in parts {
        mac.update(p);
    }
    let out = mac.finalize().into_bytes();
    let mut hex = String::with_capacity(out.len() * 2);
    for b in out {
        hex.push_str(&format!("{:02x}", b));
    }
    hex
}

/// Sign `value` under `name`, producing `b64(value)|timestamp|signature`.
///
/// `now` is seconds since the epoch.
pub fn create_signed_value(secret: &str, name: &str, value: &[u8], now: u64) -> String {
    let encoded = STANDARD.encode(value);
    let timestamp = now.to_string();
    let sig = signature(
        secret,
        &[name.as_bytes(), encoded.as_bytes(), timestamp.as_bytes()],
    );
    format!("{}|{}|{}", encoded, timestamp, sig)
}

/// Verify and decode a value produced by [`create_signed_value`].
///
/// Returns `None` when the signature does not match, the timestamp is
/// older than `max_age_days`, sits too far in the future, or carries a
/// leading zero (a length-extension dodge on the `|`-joined format).
pub fn decode_signed_value(
    secret: &str,
    name: &str,
    value: &str,
    now: u64,
    max_age_days: u64,
) -> Option<Vec<u8>> {
    let mut parts = value.split('|');
    let encoded = parts.next()?;
    let timestamp = parts.next()?;
    let sig = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let expect = signature(
        secret,
        &[name.as_bytes(), encoded.as_bytes(), timestamp.as_bytes()],
    );
    if !time_independent_equals(expect.as_bytes(), sig.as_bytes()) {
        log::warn!("invalid cookie signature {:?}", value);
        return None;
    }

    let ts: u64 = timestamp.parse().ok()?;
    let max_age = max_age_days * 86400;
    if ts < now.saturating_sub(max_age) {
        log::warn!("expired cookie {:?}", value);
        return None;
    }
    if ts > now + max_age {
        log::warn!("cookie timestamp in future; possible tampering {:?}", value);
        return None;
    }
    if timestamp.starts_with('0') && ts != 0 {
        log::warn!("tampered cookie {:?}", value);
        return None;
    }

    STANDARD.decode(encoded).ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unescape() {
        assert_eq!(url_unescape(b"a%20b", false), b"a b");
        assert_eq!(url_unescape(b"a+b", true), b"a b");
        assert_eq!(url_unescape(b"a+b", false), b"a+b");
        // invalid escapes stay literal
        assert_eq!(url_unescape(b"100%", false), b"100%");
        assert_eq!(url_unescape(b"%zz", false), b"%zz");
    }

    #[test]
    fn query_pairs() {
        let args = parse_qs_bytes(b"a=1&b=&a=2", true);
        assert_eq!(
            args,
            vec![
                ("a".into(), b"1".to_vec()),
                ("b".into(), b"".to_vec()),
                ("a".into(), b"2".to_vec()),
            ]
        );

        let args = parse_qs_bytes(b"a=1&b=&a=2", false);
        assert_eq!(
            args,
            vec![("a".into(), b"1".to_vec()), ("a".into(), b"2".to_vec())]
        );
    }

    #[test]
    fn signed_round_trip() {
        let now = 1_700_000_000;
        let signed = create_signed_value("s3cr3t", "session", b"user42", now);
        assert_eq!(
            decode_signed_value("s3cr3t", "session", &signed, now, 31),
            Some(b"user42".to_vec())
        );
        // wrong secret
        assert_eq!(decode_signed_value("other", "session", &signed, now, 31), None);
        // wrong name
        assert_eq!(decode_signed_value("s3cr3t", "csrf", &signed, now, 31), None);
        // expired
        assert_eq!(
            decode_signed_value("s3cr3t", "session", &signed, now + 32 * 86400, 31),
            None
        );
    }

    #[test]
    fn signed_reject_future_timestamp() {
        let signed = create_signed_value("k", "n", b"v", 10_000_000_000);
        assert_eq!(decode_signed_value("k", "n", &signed, 1_700_000_000, 31), None);
    }

    #[test]
    fn constant_time_compare() {
        assert!(time_independent_equals(b"abc", b"abc"));
        assert!(!time_independent_equals(b"abc", b"abd"));
        assert!(!time_independent_equals(b"abc", b"ab"));
    }
}
