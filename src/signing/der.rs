//! Minimal DER writer
//!
//! Covers the handful of ASN.1 constructs needed by the CMS envelope.

use chrono::{DateTime, Datelike, Utc};

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OID: u8 = 0x06;
pub const TAG_UTC_TIME: u8 = 0x17;
pub const TAG_GENERALIZED_TIME: u8 = 0x18;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;

/// Context-specific constructed tag `[n]`
pub const fn context(n: u8) -> u8 {
    0xA0 | n
}

/// Encode a tag-length-value triple
pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 6);
    out.push(tag);
    push_length(content.len(), &mut out);
    out.extend_from_slice(content);
    out
}

fn push_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

pub fn sequence(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(TAG_SEQUENCE, &parts.concat())
}

/// Concatenate element encodings in DER `SET OF` order
pub fn sorted_concat(mut parts: Vec<Vec<u8>>) -> Vec<u8> {
    parts.sort();
    parts.concat()
}

pub fn set_of(parts: Vec<Vec<u8>>) -> Vec<u8> {
    tlv(TAG_SET, &sorted_concat(parts))
}

/// `[n] EXPLICIT` wrapper around an already encoded value
pub fn explicit(n: u8, inner: &[u8]) -> Vec<u8> {
    tlv(context(n), inner)
}

pub fn null() -> Vec<u8> {
    vec![TAG_NULL, 0x00]
}

pub fn octet_string(bytes: &[u8]) -> Vec<u8> {
    tlv(TAG_OCTET_STRING, bytes)
}

/// Non-negative INTEGER from big-endian magnitude bytes
pub fn unsigned_integer(magnitude: &[u8]) -> Vec<u8> {
    let skip = magnitude.iter().take_while(|b| **b == 0).count();
    let trimmed = &magnitude[skip..];

    let mut content = Vec::with_capacity(trimmed.len() + 1);
    if trimmed.first().map_or(true, |b| b & 0x80 != 0) {
        content.push(0x00);
    }
    content.extend_from_slice(trimmed);
    tlv(TAG_INTEGER, &content)
}

pub fn small_integer(value: u8) -> Vec<u8> {
    unsigned_integer(&[value])
}

/// OBJECT IDENTIFIER from its arcs; the first two arcs must be present
pub fn oid(arcs: &[u64]) -> Vec<u8> {
    let mut content = Vec::new();
    if let [first, second, rest @ ..] = arcs {
        push_base128(first * 40 + second, &mut content);
        for arc in rest {
            push_base128(*arc, &mut content);
        }
    }
    tlv(TAG_OID, &content)
}

fn push_base128(mut value: u64, out: &mut Vec<u8>) {
    let mut groups = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value > 0 {
        groups.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    groups.reverse();
    out.extend_from_slice(&groups);
}

/// X.509 `Time`: UTCTime for 1950 through 2049, GeneralizedTime otherwise
pub fn time(at: DateTime<Utc>) -> Vec<u8> {
    if (1950..2050).contains(&at.year()) {
        tlv(TAG_UTC_TIME, at.format("%y%m%d%H%M%SZ").to_string().as_bytes())
    } else {
        tlv(TAG_GENERALIZED_TIME, at.format("%Y%m%d%H%M%SZ").to_string().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_short_and_long_lengths() {
        assert_eq!(tlv(TAG_OCTET_STRING, &[1, 2]), vec![0x04, 0x02, 1, 2]);

        let long = tlv(TAG_OCTET_STRING, &[0u8; 200]);
        assert_eq!(&long[..3], &[0x04, 0x81, 200]);
        assert_eq!(long.len(), 203);

        let longer = tlv(TAG_OCTET_STRING, &vec![0u8; 300]);
        assert_eq!(&longer[..4], &[0x04, 0x82, 0x01, 0x2C]);
    }

    #[test]
    fn test_oid_encoding() {
        assert_eq!(
            oid(&[1, 2, 840, 113549, 1, 7, 2]),
            vec![0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x02]
        );
        assert_eq!(
            oid(&[1, 3, 14, 3, 2, 26]),
            vec![0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x1A]
        );
    }

    #[test]
    fn test_integer_encoding() {
        assert_eq!(small_integer(1), vec![0x02, 0x01, 0x01]);
        assert_eq!(unsigned_integer(&[]), vec![0x02, 0x01, 0x00]);
        assert_eq!(unsigned_integer(&[0x00, 0x80]), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(unsigned_integer(&[0x10, 0x92]), vec![0x02, 0x02, 0x10, 0x92]);
    }

    #[test]
    fn test_set_of_is_sorted() {
        let set = set_of(vec![vec![0x05, 0x00], vec![0x02, 0x01, 0x01]]);
        assert_eq!(set, vec![0x31, 0x05, 0x02, 0x01, 0x01, 0x05, 0x00]);
    }

    #[test]
    fn test_utc_time() {
        let at = Utc.with_ymd_and_hms(2025, 4, 10, 8, 30, 5).unwrap();
        assert_eq!(time(at), tlv(TAG_UTC_TIME, b"250410083005Z"));

        let last = Utc.with_ymd_and_hms(2049, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(time(last), tlv(TAG_UTC_TIME, b"491231235959Z"));
    }

    #[test]
    fn test_generalized_time_outside_utc_range() {
        let at = Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(time(at), tlv(TAG_GENERALIZED_TIME, b"20500101000000Z"));

        let early = Utc.with_ymd_and_hms(1949, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(time(early), tlv(TAG_GENERALIZED_TIME, b"19490601120000Z"));
    }
}
