//! Primitive codec for payload elements.
//!
//! # Endianness
//! Everything on disk is big-endian.  Element words go through
//! `byteorder::BigEndian`, so the host order never matters.  The `flip_*`
//! functions are pure byte reversals for callers holding words that were
//! read in the opposite order.
//!
//! # Logicals
//! A LOGI element is a 32-bit word that must be exactly [`TRUE_VALUE`] or
//! [`FALSE_VALUE`].  Anything else is rejected by [`decode_logical`].

use byteorder::{BigEndian, ByteOrder};

/// On-disk word for `true`.
pub const TRUE_VALUE:  u32 = 0xFFFF_FFFF;
/// On-disk word for `false`.
pub const FALSE_VALUE: u32 = 0x0000_0000;

/// Width of a CHAR element in bytes.
pub const CHAR_WIDTH: usize = 8;

pub fn flip_i32(v: i32) -> i32 {
    v.swap_bytes()
}

pub fn flip_i64(v: i64) -> i64 {
    v.swap_bytes()
}

pub fn flip_f32(v: f32) -> f32 {
    f32::from_bits(v.to_bits().swap_bytes())
}

pub fn flip_f64(v: f64) -> f64 {
    f64::from_bits(v.to_bits().swap_bytes())
}

// ── Decode (disk → host) ────────────────────────────────────────────────────

pub fn decode_i32(b: &[u8]) -> i32 {
    BigEndian::read_i32(b)
}

pub fn decode_f32(b: &[u8]) -> f32 {
    BigEndian::read_f32(b)
}

pub fn decode_f64(b: &[u8]) -> f64 {
    BigEndian::read_f64(b)
}

/// `None` when the word is neither sentinel.
pub fn decode_logical(b: &[u8]) -> Option<bool> {
    match decode_i32(b) as u32 {
        TRUE_VALUE  => Some(true),
        FALSE_VALUE => Some(false),
        _           => None,
    }
}

/// An all-blank field is the empty string; otherwise trailing blanks go.
pub fn decode_char8(b: &[u8]) -> String {
    let field = &b[..CHAR_WIDTH];
    String::from_utf8_lossy(field).trim_end_matches(' ').to_owned()
}

// ── Encode (host → disk) ────────────────────────────────────────────────────

pub fn encode_i32(v: i32) -> [u8; 4] {
    let mut out = [0u8; 4];
    BigEndian::write_i32(&mut out, v);
    out
}

pub fn encode_f32(v: f32) -> [u8; 4] {
    let mut out = [0u8; 4];
    BigEndian::write_f32(&mut out, v);
    out
}

pub fn encode_f64(v: f64) -> [u8; 8] {
    let mut out = [0u8; 8];
    BigEndian::write_f64(&mut out, v);
    out
}

pub fn encode_logical(v: bool) -> [u8; 4] {
    let word = if v { TRUE_VALUE } else { FALSE_VALUE };
    encode_i32(word as i32)
}

/// Blank-pads to eight bytes.  Returns `None` when `s` is longer than that.
pub fn encode_char8(s: &str) -> Option<[u8; CHAR_WIDTH]> {
    let bytes = s.as_bytes();
    if bytes.len() > CHAR_WIDTH {
        return None;
    }
    let mut out = [b' '; CHAR_WIDTH];
    out[..bytes.len()].copy_from_slice(bytes);
    Some(out)
}
