//! Text payloads.
//!
//! Numbers are whitespace separated.  Doubles use a Fortran exponent: `D`
//! instead of `E`, and for three-digit exponents no letter at all
//! (`0.1-300`).  Strings are 8 characters between single quotes.

use std::borrow::Cow;
use std::io::Write;

use crate::array::{ArrayData, ArrayType};
use crate::block::{block_size_formatted, FormattedBlockSize};
use crate::endian::{encode_char8, CHAR_WIDTH};
use crate::error::{EclError, Result};

// ── Decode ──────────────────────────────────────────────────────────────────

struct Tokens<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn next_word(&mut self) -> Option<&'a [u8]> {
        while self.pos < self.buf.len() && self.buf[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if self.pos == self.buf.len() {
            return None;
        }
        let start = self.pos;
        while self.pos < self.buf.len() && !self.buf[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        Some(&self.buf[start..self.pos])
    }

    /// The 8 characters after the next quote.
    fn next_quoted(&mut self) -> Option<&'a [u8]> {
        let quote = self.buf.get(self.pos..)?.iter().position(|&c| c == b'\'')? + self.pos;
        let start = quote + 1;
        let end   = start + CHAR_WIDTH;
        if end > self.buf.len() {
            return None;
        }
        self.pos = (end + 1).min(self.buf.len());
        Some(&self.buf[start..end])
    }
}

/// Rewrite a Fortran double into something `str::parse` accepts.
pub fn normalize_exponent(token: &str) -> Cow<'_, str> {
    if token.contains(['D', 'd']) {
        return Cow::Owned(token.replace(['D', 'd'], "E"));
    }
    if token.contains(['E', 'e']) {
        return Cow::Borrowed(token);
    }
    match token.get(1..).and_then(|rest| rest.find(['+', '-'])) {
        Some(p) => {
            let p = p + 1;
            Cow::Owned(format!("{}E{}", &token[..p], &token[p..]))
        }
        None => Cow::Borrowed(token),
    }
}

fn parse_f64(name: &str, array_type: ArrayType, token: &str) -> Result<f64> {
    normalize_exponent(token).parse::<f64>().map_err(|_| {
        EclError::format(format!("array '{name}': cannot parse '{token}' as {array_type}"))
    })
}

/// Decode `length` elements from the text region of one array.
pub fn decode(buf: &[u8], name: &str, array_type: ArrayType, length: i64) -> Result<ArrayData> {
    let n   = length.max(0) as usize;
    let cap = n.min(buf.len());
    let mut tokens = Tokens::new(buf);

    let missing = |found: usize| {
        EclError::size(name, array_type, length, format!("text region holds only {found}"))
    };

    macro_rules! collect_words {
        ($parse:expr) => {{
            let mut out = Vec::with_capacity(cap);
            for i in 0..n {
                let word = tokens.next_word().ok_or_else(|| missing(i))?;
                let text = std::str::from_utf8(word).map_err(|_| {
                    EclError::format(format!("array '{name}': non-UTF-8 token"))
                })?;
                out.push($parse(text)?);
            }
            out
        }};
    }

    let data = match array_type {
        ArrayType::Inte => ArrayData::Inte(collect_words!(|t: &str| {
            t.parse::<i32>().map_err(|_| {
                EclError::format(format!("array '{name}': cannot parse '{t}' as {array_type}"))
            })
        })),
        ArrayType::Real => ArrayData::Real(collect_words!(|t: &str| {
            parse_f64(name, array_type, t).map(|v| v as f32)
        })),
        ArrayType::Doub => ArrayData::Doub(collect_words!(|t: &str| {
            parse_f64(name, array_type, t)
        })),
        ArrayType::Logi => ArrayData::Logi(collect_words!(|t: &str| {
            match t.as_bytes()[0] {
                b'T' => Ok(true),
                b'F' => Ok(false),
                _    => Err(EclError::value(name, array_type, format!("could not convert '{t}' to a bool value"))),
            }
        })),
        ArrayType::Char => {
            let mut out = Vec::with_capacity(cap);
            for i in 0..n {
                let field = tokens.next_quoted().ok_or_else(|| missing(i))?;
                out.push(String::from_utf8_lossy(field).trim_end_matches(' ').to_owned());
            }
            ArrayData::Char(out)
        }
        ArrayType::Mess => ArrayData::Mess,
    };
    Ok(data)
}

// ── Encode ──────────────────────────────────────────────────────────────────

/// `0.DDDDDDDDE+XX`
pub fn format_real(v: f32) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    if v == 0.0 {
        return "0.00000000E+00".to_owned();
    }
    let (digits, exp) = split_scientific(&format!("{:.7E}", v.abs()));
    let sign = if v < 0.0 { "-" } else { "" };
    format!("{sign}0.{digits}E{:+03}", exp + 1)
}

/// `0.DDDDDDDDDDDDDDD+XX`, or `0.DDDDDDDDDDDDDD+XXX` past two exponent digits.
pub fn format_doub(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    if v == 0.0 {
        return "0.00000000000000D+00".to_owned();
    }
    let (digits, exp) = split_scientific(&format!("{:.13E}", v.abs()));
    let sign = if v < 0.0 { "-" } else { "" };
    let exp  = exp + 1;
    if exp.abs() < 100 {
        format!("{sign}0.{digits}D{exp:+03}")
    } else {
        format!("{sign}0.{digits}{exp:+04}")
    }
}

/// `"1.2345E-3"` → (`"12345"`, -3)
fn split_scientific(s: &str) -> (String, i32) {
    let (mantissa, exp) = s.split_once('E').unwrap_or((s, "0"));
    let digits = mantissa.chars().filter(char::is_ascii_digit).collect();
    (digits, exp.parse().unwrap_or(0))
}

fn write_cells<W: Write, T>(
    writer: &mut W,
    values: &[T],
    policy: FormattedBlockSize,
    render: impl Fn(&T) -> Result<String>,
) -> Result<()> {
    let width = policy.column_width;
    for block in values.chunks(policy.max_elements) {
        for (i, v) in block.iter().enumerate() {
            write!(writer, "{:>width$}", render(v)?)?;
            if (i + 1) % policy.columns == 0 {
                writer.write_all(b"\n")?;
            }
        }
        if block.len() % policy.columns != 0 {
            writer.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Write the text region of one array (header excluded).
pub fn write_payload<W: Write>(writer: &mut W, data: &ArrayData) -> Result<()> {
    let policy = match block_size_formatted(data.array_type()) {
        Some(p) => p,
        None    => return Ok(()),
    };
    match data {
        ArrayData::Inte(v) => write_cells(writer, v, policy, |x| Ok(x.to_string())),
        ArrayData::Real(v) => write_cells(writer, v, policy, |x| Ok(format_real(*x))),
        ArrayData::Doub(v) => write_cells(writer, v, policy, |x| Ok(format_doub(*x))),
        ArrayData::Logi(v) => write_cells(writer, v, policy, |x| Ok(if *x { "T" } else { "F" }.to_owned())),
        ArrayData::Char(v) => write_cells(writer, v, policy, |x| {
            let field = encode_char8(x).ok_or_else(|| {
                EclError::InvalidInput(format!("string '{x}' is longer than {CHAR_WIDTH} characters"))
            })?;
            Ok(format!("'{}'", String::from_utf8_lossy(&field)))
        }),
        ArrayData::Mess => Ok(()),
    }
}
