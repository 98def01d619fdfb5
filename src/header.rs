//! Array headers, binary and formatted.
//!
//! ```text
//! binary:     [i32 16][8-byte name][i32 count][4-byte tag][i32 16]
//! formatted:  " 'NAME    '        COUNT 'TYPE'\n"
//! ```
//!
//! # X231
//! Counts above `i32::MAX` are split over two consecutive headers.  The
//! first carries tag `X231` and a negative count whose magnitude `m` counts
//! units of 2^31; the second repeats the name and carries the real tag and the
//! remainder `r`.  The array length is `r + m * 2^31`.

use std::io::{BufRead, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::array::ArrayType;
use crate::error::{EclError, Result};

/// Byte length of the header record between its two markers.
pub const HEADER_DATA_BYTES: i32 = 16;
/// Full binary header including both markers.
pub const BINARY_HEADER_SIZE: u64 = 24;
/// Width of the name field.
pub const NAME_WIDTH: usize = 8;

const X231_TAG: &[u8; 4] = b"X231";
const X231_UNIT: i64 = 1 << 31;

/// Letters that open the extension of a formatted file (`.FEGRID`, `.A0001`…).
const FORMATTED_EXT_LETTERS: &[u8] = b"ABCFGH";

// ── FileFormat ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Unformatted, big-endian, block framed.
    Binary,
    /// Line-oriented text.
    Formatted,
}

impl FileFormat {
    /// Decide from the first letter of the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| EclError::InvalidFileName(path.display().to_string()))?;

        if FORMATTED_EXT_LETTERS.contains(&ext.as_bytes()[0]) {
            Ok(FileFormat::Formatted)
        } else {
            Ok(FileFormat::Binary)
        }
    }

    pub fn is_formatted(self) -> bool {
        self == FileFormat::Formatted
    }
}

// ── Header types ────────────────────────────────────────────────────────────

/// One header record exactly as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawHeader {
    name:  String,
    count: i64,
    tag:   [u8; 4],
}

/// A resolved header: X231 pairs collapsed, name trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayHeader {
    pub name:       String,
    pub array_type: ArrayType,
    pub length:     i64,
}

// ── Reading ─────────────────────────────────────────────────────────────────

/// Read the next header.  `Ok(None)` means a clean end of file.
pub fn read_header<R: BufRead>(reader: &mut R, format: FileFormat) -> Result<Option<ArrayHeader>> {
    let first = match read_raw(reader, format)? {
        Some(h) => h,
        None    => return Ok(None),
    };

    if &first.tag != X231_TAG {
        return resolve(first.name, first.count, &first.tag).map(Some);
    }

    if first.count >= 0 {
        return Err(EclError::format(format!(
            "invalid X231 header for '{}': count should be negative, found {}",
            first.name.trim_end(),
            first.count
        )));
    }
    let multiplier = -first.count;

    let second = read_raw(reader, format)?.ok_or_else(|| {
        EclError::format(format!(
            "X231 header for '{}' is not followed by a second header",
            first.name.trim_end()
        ))
    })?;
    if second.name != first.name {
        return Err(EclError::format(format!(
            "invalid X231 header pair: name '{}' in first header, '{}' in second",
            first.name.trim_end(),
            second.name.trim_end()
        )));
    }
    if second.count < 0 {
        return Err(EclError::format(format!(
            "invalid X231 header for '{}': negative remainder {}",
            first.name.trim_end(),
            second.count
        )));
    }

    let length = multiplier
        .checked_mul(X231_UNIT)
        .and_then(|v| v.checked_add(second.count))
        .ok_or_else(|| EclError::format(format!(
            "X231 length of '{}' overflows 64 bits",
            first.name.trim_end()
        )))?;

    resolve(second.name, length, &second.tag).map(Some)
}

fn resolve(name: String, length: i64, tag: &[u8; 4]) -> Result<ArrayHeader> {
    let array_type = ArrayType::from_tag(tag).ok_or_else(|| {
        EclError::format(format!(
            "unknown array type '{}' for '{}'",
            String::from_utf8_lossy(tag),
            name.trim_end()
        ))
    })?;
    if length < 0 {
        return Err(EclError::format(format!(
            "negative element count {length} for '{}'",
            name.trim_end()
        )));
    }
    Ok(ArrayHeader {
        name: name.trim_end().to_owned(),
        array_type,
        length,
    })
}

fn read_raw<R: BufRead>(reader: &mut R, format: FileFormat) -> Result<Option<RawHeader>> {
    match format {
        FileFormat::Binary    => read_binary_raw(reader),
        FileFormat::Formatted => read_formatted_raw(reader),
    }
}

fn read_binary_raw<R: Read>(reader: &mut R) -> Result<Option<RawHeader>> {
    let mut lead = [0u8; 4];
    let mut got  = 0;
    while got < lead.len() {
        match reader.read(&mut lead[got..])? {
            0 => break,
            n => got += n,
        }
    }
    if got == 0 {
        return Ok(None);
    }
    if got < lead.len() {
        return Err(EclError::format(format!(
            "truncated header: {got} trailing bytes at end of file"
        )));
    }

    let head = i32::from_be_bytes(lead);
    if head != HEADER_DATA_BYTES {
        return Err(EclError::format(format!(
            "expected {HEADER_DATA_BYTES} bytes of header data, found {head}"
        )));
    }

    let mut name = [0u8; NAME_WIDTH];
    reader.read_exact(&mut name)?;
    let count = reader.read_i32::<BigEndian>()?;
    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag)?;

    let tail = reader.read_i32::<BigEndian>()?;
    if tail != HEADER_DATA_BYTES {
        return Err(EclError::format(format!(
            "expected {HEADER_DATA_BYTES} bytes of header data in trailing marker, found {tail}"
        )));
    }

    Ok(Some(RawHeader {
        name:  String::from_utf8_lossy(&name).into_owned(),
        count: i64::from(count),
        tag,
    }))
}

/// Consume whole blank lines so the reader sits at the start of the next
/// text line.  Returns the number of bytes skipped.
pub fn skip_blank_lines<R: BufRead>(reader: &mut R) -> Result<u64> {
    let mut skipped = 0u64;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(skipped);
        }
        let text_at = buf.iter().position(|c| !c.is_ascii_whitespace());
        let scope   = &buf[..text_at.unwrap_or(buf.len())];
        let n = match scope.iter().rposition(|&c| c == b'\n') {
            Some(nl)                 => nl + 1,
            None if text_at.is_none() => buf.len(),
            None                     => 0,
        };
        reader.consume(n);
        skipped += n as u64;
        if text_at.is_some() {
            return Ok(skipped);
        }
    }
}

fn read_formatted_raw<R: BufRead>(reader: &mut R) -> Result<Option<RawHeader>> {
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        if !line.iter().all(u8::is_ascii_whitespace) {
            break;
        }
    }

    let quotes: Vec<usize> = line
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c == b'\'')
        .map(|(i, _)| i)
        .take(4)
        .collect();
    if quotes.len() < 4 {
        return Err(EclError::format(format!(
            "header name and type should be enclosed with ': {}",
            String::from_utf8_lossy(&line).trim_end()
        )));
    }

    let name  = &line[quotes[0] + 1..quotes[1]];
    let count = &line[quotes[1] + 1..quotes[2]];
    let tag   = &line[quotes[2] + 1..quotes[3]];

    if name.len() != NAME_WIDTH {
        return Err(EclError::format(format!(
            "header name should be {NAME_WIDTH} characters: '{}'",
            String::from_utf8_lossy(name)
        )));
    }
    let count_str = String::from_utf8_lossy(count);
    let count: i64 = count_str.trim().parse().map_err(|_| {
        EclError::format(format!(
            "invalid element count '{}' in header of '{}'",
            count_str.trim(),
            String::from_utf8_lossy(name).trim_end()
        ))
    })?;
    let tag: [u8; 4] = tag.try_into().map_err(|_| {
        EclError::format(format!(
            "array type should be 4 characters: '{}'",
            String::from_utf8_lossy(tag)
        ))
    })?;

    Ok(Some(RawHeader {
        name: String::from_utf8_lossy(name).into_owned(),
        count,
        tag,
    }))
}

// ── Writing ─────────────────────────────────────────────────────────────────

fn padded_name(name: &str) -> Result<[u8; NAME_WIDTH]> {
    let bytes = name.as_bytes();
    if bytes.len() > NAME_WIDTH {
        return Err(EclError::InvalidInput(format!(
            "array name '{name}' is longer than {NAME_WIDTH} characters"
        )));
    }
    let mut out = [b' '; NAME_WIDTH];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

fn write_binary_raw<W: Write>(writer: &mut W, name: &[u8; NAME_WIDTH], count: i32, tag: &[u8]) -> Result<()> {
    writer.write_i32::<BigEndian>(HEADER_DATA_BYTES)?;
    writer.write_all(name)?;
    writer.write_i32::<BigEndian>(count)?;
    writer.write_all(tag)?;
    writer.write_i32::<BigEndian>(HEADER_DATA_BYTES)?;
    Ok(())
}

/// Write one header.  Binary arrays longer than `i32::MAX` get an X231 pair.
pub fn write_header<W: Write>(
    writer:     &mut W,
    format:     FileFormat,
    name:       &str,
    array_type: ArrayType,
    length:     i64,
) -> Result<()> {
    if length < 0 {
        return Err(EclError::InvalidInput(format!(
            "negative length {length} for '{name}'"
        )));
    }
    let padded = padded_name(name)?;

    match format {
        FileFormat::Binary => {
            let tag = array_type.tag().as_bytes();
            if length > i64::from(i32::MAX) {
                let multiplier = length / X231_UNIT;
                let remainder  = length % X231_UNIT;
                let neg = i32::try_from(-multiplier).map_err(|_| {
                    EclError::InvalidInput(format!("length {length} of '{name}' too large"))
                })?;
                write_binary_raw(writer, &padded, neg, X231_TAG)?;
                write_binary_raw(writer, &padded, remainder as i32, tag)
            } else {
                write_binary_raw(writer, &padded, length as i32, tag)
            }
        }
        FileFormat::Formatted => {
            writeln!(
                writer,
                " '{}' {:>11} '{}'",
                String::from_utf8_lossy(&padded),
                length,
                array_type.tag()
            )?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn raw_binary(name: &str, count: i32, tag: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        write_binary_raw(&mut buf, &padded_name(name).unwrap(), count, tag).unwrap();
        buf
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("CASE.FEGRID")).unwrap(), FileFormat::Formatted);
        assert_eq!(FileFormat::from_path(Path::new("CASE.A0001")).unwrap(), FileFormat::Formatted);
        assert_eq!(FileFormat::from_path(Path::new("CASE.FUNRST")).unwrap(), FileFormat::Formatted);
        assert_eq!(FileFormat::from_path(Path::new("CASE.EGRID")).unwrap(), FileFormat::Binary);
        assert_eq!(FileFormat::from_path(Path::new("CASE.X0001")).unwrap(), FileFormat::Binary);
        assert!(matches!(
            FileFormat::from_path(Path::new("CASE")),
            Err(EclError::InvalidFileName(_))
        ));
    }

    #[test]
    fn binary_header_roundtrip() {
        let mut buf = Vec::new();
        write_header(&mut buf, FileFormat::Binary, "PORO", ArrayType::Real, 1234).unwrap();
        assert_eq!(buf.len() as u64, BINARY_HEADER_SIZE);
        let h = read_header(&mut Cursor::new(&buf), FileFormat::Binary).unwrap().unwrap();
        assert_eq!(h, ArrayHeader { name: "PORO".into(), array_type: ArrayType::Real, length: 1234 });
    }

    #[test]
    fn formatted_header_roundtrip() {
        let mut buf = Vec::new();
        write_header(&mut buf, FileFormat::Formatted, "ZCORN", ArrayType::Doub, 42).unwrap();
        assert_eq!(String::from_utf8(buf.clone()).unwrap(), " 'ZCORN   '          42 'DOUB'\n");
        let h = read_header(&mut Cursor::new(&buf), FileFormat::Formatted).unwrap().unwrap();
        assert_eq!(h.name, "ZCORN");
        assert_eq!(h.length, 42);
    }

    #[test]
    fn clean_eof_is_none() {
        let empty: &[u8] = &[];
        assert!(read_header(&mut Cursor::new(empty), FileFormat::Binary).unwrap().is_none());
        assert!(read_header(&mut Cursor::new(b"\n  \n"), FileFormat::Formatted).unwrap().is_none());
    }

    #[test]
    fn bad_marker_is_rejected() {
        let mut buf = raw_binary("PORO", 1, b"REAL");
        buf[3] = 15;
        assert!(matches!(
            read_header(&mut Cursor::new(&buf), FileFormat::Binary),
            Err(EclError::Format(_))
        ));

        let mut buf = raw_binary("PORO", 1, b"REAL");
        let last = buf.len() - 1;
        buf[last] = 17;
        assert!(matches!(
            read_header(&mut Cursor::new(&buf), FileFormat::Binary),
            Err(EclError::Format(_))
        ));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let buf = raw_binary("PORO", 1, b"QUAD");
        let err = read_header(&mut Cursor::new(&buf), FileFormat::Binary).unwrap_err();
        assert!(err.to_string().contains("QUAD"));
    }

    #[test]
    fn x231_pair_resolves_length() {
        let mut buf = raw_binary("BIGARR", -3, b"X231");
        buf.extend(raw_binary("BIGARR", 17, b"INTE"));
        let h = read_header(&mut Cursor::new(&buf), FileFormat::Binary).unwrap().unwrap();
        assert_eq!(h.name, "BIGARR");
        assert_eq!(h.array_type, ArrayType::Inte);
        assert_eq!(h.length, 17 + 3 * (1i64 << 31));
    }

    #[test]
    fn x231_writer_emits_pair() {
        let length = 2 * (1i64 << 31) + 5;
        let mut buf = Vec::new();
        write_header(&mut buf, FileFormat::Binary, "BIGARR", ArrayType::Doub, length).unwrap();
        assert_eq!(buf.len() as u64, 2 * BINARY_HEADER_SIZE);
        assert_eq!(&buf[16..20], b"X231");
        let h = read_header(&mut Cursor::new(&buf), FileFormat::Binary).unwrap().unwrap();
        assert_eq!((h.array_type, h.length), (ArrayType::Doub, length));
    }

    #[test]
    fn x231_name_mismatch_is_rejected() {
        let mut buf = raw_binary("BIGARR", -1, b"X231");
        buf.extend(raw_binary("OTHER", 0, b"INTE"));
        assert!(matches!(
            read_header(&mut Cursor::new(&buf), FileFormat::Binary),
            Err(EclError::Format(_))
        ));
    }

    #[test]
    fn x231_non_negative_count_is_rejected() {
        let mut buf = raw_binary("BIGARR", 2, b"X231");
        buf.extend(raw_binary("BIGARR", 0, b"INTE"));
        assert!(matches!(
            read_header(&mut Cursor::new(&buf), FileFormat::Binary),
            Err(EclError::Format(_))
        ));
    }

    #[test]
    fn x231_without_second_header_is_rejected() {
        let buf = raw_binary("BIGARR", -1, b"X231");
        assert!(matches!(
            read_header(&mut Cursor::new(&buf), FileFormat::Binary),
            Err(EclError::Format(_))
        ));
    }

    #[test]
    fn formatted_header_needs_quotes_and_width() {
        let bad = b" 'PORO' 3 'REAL'\n";
        assert!(read_header(&mut Cursor::new(&bad[..]), FileFormat::Formatted).is_err());
        let bad = b" PORO     3 REAL\n";
        assert!(read_header(&mut Cursor::new(&bad[..]), FileFormat::Formatted).is_err());
    }

    #[test]
    fn blank_lines_before_text_are_skipped_whole() {
        let mut r = Cursor::new(&b"\n  \n 'PORO    '"[..]);
        assert_eq!(skip_blank_lines(&mut r).unwrap(), 4);
        assert_eq!(r.position(), 4);
        assert_eq!(skip_blank_lines(&mut r).unwrap(), 0);

        let mut r = Cursor::new(&b" \n\n   "[..]);
        assert_eq!(skip_blank_lines(&mut r).unwrap(), 6);
    }

    #[test]
    fn long_names_are_refused_by_writer() {
        let mut buf = Vec::new();
        let err = write_header(&mut buf, FileFormat::Binary, "NINECHARS", ArrayType::Inte, 1).unwrap_err();
        assert!(matches!(err, EclError::InvalidInput(_)));
    }
}
