//! Single-pass directory scan.
//!
//! Reads headers only.  After each header the payload span is computed from
//! the block-size policy and skipped with one relative seek, so no payload
//! byte is ever read here.  Any framing error aborts the scan and no
//! directory is returned.

use std::io::{BufReader, Read, Seek};

use tracing::debug;

use crate::block::{on_disk_size_binary, on_disk_size_formatted};
use crate::error::{EclError, Result};
use crate::header::{read_header, skip_blank_lines, FileFormat};
use crate::index::{ArrayEntry, Directory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    ScanningHeader,
    SkippingPayload { span: u64 },
    Done,
}

/// Payload span of one array for the given format.
pub fn payload_span(format: FileFormat, entry: &ArrayEntry) -> Result<u64> {
    match format {
        FileFormat::Binary    => on_disk_size_binary(entry.length, entry.array_type),
        FileFormat::Formatted => on_disk_size_formatted(entry.length, entry.array_type),
    }
}

/// Scan a whole stream from its current position.
///
/// `file_len` is used to reject binary arrays whose declared payload runs
/// past the end of the file.
pub fn scan<R: Read + Seek>(
    reader:   &mut BufReader<R>,
    format:   FileFormat,
    file_len: u64,
) -> Result<Directory> {
    let mut dir   = Directory::default();
    let mut state = ScanState::ScanningHeader;

    while state != ScanState::Done {
        state = match state {
            ScanState::ScanningHeader => {
                if format == FileFormat::Formatted {
                    skip_blank_lines(reader)?;
                }
                let header_offset = reader.stream_position()?;
                match read_header(reader, format)? {
                    None => ScanState::Done,
                    Some(h) => {
                        let entry = ArrayEntry {
                            name:          h.name,
                            array_type:    h.array_type,
                            length:        h.length,
                            header_offset,
                            data_offset:   reader.stream_position()?,
                            data:          None,
                        };
                        let span = payload_span(format, &entry)?;

                        let payload_end = entry.data_offset.checked_add(span);
                        if format == FileFormat::Binary && payload_end.map_or(true, |end| end > file_len) {
                            return Err(EclError::size(
                                &entry.name,
                                entry.array_type,
                                entry.length,
                                format!(
                                    "payload needs {span} bytes from offset {} but file ends at {file_len}",
                                    entry.data_offset
                                ),
                            ));
                        }

                        dir.push(entry);
                        if span > 0 {
                            ScanState::SkippingPayload { span }
                        } else {
                            ScanState::ScanningHeader
                        }
                    }
                }
            }
            ScanState::SkippingPayload { span } => {
                let span = i64::try_from(span)
                    .map_err(|_| EclError::format(format!("payload span {span} too large to seek")))?;
                reader.seek_relative(span)?;
                ScanState::ScanningHeader
            }
            ScanState::Done => ScanState::Done,
        };
    }

    let end = reader.stream_position()?.max(file_len);
    dir.finish(end);
    debug!(arrays = dir.len(), end_offset = end, ?format, "directory scan complete");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayType;
    use crate::header::write_header;
    use std::io::Cursor;

    fn scan_bytes(buf: Vec<u8>, format: FileFormat) -> Result<Directory> {
        let len = buf.len() as u64;
        scan(&mut BufReader::new(Cursor::new(buf)), format, len)
    }

    #[test]
    fn empty_stream_gives_empty_directory() {
        let dir = scan_bytes(Vec::new(), FileFormat::Binary).unwrap();
        assert!(dir.is_empty());
        assert_eq!(dir.end_offset(), 0);
    }

    #[test]
    fn headers_without_payload() {
        let mut buf = Vec::new();
        write_header(&mut buf, FileFormat::Binary, "STARTSOL", ArrayType::Mess, 0).unwrap();
        write_header(&mut buf, FileFormat::Binary, "EMPTY", ArrayType::Inte, 0).unwrap();
        let dir = scan_bytes(buf, FileFormat::Binary).unwrap();

        let e = dir.entries();
        assert_eq!(e.len(), 2);
        assert_eq!((e[0].header_offset, e[0].data_offset), (0, 24));
        assert_eq!((e[1].header_offset, e[1].data_offset), (24, 48));
        assert_eq!(dir.end_offset(), 48);
    }

    #[test]
    fn formatted_header_offset_skips_blank_lines() {
        let mut buf = b"\n\n".to_vec();
        write_header(&mut buf, FileFormat::Formatted, "STARTSOL", ArrayType::Mess, 0).unwrap();
        buf.extend_from_slice(b"   \n");
        write_header(&mut buf, FileFormat::Formatted, "ENDSOL", ArrayType::Mess, 0).unwrap();
        let first_len = 31;

        let dir = scan_bytes(buf, FileFormat::Formatted).unwrap();
        let e = dir.entries();
        assert_eq!(e[0].header_offset, 2);
        assert_eq!(e[1].header_offset, 2 + first_len + 4);
        assert_eq!(dir.seek_position(1), e[1].header_offset);
    }

    #[test]
    fn x231_length_beyond_any_file_is_rejected() {
        for ty in [ArrayType::Doub, ArrayType::Inte] {
            let mut buf = Vec::new();
            write_header(&mut buf, FileFormat::Binary, "BIGARR", ty, 1i64 << 62).unwrap();
            assert!(matches!(scan_bytes(buf, FileFormat::Binary), Err(EclError::Format(_))), "{ty}");
        }
    }

    #[test]
    fn payload_past_end_is_rejected() {
        let mut buf = Vec::new();
        write_header(&mut buf, FileFormat::Binary, "PORO", ArrayType::Real, 10).unwrap();
        buf.extend_from_slice(&[0u8; 12]);
        let err = scan_bytes(buf, FileFormat::Binary).unwrap_err();
        assert!(matches!(err, EclError::SizeInconsistency { .. }));
    }

    #[test]
    fn garbage_after_valid_array_aborts() {
        let mut buf = Vec::new();
        write_header(&mut buf, FileFormat::Binary, "STARTSOL", ArrayType::Mess, 0).unwrap();
        buf.extend_from_slice(&[0, 0, 0, 99, 1, 2, 3]);
        assert!(scan_bytes(buf, FileFormat::Binary).is_err());
    }
}
