//! Array materializer and sequential writer.
//!
//! # Reader
//! [`ArrayReader`] owns one stream.  Given a directory entry it seeks to the
//! recorded data offset and decodes exactly that array; it never looks at the
//! headers again.  Workers in a parallel load each open their own reader, so
//! no two threads share a cursor.
//!
//! # Writer
//! [`EclWriter`] appends header + payload per call, in call order.

pub mod formatted;
mod writer;

pub use writer::{EclWriter, WriterOptions};

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::trace;

use crate::array::{ArrayData, ArrayType};
use crate::block::{on_disk_size_formatted, read_binary_payload};
use crate::endian::{decode_char8, decode_f32, decode_f64, decode_i32, decode_logical};
use crate::error::{EclError, Result};
use crate::header::FileFormat;
use crate::index::{ArrayEntry, Directory};

pub struct ArrayReader<R: Read + Seek> {
    reader: BufReader<R>,
    format: FileFormat,
}

impl ArrayReader<File> {
    pub fn open(path: &Path, format: FileFormat) -> Result<Self> {
        let file = File::open(path).map_err(|source| EclError::FileNotFound {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self::new(file, format))
    }
}

impl<R: Read + Seek> ArrayReader<R> {
    pub fn new(inner: R, format: FileFormat) -> Self {
        Self { reader: BufReader::new(inner), format }
    }

    /// Decode one array.  The entry itself is not modified.
    pub fn read_array(&mut self, entry: &ArrayEntry) -> Result<ArrayData> {
        if entry.array_type == ArrayType::Mess || entry.length == 0 {
            return Ok(ArrayData::empty(entry.array_type));
        }
        self.reader.seek(SeekFrom::Start(entry.data_offset))?;

        let data = match self.format {
            FileFormat::Binary    => self.read_binary(entry)?,
            FileFormat::Formatted => self.read_formatted(entry)?,
        };
        trace!(name = %entry.name, array_type = %entry.array_type, length = entry.length, "array decoded");
        Ok(data)
    }

    /// Decode `indices` in order.  Results are returned, not stored, so a
    /// failure part way leaves the directory untouched.
    pub fn read_batch(&mut self, dir: &Directory, indices: &[usize]) -> Result<Vec<(usize, ArrayData)>> {
        let mut out = Vec::with_capacity(indices.len());
        for &index in indices {
            let entry = dir.entry(index)?;
            out.push((index, self.read_array(entry)?));
        }
        Ok(out)
    }

    fn read_binary(&mut self, entry: &ArrayEntry) -> Result<ArrayData> {
        let (name, ty) = (entry.name.as_str(), entry.array_type);
        let raw = read_binary_payload(&mut self.reader, name, ty, entry.length)?;

        let data = match ty {
            ArrayType::Inte => ArrayData::Inte(raw.chunks_exact(4).map(decode_i32).collect()),
            ArrayType::Real => ArrayData::Real(raw.chunks_exact(4).map(decode_f32).collect()),
            ArrayType::Doub => ArrayData::Doub(raw.chunks_exact(8).map(decode_f64).collect()),
            ArrayType::Char => ArrayData::Char(raw.chunks_exact(8).map(decode_char8).collect()),
            ArrayType::Logi => {
                let values = raw
                    .chunks_exact(4)
                    .enumerate()
                    .map(|(i, word)| {
                        decode_logical(word).ok_or_else(|| {
                            EclError::value(name, ty, format!(
                                "element {i} is {:#010x}, not a logical sentinel",
                                decode_i32(word) as u32
                            ))
                        })
                    })
                    .collect::<Result<Vec<bool>>>()?;
                ArrayData::Logi(values)
            }
            ArrayType::Mess => ArrayData::Mess,
        };
        Ok(data)
    }

    fn read_formatted(&mut self, entry: &ArrayEntry) -> Result<ArrayData> {
        let span = on_disk_size_formatted(entry.length, entry.array_type)?;
        let mut text = Vec::new();
        self.reader.by_ref().take(span).read_to_end(&mut text)?;
        formatted::decode(&text, &entry.name, entry.array_type, entry.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::scanner::scan;
    use std::io::Cursor;

    fn scanned(buf: &[u8], format: FileFormat) -> Directory {
        let mut r = BufReader::new(Cursor::new(buf.to_vec()));
        scan(&mut r, format, buf.len() as u64).unwrap()
    }

    #[test]
    fn reads_each_type_back() {
        for format in [FileFormat::Binary, FileFormat::Formatted] {
            let mut w = EclWriter::new(Vec::new(), format);
            w.write("INTS", &[1, 2, 3, 4, 5]).unwrap();
            w.write("REALS", &[0.5f32, -2.25]).unwrap();
            w.write("DOUBS", &[1.0e10f64, -3.5]).unwrap();
            w.write("FLAGS", &[true, false, true]).unwrap();
            w.write("NAMES", &["WOPR".to_owned(), String::new()]).unwrap();
            w.write_message("ENDSOL").unwrap();
            let buf = w.into_inner().unwrap();

            let dir = scanned(&buf, format);
            let mut r = ArrayReader::new(Cursor::new(buf), format);
            let all: Vec<usize> = (0..dir.len()).collect();
            let got = r.read_batch(&dir, &all).unwrap();

            assert_eq!(got[0].1, ArrayData::Inte(vec![1, 2, 3, 4, 5]));
            assert_eq!(got[1].1, ArrayData::Real(vec![0.5, -2.25]));
            assert_eq!(got[2].1, ArrayData::Doub(vec![1.0e10, -3.5]));
            assert_eq!(got[3].1, ArrayData::Logi(vec![true, false, true]));
            assert_eq!(got[4].1, ArrayData::Char(vec!["WOPR".into(), "".into()]));
            assert_eq!(got[5].1, ArrayData::Mess);
        }
    }

    #[test]
    fn corrupt_logical_is_a_decode_error() {
        let mut w = EclWriter::new(Vec::new(), FileFormat::Binary);
        w.write("FLAGS", &[true, false]).unwrap();
        let mut buf = w.into_inner().unwrap();
        // header 24, marker 4, first element 4 bytes
        buf[24 + 4 + 3] = 0x05;

        let dir = scanned(&buf, FileFormat::Binary);
        let mut r = ArrayReader::new(Cursor::new(buf), FileFormat::Binary);
        let err = r.read_array(&dir.entries()[0]).unwrap_err();
        assert!(matches!(err, EclError::DecodeValue { .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ArrayReader::open(Path::new("/nonexistent/dir/CASE.INIT"), FileFormat::Binary)
            .err()
            .unwrap();
        assert!(matches!(err, EclError::FileNotFound { .. }));
    }
}
