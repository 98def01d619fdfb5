use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::array::{ArrayData, EclElement};
use crate::block::write_binary_payload;
use crate::endian::{encode_char8, encode_f32, encode_f64, encode_i32, encode_logical, CHAR_WIDTH};
use crate::error::{EclError, Result};
use crate::header::{write_header, FileFormat};
use crate::io_stream::formatted;

/// Configuration for [`EclWriter::create_with_options`].
#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    /// Force a format; `None` derives it from the file extension.
    pub format: Option<FileFormat>,
}

pub struct EclWriter<W: Write> {
    writer: W,
    format: FileFormat,
}

impl EclWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with_options(path, WriterOptions::default())
    }

    pub fn create_with_options<P: AsRef<Path>>(path: P, opts: WriterOptions) -> Result<Self> {
        let path = path.as_ref();
        let format = match opts.format {
            Some(f) => f,
            None    => FileFormat::from_path(path)?,
        };
        Ok(Self::new(BufWriter::new(File::create(path)?), format))
    }
}

impl<W: Write> EclWriter<W> {
    pub fn new(writer: W, format: FileFormat) -> Self {
        Self { writer, format }
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn write<T: EclElement + Clone>(&mut self, name: &str, values: &[T]) -> Result<()> {
        self.write_data(name, &T::into_data(values.to_vec()))
    }

    pub fn write_message(&mut self, name: &str) -> Result<()> {
        self.write_data(name, &ArrayData::Mess)
    }

    pub fn write_data(&mut self, name: &str, data: &ArrayData) -> Result<()> {
        let array_type = data.array_type();
        write_header(&mut self.writer, self.format, name, array_type, data.len() as i64)?;

        match self.format {
            FileFormat::Binary    => write_binary_payload(&mut self.writer, array_type, &encode(data)?),
            FileFormat::Formatted => formatted::write_payload(&mut self.writer, data),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Elements in disk order, unframed.
fn encode(data: &ArrayData) -> Result<Vec<u8>> {
    let out = match data {
        ArrayData::Inte(v) => v.iter().flat_map(|x| encode_i32(*x)).collect(),
        ArrayData::Real(v) => v.iter().flat_map(|x| encode_f32(*x)).collect(),
        ArrayData::Doub(v) => v.iter().flat_map(|x| encode_f64(*x)).collect(),
        ArrayData::Logi(v) => v.iter().flat_map(|x| encode_logical(*x)).collect(),
        ArrayData::Char(v) => {
            let mut out = Vec::with_capacity(v.len() * CHAR_WIDTH);
            for s in v {
                let field = encode_char8(s).ok_or_else(|| {
                    EclError::InvalidInput(format!("string '{s}' is longer than {CHAR_WIDTH} characters"))
                })?;
                out.extend_from_slice(&field);
            }
            out
        }
        ArrayData::Mess => Vec::new(),
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayType;
    use crate::block::on_disk_size_binary;
    use crate::header::BINARY_HEADER_SIZE;

    #[test]
    fn binary_layout_is_header_then_blocks() {
        let mut w = EclWriter::new(Vec::new(), FileFormat::Binary);
        w.write("INTS", &[1, 2, 3, 4, 5]).unwrap();
        let buf = w.into_inner().unwrap();
        assert_eq!(buf.len() as u64, BINARY_HEADER_SIZE + on_disk_size_binary(5, ArrayType::Inte).unwrap());
        assert_eq!(&buf[4..12], b"INTS    ");
        assert_eq!(&buf[24..28], &20i32.to_be_bytes());
        assert_eq!(&buf[28..32], &1i32.to_be_bytes());
    }

    #[test]
    fn formatted_layout() {
        let mut w = EclWriter::new(Vec::new(), FileFormat::Formatted);
        w.write("FLAGS", &[true, false]).unwrap();
        let text = String::from_utf8(w.into_inner().unwrap()).unwrap();
        assert_eq!(text, " 'FLAGS   '           2 'LOGI'\n  T  F\n");
    }

    #[test]
    fn oversized_strings_are_refused() {
        let mut w = EclWriter::new(Vec::new(), FileFormat::Binary);
        let err = w.write("NAMES", &["ABCDEFGHIJ".to_owned()]).unwrap_err();
        assert!(matches!(err, EclError::InvalidInput(_)));
    }
}
