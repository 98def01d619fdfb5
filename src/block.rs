//! Block-size policy and binary block framing.
//!
//! # Binary blocks
//! ```text
//! [i32 BE byte_len][byte_len bytes of elements][i32 BE byte_len]
//! ```
//! An array is split into consecutive blocks of at most
//! `max_block_bytes / element_size` elements.  Both markers must agree.
//!
//! # Formatted blocks
//! Elements are printed `columns` per line at a fixed `column_width`; every
//! block of `max_elements` starts on a fresh line, so the last line of each
//! block gets its own newline even when it is short.
//!
//! The constants are a legacy format decision and are kept as a table.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::array::ArrayType;
use crate::error::{EclError, Result};

/// Size of one block length marker.
pub const MARKER_SIZE: u64 = 4;

// ── Policy tables ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryBlockSize {
    pub element_size:    usize,
    pub max_block_bytes: usize,
}

impl BinaryBlockSize {
    pub fn max_elements(&self) -> usize {
        self.max_block_bytes / self.element_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormattedBlockSize {
    pub max_elements: usize,
    pub columns:      usize,
    pub column_width: usize,
}

/// `None` for MESS, which has no payload.
pub fn block_size_binary(array_type: ArrayType) -> Option<BinaryBlockSize> {
    let (element_size, max_block_bytes) = match array_type {
        ArrayType::Inte => (4, 4000),
        ArrayType::Real => (4, 4000),
        ArrayType::Doub => (8, 8000),
        ArrayType::Logi => (4, 4000),
        ArrayType::Char => (8, 840),
        ArrayType::Mess => return None,
    };
    Some(BinaryBlockSize { element_size, max_block_bytes })
}

/// `None` for MESS, which has no payload.
pub fn block_size_formatted(array_type: ArrayType) -> Option<FormattedBlockSize> {
    let (max_elements, columns, column_width) = match array_type {
        ArrayType::Inte => (1000, 6, 12),
        ArrayType::Real => (1000, 4, 17),
        ArrayType::Doub => (1000, 3, 23),
        ArrayType::Logi => (1000, 25, 3),
        ArrayType::Char => (105, 7, 11),
        ArrayType::Mess => return None,
    };
    Some(FormattedBlockSize { max_elements, columns, column_width })
}

// ── On-disk spans ───────────────────────────────────────────────────────────

fn no_payload(count: i64, array_type: ArrayType) -> Result<Option<u64>> {
    if count < 0 {
        return Err(EclError::format(format!(
            "negative element count {count} for {array_type} array"
        )));
    }
    if array_type == ArrayType::Mess {
        if count > 0 {
            return Err(EclError::format(format!(
                "MESS array cannot carry data (declared {count} elements)"
            )));
        }
        return Ok(Some(0));
    }
    if count == 0 {
        return Ok(Some(0));
    }
    Ok(None)
}

/// Bytes occupied by `count` elements including block markers.
pub fn on_disk_size_binary(count: i64, array_type: ArrayType) -> Result<u64> {
    if let Some(size) = no_payload(count, array_type)? {
        return Ok(size);
    }
    let policy = match block_size_binary(array_type) {
        Some(p) => p,
        None    => return Ok(0),
    };
    let count     = count as u64;
    let per_block = policy.max_elements() as u64;
    let full      = count / per_block;
    let rest      = count % per_block;

    let tail = if rest > 0 { rest * policy.element_size as u64 + 2 * MARKER_SIZE } else { 0 };
    full.checked_mul(policy.max_block_bytes as u64 + 2 * MARKER_SIZE)
        .and_then(|size| size.checked_add(tail))
        .ok_or_else(|| span_overflow(count, array_type))
}

fn span_overflow(count: u64, array_type: ArrayType) -> EclError {
    EclError::format(format!(
        "{array_type} array of {count} elements does not fit in a 64-bit file offset"
    ))
}

/// Characters occupied by `count` elements including newlines.
pub fn on_disk_size_formatted(count: i64, array_type: ArrayType) -> Result<u64> {
    if let Some(size) = no_payload(count, array_type)? {
        return Ok(size);
    }
    let policy = match block_size_formatted(array_type) {
        Some(p) => p,
        None    => return Ok(0),
    };
    let count = count as u64;
    let max   = policy.max_elements as u64;
    let cols  = policy.columns as u64;
    let width = policy.column_width as u64;

    let lines = |n: u64| n / cols + u64::from(n % cols > 0);

    let full = count / max;
    let last = count % max;
    full.checked_mul(max * width + lines(max))
        .and_then(|size| size.checked_add(last * width + lines(last)))
        .ok_or_else(|| span_overflow(count, array_type))
}

// ── Binary framing ──────────────────────────────────────────────────────────

pub fn read_marker<R: Read>(reader: &mut R) -> Result<i32> {
    Ok(reader.read_i32::<BigEndian>()?)
}

pub fn write_marker<W: Write>(writer: &mut W, byte_len: usize) -> Result<()> {
    let len = i32::try_from(byte_len)
        .map_err(|_| EclError::InvalidInput(format!("block of {byte_len} bytes too large")))?;
    writer.write_i32::<BigEndian>(len)?;
    Ok(())
}

/// Read the blocks of one array and return the raw element bytes, still in
/// disk order.  The result holds exactly `length * element_size` bytes.
pub fn read_binary_payload<R: Read>(
    reader:     &mut R,
    name:       &str,
    array_type: ArrayType,
    length:     i64,
) -> Result<Vec<u8>> {
    let policy = match block_size_binary(array_type) {
        Some(p) => p,
        None    => return Ok(Vec::new()),
    };
    let elem    = policy.element_size as i64;
    let max_num = policy.max_elements() as i64;

    let mut out  = Vec::with_capacity((length.max(0) * elem) as usize);
    let mut rest = length;

    while rest > 0 {
        let head = read_marker(reader)?;
        if head < 0 || i64::from(head) % elem != 0 {
            return Err(EclError::format(format!(
                "array '{name}' ({array_type}): block marker {head} is not a multiple of element size {elem}"
            )));
        }
        let num = i64::from(head) / elem;
        if num > max_num {
            return Err(EclError::size(name, array_type, length, format!(
                "block holds {num} elements, limit is {max_num}"
            )));
        }

        let start = out.len();
        out.resize(start + head as usize, 0);
        reader.read_exact(&mut out[start..])?;

        rest -= num;
        if (num < max_num && rest != 0) || rest < 0 {
            return Err(EclError::size(name, array_type, length, format!(
                "block accounting ends at {} elements",
                length - rest
            )));
        }

        let tail = read_marker(reader)?;
        if tail != head {
            return Err(EclError::format(format!(
                "array '{name}' ({array_type}): block tail marker {tail} does not match head {head}"
            )));
        }
    }
    Ok(out)
}

/// Write already-encoded element bytes as a sequence of framed blocks.
pub fn write_binary_payload<W: Write>(
    writer:     &mut W,
    array_type: ArrayType,
    encoded:    &[u8],
) -> Result<()> {
    let policy = match block_size_binary(array_type) {
        Some(p) => p,
        None    => return Ok(()),
    };
    let block_bytes = policy.max_elements() * policy.element_size;
    for chunk in encoded.chunks(block_bytes) {
        write_marker(writer, chunk.len())?;
        writer.write_all(chunk)?;
        write_marker(writer, chunk.len())?;
    }
    Ok(())
}
