//! In-memory array directory.
//!
//! Built once by [`scanner::scan`] and never restructured afterwards.  Entries
//! keep file order and names may repeat; name lookup resolves to the first
//! occurrence while [`Directory::count`] sees all of them.

pub mod scanner;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::array::{ArrayData, ArrayType};
use crate::error::{EclError, Result};

/// One declared array.
#[derive(Debug, Clone)]
pub struct ArrayEntry {
    pub name:          String,
    pub array_type:    ArrayType,
    pub length:        i64,
    /// Offset of the first header byte (of the X231 pair, when present).
    pub header_offset: u64,
    /// Offset of the first payload byte, or just past the header if empty.
    pub data_offset:   u64,
    pub(crate) data:   Option<ArrayData>,
}

impl ArrayEntry {
    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn data(&self) -> Option<&ArrayData> {
        self.data.as_ref()
    }

    /// Payload weight used by the load balancer.
    pub fn weight(&self) -> u64 {
        self.length.max(0) as u64 * self.array_type.weight_bytes()
    }
}

/// Listing row returned by [`Directory::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayInfo {
    pub name:       String,
    pub array_type: ArrayType,
    pub length:     i64,
}

impl From<&ArrayEntry> for ArrayInfo {
    fn from(e: &ArrayEntry) -> Self {
        ArrayInfo {
            name:       e.name.clone(),
            array_type: e.array_type,
            length:     e.length,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries:     Vec<ArrayEntry>,
    first_index: HashMap<String, usize>,
    end_offset:  u64,
}

impl Directory {
    pub(crate) fn push(&mut self, entry: ArrayEntry) {
        let index = self.entries.len();
        self.first_index.entry(entry.name.clone()).or_insert(index);
        self.entries.push(entry);
    }

    pub(crate) fn finish(&mut self, end_offset: u64) {
        self.end_offset = end_offset;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ArrayEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Result<&ArrayEntry> {
        self.entries.get(index).ok_or(EclError::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Result<&mut ArrayEntry> {
        let len = self.entries.len();
        self.entries
            .get_mut(index)
            .ok_or(EclError::IndexOutOfRange { index, len })
    }

    pub fn has_key(&self, name: &str) -> bool {
        self.first_index.contains_key(name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.entries.iter().filter(|e| e.name == name).count()
    }

    /// Index of the first entry called `name`.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.first_index
            .get(name)
            .copied()
            .ok_or_else(|| EclError::KeyNotFound(name.to_owned()))
    }

    /// Every index whose entry is called `name`, in file order.
    pub fn indices_of(&self, name: &str) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.name == name)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn list(&self) -> Vec<ArrayInfo> {
        self.entries.iter().map(ArrayInfo::from).collect()
    }

    /// End of file as seen by the scan.
    pub fn end_offset(&self) -> u64 {
        self.end_offset
    }

    /// Where the header of entry `index` starts; past the last entry this
    /// is the end-of-file offset.
    pub fn seek_position(&self, index: usize) -> u64 {
        self.entries
            .get(index)
            .map_or(self.end_offset, |e| e.header_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, array_type: ArrayType, length: i64, at: u64) -> ArrayEntry {
        ArrayEntry {
            name: name.into(),
            array_type,
            length,
            header_offset: at,
            data_offset: at + 24,
            data: None,
        }
    }

    #[test]
    fn duplicates_resolve_to_first() {
        let mut dir = Directory::default();
        dir.push(entry("SEQNUM", ArrayType::Inte, 1, 0));
        dir.push(entry("PRESSURE", ArrayType::Real, 10, 100));
        dir.push(entry("SEQNUM", ArrayType::Inte, 1, 200));
        dir.finish(300);

        assert_eq!(dir.len(), 3);
        assert_eq!(dir.count("SEQNUM"), 2);
        assert_eq!(dir.index_of("SEQNUM").unwrap(), 0);
        assert_eq!(dir.indices_of("SEQNUM"), vec![0, 2]);
        assert!(dir.has_key("PRESSURE"));
        assert!(!dir.has_key("SWAT"));
        assert!(matches!(dir.index_of("SWAT"), Err(EclError::KeyNotFound(_))));
    }

    #[test]
    fn seek_position_falls_back_to_end() {
        let mut dir = Directory::default();
        dir.push(entry("A", ArrayType::Inte, 1, 0));
        dir.push(entry("B", ArrayType::Inte, 1, 40));
        dir.finish(80);
        assert_eq!(dir.seek_position(1), 40);
        assert_eq!(dir.seek_position(2), 80);
        assert!(matches!(dir.entry(5), Err(EclError::IndexOutOfRange { index: 5, len: 2 })));
    }

    #[test]
    fn weights_follow_type_width() {
        assert_eq!(entry("D", ArrayType::Doub, 10, 0).weight(), 80);
        assert_eq!(entry("C", ArrayType::Char, 10, 0).weight(), 80);
        assert_eq!(entry("I", ArrayType::Inte, 10, 0).weight(), 40);
        assert_eq!(entry("M", ArrayType::Mess, 0, 0).weight(), 0);
    }
}
