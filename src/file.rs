//! High-level [`EclFile`] API.
//!
//! ```no_run
//! use eclio::{EclFile, EclWriter};
//!
//! let mut w = EclWriter::create("CASE.INIT")?;
//! w.write("PORO", &[0.25f32, 0.3, 0.1])?;
//! w.write("NAMES", &["OP_1".to_owned()])?;
//! w.flush()?;
//! drop(w);
//!
//! let mut f = EclFile::open("CASE.INIT")?;
//! assert!(f.has_key("PORO"));
//! let poro: &[f32] = f.get_by_name("PORO")?;
//! assert_eq!(poro.len(), 3);
//! # Ok::<(), eclio::EclError>(())
//! ```
//!
//! Opening scans headers only.  Payloads are decoded on first typed access
//! or by one of the `load_*` calls.  A load call either commits every array
//! it was asked for or none of them.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::array::{ArrayData, EclElement};
use crate::error::{EclError, Result};
use crate::header::FileFormat;
use crate::index::scanner::scan;
use crate::index::{ArrayInfo, Directory};
use crate::parallel::{balance, cap_threads, log_plan, LoadExecutor, SequentialExecutor, ThreadedExecutor};

// ── ReaderOptions ─────────────────────────────────────────────────────────────

/// Configuration for [`EclFile::open_with_options`].
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Decode every array while opening.
    pub preload: bool,
    /// Worker count for the preload; below 2 loads on the calling thread.
    pub threads: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self { preload: false, threads: 1 }
    }
}

// ── EclFile ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct EclFile {
    path:      PathBuf,
    format:    FileFormat,
    directory: Directory,
}

impl EclFile {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ReaderOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(path: P, opts: ReaderOptions) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path).map_err(|source| EclError::FileNotFound {
            path: path.clone(),
            source,
        })?;
        let format   = FileFormat::from_path(&path)?;
        let file_len = file.metadata()?.len();

        let directory = scan(&mut BufReader::new(file), format, file_len)?;
        let mut ecl = Self { path, format, directory };

        if opts.preload {
            ecl.load_parallel(&[], opts.threads)?;
        }
        Ok(ecl)
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path { &self.path }

    pub fn format(&self) -> FileFormat { self.format }

    pub fn is_formatted(&self) -> bool { self.format.is_formatted() }

    pub fn directory(&self) -> &Directory { &self.directory }

    /// Number of arrays, duplicates included.
    pub fn size(&self) -> usize { self.directory.len() }

    pub fn len(&self) -> usize { self.directory.len() }

    pub fn is_empty(&self) -> bool { self.directory.is_empty() }

    pub fn has_key(&self, name: &str) -> bool {
        self.directory.has_key(name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.directory.count(name)
    }

    pub fn list(&self) -> Vec<ArrayInfo> {
        self.directory.list()
    }

    /// The listing as a JSON array of `{name, array_type, length}` objects.
    pub fn list_json(&self) -> Result<String> {
        serde_json::to_string(&self.list())
            .map_err(|e| EclError::InvalidInput(format!("listing could not be serialized: {e}")))
    }

    pub fn is_loaded(&self, index: usize) -> Result<bool> {
        Ok(self.directory.entry(index)?.is_loaded())
    }

    /// Payload of entry `index` if it has been loaded.
    pub fn data(&self, index: usize) -> Result<Option<&ArrayData>> {
        Ok(self.directory.entry(index)?.data())
    }

    /// Offset of the header of entry `index`; the end of the file when
    /// `index` is past the last entry.
    pub fn seek_position(&self, index: usize) -> u64 {
        self.directory.seek_position(index)
    }

    // ── Loading ──────────────────────────────────────────────────────────────

    pub fn load_all(&mut self) -> Result<()> {
        let all: Vec<usize> = (0..self.directory.len()).collect();
        self.load_indices(&all)
    }

    /// Load every array called `name`.
    pub fn load_name(&mut self, name: &str) -> Result<()> {
        let indices = self.directory.indices_of(name);
        if indices.is_empty() {
            return Err(EclError::KeyNotFound(name.to_owned()));
        }
        self.load_indices(&indices)
    }

    pub fn load_index(&mut self, index: usize) -> Result<()> {
        self.load_indices(&[index])
    }

    pub fn load_indices(&mut self, indices: &[usize]) -> Result<()> {
        self.load_with(indices, 1, &SequentialExecutor)
    }

    /// Load `indices` (every array when empty) on up to `threads` workers.
    /// The count is capped to the hardware minus one core; below 2 the load
    /// runs on the calling thread.
    pub fn load_parallel(&mut self, indices: &[usize], threads: usize) -> Result<()> {
        let all: Vec<usize>;
        let indices = if indices.is_empty() {
            all = (0..self.directory.len()).collect();
            &all[..]
        } else {
            indices
        };

        let capped = cap_threads(threads);
        debug!(requested = threads, capped, "thread count capped");
        if capped < 2 {
            return self.load_indices(indices);
        }
        self.load_with(indices, capped, &ThreadedExecutor)
    }

    /// Balance `indices` over `threads` groups and run them on `executor`.
    /// `threads` is used as given.  Entries that are already loaded are read
    /// again and overwritten.
    pub fn load_with(&mut self, indices: &[usize], threads: usize, executor: &dyn LoadExecutor) -> Result<()> {
        let mut weights: Vec<(usize, u64)> = Vec::with_capacity(indices.len());
        for &index in indices {
            let entry = self.directory.entry(index)?;
            if !weights.iter().any(|&(i, _)| i == index) {
                weights.push((index, entry.weight()));
            }
        }
        if weights.is_empty() {
            return Ok(());
        }

        let plan = balance(&weights, threads);
        log_plan(threads, &plan);
        debug!(arrays = weights.len(), format = ?self.format, groups = plan.groups.len(), "loading arrays");

        let loaded = executor.execute(&self.path, self.format, &self.directory, &plan)?;
        for (index, data) in loaded {
            self.directory.entry_mut(index)?.data = Some(data);
        }
        Ok(())
    }

    // ── Typed access ─────────────────────────────────────────────────────────

    /// Borrow entry `index` as `T`, loading it first if needed.
    pub fn get<T: EclElement>(&mut self, index: usize) -> Result<&[T]> {
        let entry = self.directory.entry(index)?;
        if entry.array_type != T::ARRAY_TYPE {
            return Err(EclError::TypeMismatch {
                name:      entry.name.clone(),
                actual:    entry.array_type,
                requested: T::ARRAY_TYPE,
            });
        }
        if !entry.is_loaded() {
            self.load_index(index)?;
        }

        let entry = self.directory.entry(index)?;
        entry
            .data()
            .and_then(T::slice)
            .ok_or_else(|| EclError::TypeMismatch {
                name:      entry.name.clone(),
                actual:    entry.array_type,
                requested: T::ARRAY_TYPE,
            })
    }

    /// Borrow the first array called `name` as `T`.
    pub fn get_by_name<T: EclElement>(&mut self, name: &str) -> Result<&[T]> {
        let index = self.directory.index_of(name)?;
        self.get(index)
    }
}
