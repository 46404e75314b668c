//! Append-only staging file written by the pipeline sink.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::Result;

const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Where one encoded entry landed in the temp file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OffsetEntry {
    pub record_id: u32,
    pub temp_offset: u64,
    pub byte_len: u64,
}

/// Single-writer temp store at `<dir>/<stem>.omg.tmp`.
///
/// Entries are appended in arrival order; the returned [`OffsetEntry`] values
/// are all the container writer needs to put them back in id order.
pub struct TempStore {
    path: PathBuf,
    writer: BufWriter<File>,
    len: u64,
}

impl TempStore {
    pub fn create<P: AsRef<Path>>(dir: P, stem: &str) -> Result<Self> {
        let path = dir.as_ref().join(format!("{}.omg.tmp", stem));
        let file = File::create(&path)?;
        debug!(path = %path.display(), "temp store created");
        Ok(Self {
            path,
            writer: BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file),
            len: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes appended so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn append(&mut self, record_id: u32, bytes: &[u8]) -> Result<OffsetEntry> {
        self.writer.write_all(bytes)?;
        let entry = OffsetEntry {
            record_id,
            temp_offset: self.len,
            byte_len: bytes.len() as u64,
        };
        self.len += bytes.len() as u64;
        Ok(entry)
    }

    /// Flushes and closes the store, returning its path for re-reading.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path.clone())
    }

    /// Closes and deletes the store after a failed run.
    pub fn discard(self) {
        let path = self.path.clone();
        drop(self.writer);
        remove_temp(&path);
    }
}

/// Removes a temp file, logging instead of failing.
pub(crate) fn remove_temp(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "could not remove temp file");
    }
}
