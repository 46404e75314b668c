use std::{fs::File, ops::Range, path::Path, sync::Arc};

use memmap2::Mmap;

use crate::{OmgError, Result};

/// A read-only memory map of a whole container.
///
/// Cloning shares the map, so every thread of a parallel read sees the same
/// pages without locking.
#[derive(Clone)]
pub struct MmapSource {
    map: Arc<Mmap>,
}

#[allow(clippy::len_without_is_empty)]
impl MmapSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // The container is immutable once assembled.
        let map = unsafe { Arc::new(Mmap::map(&file)?) };
        Ok(Self { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Borrows `range` of the file.
    pub fn slice(&self, range: Range<u64>) -> Result<&[u8]> {
        let start = usize::try_from(range.start).ok();
        let end = usize::try_from(range.end).ok();
        match (start, end) {
            (Some(start), Some(end)) if start <= end && end <= self.map.len() => {
                Ok(&self.map[start..end])
            }
            _ => Err(OmgError::integrity(format!(
                "byte range {}..{} lies outside the {} byte container",
                range.start,
                range.end,
                self.map.len()
            ))),
        }
    }
}
