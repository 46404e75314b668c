//! Container I/O: the pipeline's temp store, final assembly and reading.

mod mmap;
mod reader;
mod temp;
mod writer;

pub use mmap::MmapSource;
pub use reader::{Entries, EntryTable, Reader};
pub use temp::{OffsetEntry, TempStore};
pub use writer::ContainerWriter;

use std::path::Path;

use crate::{Header, ReadMode, Record, Result};

/// Size in bytes of the container footer.
pub const FOOTER_SIZE: usize = 64;

/// Reads a whole container into memory.
pub fn read_collection<P: AsRef<Path>>(path: P, mode: ReadMode) -> Result<(Header, Vec<Record>)> {
    let reader = Reader::open(path, mode)?;
    let records = reader.entries().collect::<Result<Vec<_>>>()?;
    Ok((reader.header().clone(), records))
}
