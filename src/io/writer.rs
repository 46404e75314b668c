//! Final container assembly.
//!
//! After the pipeline drains, the temp store holds every entry in arrival
//! order. [`ContainerWriter`] copies them behind the header in ascending record
//! id order and closes the file with the offset block and the 64-byte footer:
//!
//! ```text
//! [header][entry_0]..[entry_{N-1}][offset block][footer: 64 bytes]
//! ```
//!
//! The offset block is the Base64 of `[header_len, len_0 .. len_{N-1}]` as
//! little-endian `u32`; the footer holds `offsetLen:<offset block length>`.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::Path,
};

use tracing::{debug, info};

use super::{
    temp::{remove_temp, OffsetEntry, TempStore},
    FOOTER_SIZE,
};
use crate::{
    codec::{encode_base64, pack_words},
    Header, OmgError, Result, WriteMode,
};

const DEFAULT_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Builds the final container from a drained temp store.
///
/// # Examples
///
/// ```rust
/// use omgfile::{ContainerWriter, Header, Omics, ReadMode, Reader, Summary, TempStore, WriteMode};
///
/// # fn main() -> omgfile::Result<()> {
/// let dir = tempfile::tempdir()?;
/// let temp = TempStore::create(dir.path(), "empty")?;
/// let header = Header::new(WriteMode::Yaml, "in.fastq", "fastq", 0.001, Summary::empty(Omics::Genomics));
///
/// let path = dir.path().join("empty.omg");
/// ContainerWriter::new(WriteMode::Yaml).assemble(temp, Vec::new(), &header, &path)?;
///
/// let reader = Reader::open(&path, ReadMode::Disk)?;
/// assert_eq!(reader.entry_number(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ContainerWriter {
    mode: WriteMode,
}

impl ContainerWriter {
    pub fn new(mode: WriteMode) -> Self {
        Self { mode }
    }

    pub fn write_mode(&self) -> WriteMode {
        self.mode
    }

    /// Writes the container to `output` and deletes the temp file.
    ///
    /// # Errors
    ///
    /// Returns [`OmgError::Integrity`] on duplicate record ids or when the
    /// header disagrees with the entries, [`OmgError::Precondition`] when a
    /// length does not fit the `u32` offset table, and I/O errors. A partial
    /// output file is removed on failure.
    pub fn assemble(
        &self,
        temp: TempStore,
        offsets: Vec<OffsetEntry>,
        header: &Header,
        output: &Path,
    ) -> Result<()> {
        let temp_path = temp.finish()?;
        let result = self.write_container(&temp_path, offsets, header, output);
        remove_temp(&temp_path);
        if result.is_err() && output.exists() {
            if let Err(e) = std::fs::remove_file(output) {
                debug!(error = %e, "could not remove partial container");
            }
        }
        result
    }

    fn write_container(
        &self,
        temp_path: &Path,
        offsets: Vec<OffsetEntry>,
        header: &Header,
        output: &Path,
    ) -> Result<()> {
        header.validate()?;
        if header.write_mode != self.mode {
            return Err(OmgError::integrity(format!(
                "header write mode {} differs from writer mode {}",
                header.write_mode, self.mode
            )));
        }
        if header.entry_count != offsets.len() as u64 {
            return Err(OmgError::integrity(format!(
                "header declares {} entries but {} were persisted",
                header.entry_count,
                offsets.len()
            )));
        }
        let offsets = sort_offsets(offsets)?;

        let header_bytes = header.to_bytes();
        let mut table = Vec::with_capacity(offsets.len() + 1);
        table.push(table_len(header_bytes.len() as u64, "header")?);
        for entry in &offsets {
            table.push(table_len(entry.byte_len, "entry")?);
        }

        let mut src = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, File::open(temp_path)?);
        let mut out = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, File::create(output)?);
        out.write_all(&header_bytes)?;

        let mut pos = 0u64;
        let mut buffer = Vec::new();
        for entry in &offsets {
            if entry.temp_offset != pos {
                src.seek(SeekFrom::Start(entry.temp_offset))?;
            }
            buffer.resize(entry.byte_len as usize, 0);
            src.read_exact(&mut buffer)?;
            out.write_all(&buffer)?;
            pos = entry.temp_offset + entry.byte_len;
        }

        let block = offset_block(&table, self.mode);
        out.write_all(block.as_bytes())?;
        out.write_all(footer(block.len(), self.mode)?.as_bytes())?;
        out.flush()?;

        info!(
            entries = offsets.len(),
            path = %output.display(),
            "container assembled"
        );
        Ok(())
    }
}

fn table_len(len: u64, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        OmgError::precondition(format!(
            "{} of {} bytes does not fit the u32 offset table",
            what, len
        ))
    })
}

/// Sorts by record id and rejects duplicates.
pub fn sort_offsets(mut offsets: Vec<OffsetEntry>) -> Result<Vec<OffsetEntry>> {
    offsets.sort_unstable_by_key(|o| o.record_id);
    if let Some(pair) = offsets.windows(2).find(|w| w[0].record_id == w[1].record_id) {
        return Err(OmgError::integrity(format!(
            "record id {} was persisted twice",
            pair[0].record_id
        )));
    }
    Ok(offsets)
}

/// Renders the offset block for `table`.
pub fn offset_block(table: &[u32], mode: WriteMode) -> String {
    let b64 = encode_base64(&pack_words(table));
    match mode {
        WriteMode::Json => format!(" \"offsetArr\": \"{}\",\n", b64),
        WriteMode::Binary | WriteMode::Yaml => format!("offsetArr: {}\n", b64),
    }
}

/// Renders the fixed-size footer; the JSON footer also closes the document.
pub fn footer(block_len: usize, mode: WriteMode) -> Result<String> {
    let (text, tail) = match mode {
        WriteMode::Json => (format!(" \"offsetLen\":{}", block_len), "\n}"),
        WriteMode::Yaml => (format!("offsetLen: {}", block_len), "\n"),
        WriteMode::Binary => (format!("offsetLen:{}", block_len), "\n"),
    };
    let width = FOOTER_SIZE - tail.len();
    if text.len() > width {
        return Err(OmgError::precondition(format!(
            "offset block length {} does not fit the footer",
            block_len
        )));
    }
    Ok(format!("{:<width$}{}", text, tail, width = width))
}
