//! # omgfile - Compact Containers for Omics Data
//!
//! `omgfile` converts genomic read batches, proteomics scans and imaging
//! metabolomics spectra into a single write-once `.omg` container with O(1)
//! random access to every entry, and reads it back.
//!
//! Numeric arrays are turned into non-decreasing integer sequences, stored with
//! the Elias-Fano succinct code and compressed with zstd. Conversion runs as a
//! three-stage threaded pipeline: a fetch stage pulls records from a
//! [`RecordSource`], a pool of workers encodes them, and a single sink appends
//! them to a temp file. Entries are put back in id order once the pipeline
//! drains.
//!
//! ## Format Specification
//!
//! ```text
//! [header][entry_0]..[entry_{N-1}][offset block][footer: 64 bytes]
//! ```
//!
//! ### Header
//! A `BasicInfo` block of key/value pairs: omics type, write mode, date,
//! parent file and format, entry count, m/z precision and per-omics metadata.
//! Rendered as YAML-like text for the `binary` and `yaml` write modes and as the
//! opening of a JSON object for `json`.
//!
//! ### Entries
//! Fixed typed fields followed by named compressed segments. `binary` entries
//! are little-endian fields, one `u32` length per segment, then segment bytes;
//! text modes carry segments as Base64 strings.
//!
//! ### Offset block and footer
//! - Offset block: Base64 of `[header_len, len_0 .. len_{N-1}]` as `u32` LE
//! - Footer: exactly 64 bytes holding `offsetLen:<offset block length>`
//!
//! The footer alone locates the offset block, so opening a container never
//! scans it.
//!
//! ## Basic Usage
//!
//! ### Converting and Reading Records
//!
//! ```rust
//! use omgfile::{
//!     Config, FastqRead, IterSource, Omics, Pipeline, ReadBatch, ReadMode, Reader, Record,
//!     SourceDescriptor, WriteMode,
//! };
//!
//! # fn main() -> omgfile::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let config = Config::default()
//!     .with_output_dir(dir.path())
//!     .with_write_mode(WriteMode::Binary)
//!     .with_threads(2);
//!
//! let batches: Vec<Record> = (0..3u32)
//!     .map(|i| {
//!         Record::Genomics(ReadBatch {
//!             index: i,
//!             first_read: 2 * i,
//!             reads: vec![
//!                 FastqRead::new(format!("run:1:{}", 2 * i), "ACGTACGT", "IIIIFFFF"),
//!                 FastqRead::new(format!("run:1:{}", 2 * i + 1), "TTGCAACG", "IIIIIIII"),
//!             ],
//!         })
//!     })
//!     .collect();
//!
//! let descriptor = SourceDescriptor::new("run.fastq", "fastq", Omics::Genomics);
//! let mut source = IterSource::new(descriptor, batches.clone());
//! let report = Pipeline::new(config).run(&mut source)?;
//! assert_eq!(report.entries, 3);
//!
//! let reader = Reader::open(&report.path, ReadMode::Disk)?;
//! assert_eq!(reader.entry_number(), 3);
//! assert_eq!(reader.entry(1)?, batches[1]);
//! # Ok(())
//! # }
//! ```
//!
//! ### The Elias-Fano Codec
//!
//! ```rust
//! use omgfile::elias_fano;
//!
//! # fn main() -> omgfile::Result<()> {
//! let code = elias_fano::encode(&[2u32, 2, 5, 7, 7, 7, 10])?;
//! assert_eq!(elias_fano::decode(&code)?, vec![2, 2, 5, 7, 7, 7, 10]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Parallel Decoding
//!
//! ```rust,no_run
//! use omgfile::{EntryProcessor, ParallelReader, ReadMode, Reader, Record};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Clone, Default)]
//! struct PeakCounter {
//!     local_count: u64,
//!     global_count: Arc<Mutex<u64>>,
//! }
//!
//! impl EntryProcessor for PeakCounter {
//!     fn process_entry(&mut self, _id: usize, record: Record) -> omgfile::Result<()> {
//!         if let Record::Proteomics(scan) = record {
//!             self.local_count += scan.mz.len() as u64;
//!         }
//!         Ok(())
//!     }
//!
//!     fn on_batch_complete(&mut self) -> omgfile::Result<()> {
//!         let mut guard = self.global_count.lock().unwrap();
//!         *guard += self.local_count;
//!         self.local_count = 0;
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> omgfile::Result<()> {
//! let reader = Reader::open("run.omg", ReadMode::Memory)?;
//! reader.process_parallel(PeakCounter::default(), 0)?; // 0 = use all available cores
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, OmgError>`:
//!
//! ```rust
//! use omgfile::{OmgError, ReadMode, Reader};
//!
//! # fn main() -> omgfile::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("broken.omg");
//! std::fs::write(&path, b"not a container")?;
//!
//! match Reader::open(&path, ReadMode::Disk) {
//!     Err(OmgError::Integrity(reason)) => println!("corrupt container: {}", reason),
//!     Err(e) => println!("Other error: {}", e),
//!     Ok(_) => unreachable!(),
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
mod config;
mod constructs;
pub mod domain;
mod error;
mod io;
mod parallel;
mod pipeline;

pub use codec::elias_fano;
pub use config::{Config, ReadMode, WriteMode, DEFAULT_MIN_PEAKS, DEFAULT_MZ_PRECISION};
pub use constructs::{
    EncodedEntry, EntrySchema, FastqRead, FieldKind, FieldValue, GenomicsSummary, Header,
    ImzmlMode, Instrument, Message, MetabolomicsSummary, Omics, Position, ProteomicsSummary,
    ReadBatch, Record, Scan, Spectrum, Summary,
};
pub use domain::DecodeContext;
pub use error::{IntoOmgError, OmgError, Result};
pub use io::{
    read_collection, ContainerWriter, Entries, EntryTable, MmapSource, OffsetEntry, Reader,
    TempStore, FOOTER_SIZE,
};
pub use parallel::{EntryProcessor, ParallelReader};
pub use pipeline::{
    IterSource, Pipeline, PipelineReport, PipelineState, QueueReader, QueueWriter, RecordQueue,
    RecordSource, SourceDescriptor,
};
