pub mod entry;
pub mod header;
pub mod record;

pub use entry::{EncodedEntry, EntrySchema, FieldKind, FieldValue};
pub use header::{
    GenomicsSummary, Header, ImzmlMode, Instrument, MetabolomicsSummary, ProteomicsSummary,
    Summary,
};
pub use record::{FastqRead, Message, Omics, Position, ReadBatch, Record, Scan, Spectrum};
