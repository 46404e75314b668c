//! The record source contract.
//!
//! Vendor parsers live outside this crate; they implement [`RecordSource`] and
//! push typed records into the queue handed to them.

use super::queue::QueueWriter;
use crate::{
    GenomicsSummary, MetabolomicsSummary, OmgError, Omics, ProteomicsSummary, Record, Result,
    Summary,
};

/// Where the records come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Input path as recorded in the header `parentFile` key.
    pub parent_file: String,
    /// Input format name, e.g. `fastq`, `raw`, `imzML`.
    pub parent_format: String,
    pub omics: Omics,
}

impl SourceDescriptor {
    pub fn new(parent_file: impl Into<String>, parent_format: impl Into<String>, omics: Omics) -> Self {
        Self {
            parent_file: parent_file.into(),
            parent_format: parent_format.into(),
            omics,
        }
    }

    /// File stem of the parent file, used to name the container.
    pub fn stem(&self) -> String {
        std::path::Path::new(&self.parent_file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "output".to_string())
    }
}

/// A producer of typed records.
///
/// `produce` runs on its own thread and must assign every record a unique id.
/// It must not send the end of stream itself; the pipeline does that once
/// `produce` returns `Ok`.
pub trait RecordSource: Send {
    fn descriptor(&self) -> SourceDescriptor;

    /// Number of records the source will emit, when known. Drives progress logging.
    fn expected_records(&self) -> Option<u64> {
        None
    }

    /// Pushes every record into `queue`.
    fn produce(&mut self, queue: &QueueWriter) -> Result<()>;

    /// Header summary, called after `produce` succeeded.
    fn finish(&mut self) -> Summary;
}

/// Adapts any iterator of records into a [`RecordSource`].
///
/// Without an explicit summary, one is derived from the records seen:
/// read count and uniform read length, scan count and retention time range,
/// or spectrum count.
pub struct IterSource<I> {
    descriptor: SourceDescriptor,
    records: Option<I>,
    expected: Option<u64>,
    summary: Option<Summary>,
    tally: Tally,
}

#[derive(Default)]
struct Tally {
    records: u64,
    reads: u64,
    read_length: Option<usize>,
    variable_length: bool,
    rt_range: Option<(f32, f32)>,
}

impl Tally {
    fn observe(&mut self, record: &Record) {
        self.records += 1;
        match record {
            Record::Genomics(batch) => {
                self.reads += batch.reads.len() as u64;
                for read in &batch.reads {
                    match self.read_length {
                        None => self.read_length = Some(read.seq.len()),
                        Some(len) if len != read.seq.len() => self.variable_length = true,
                        Some(_) => {}
                    }
                }
            }
            Record::Proteomics(scan) => {
                let (lo, hi) = self.rt_range.unwrap_or((scan.rt, scan.rt));
                self.rt_range = Some((lo.min(scan.rt), hi.max(scan.rt)));
            }
            Record::Metabolomics(_) => {}
        }
    }

    fn summary(&self, omics: Omics) -> Summary {
        match omics {
            Omics::Genomics => Summary::Genomics(GenomicsSummary {
                read_count: self.reads,
                read_length: if self.variable_length {
                    0
                } else {
                    self.read_length.and_then(|l| u32::try_from(l).ok()).unwrap_or(0)
                },
            }),
            Omics::Proteomics => {
                let (start_time, end_time) = self.rt_range.unwrap_or_default();
                Summary::Proteomics(ProteomicsSummary {
                    scan_count: self.records,
                    start_time,
                    end_time,
                    ..Default::default()
                })
            }
            Omics::Metabolomics => Summary::Metabolomics(MetabolomicsSummary {
                spectrum_count: self.records,
                ..Default::default()
            }),
        }
    }
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Record> + Send,
{
    pub fn new<T>(descriptor: SourceDescriptor, records: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            descriptor,
            records: Some(records.into_iter()),
            expected: None,
            summary: None,
            tally: Tally::default(),
        }
    }

    pub fn with_expected_records(mut self, expected: u64) -> Self {
        self.expected = Some(expected);
        self
    }

    /// Uses `summary` verbatim in the header.
    pub fn with_summary(mut self, summary: Summary) -> Self {
        self.summary = Some(summary);
        self
    }
}

impl<I> RecordSource for IterSource<I>
where
    I: Iterator<Item = Record> + Send,
{
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    fn expected_records(&self) -> Option<u64> {
        self.expected
    }

    fn produce(&mut self, queue: &QueueWriter) -> Result<()> {
        let records = self
            .records
            .take()
            .ok_or_else(|| OmgError::precondition("record source already drained"))?;
        for record in records {
            self.tally.observe(&record);
            queue.push(record)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Summary {
        self.summary
            .clone()
            .unwrap_or_else(|| self.tally.summary(self.descriptor.omics))
    }
}
