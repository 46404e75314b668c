//! Random-access reader for `.omg` containers.
//!
//! Opening a container touches three regions only: the 64-byte footer, the
//! offset block it points at, and the header. Everything else is read on
//! demand by [`Reader::entry`].

use std::{
    borrow::Cow,
    fs::File,
    io::{Read, Seek, SeekFrom},
    ops::Range,
    path::{Path, PathBuf},
    sync::Mutex,
    thread,
};

use tracing::debug;

use super::{mmap::MmapSource, FOOTER_SIZE};
use crate::{
    codec::{decode_base64, unpack_words},
    domain::{self, DecodeContext},
    parallel::{EntryProcessor, ParallelReader},
    EncodedEntry, Header, OmgError, Omics, ReadMode, Record, Result,
};

/// Entries handed to a processor between two `on_batch_complete` calls.
pub const BATCH_SIZE: usize = 1024;

/// Absolute byte ranges of the header and every entry.
///
/// Slot 0 is the header, slot `i + 1` is entry `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTable {
    bounds: Vec<u64>,
}

impl EntryTable {
    /// Builds the table from the decoded `[header_len, len_0 ..]` lengths.
    pub fn from_lengths(lengths: &[u32]) -> Result<Self> {
        if lengths.is_empty() {
            return Err(OmgError::integrity("offset table is empty"));
        }
        let mut bounds = Vec::with_capacity(lengths.len() + 1);
        let mut total = 0u64;
        bounds.push(total);
        for &len in lengths {
            total += u64::from(len);
            bounds.push(total);
        }
        Ok(Self { bounds })
    }

    pub fn entry_count(&self) -> usize {
        self.bounds.len() - 2
    }

    pub fn header_range(&self) -> Range<u64> {
        self.bounds[0]..self.bounds[1]
    }

    pub fn entry_range(&self, id: usize) -> Option<Range<u64>> {
        if id >= self.entry_count() {
            return None;
        }
        Some(self.bounds[id + 1]..self.bounds[id + 2])
    }

    /// Offset right after the last entry, where the offset block starts.
    pub fn end(&self) -> u64 {
        self.bounds[self.bounds.len() - 1]
    }
}

enum Backing {
    /// One handle per reader; seek and read happen under the lock.
    Disk { path: PathBuf, file: Mutex<File> },
    Memory(MmapSource),
}

impl Backing {
    fn open(path: &Path, mode: ReadMode) -> Result<Self> {
        Ok(match mode {
            ReadMode::Disk => Backing::Disk {
                path: path.to_path_buf(),
                file: Mutex::new(File::open(path)?),
            },
            ReadMode::Memory => Backing::Memory(MmapSource::open(path)?),
        })
    }

    /// A backing for another thread: a fresh handle on disk, a shared map in memory.
    fn fork(&self) -> Result<Self> {
        Ok(match self {
            Backing::Disk { path, .. } => Backing::Disk {
                path: path.clone(),
                file: Mutex::new(File::open(path)?),
            },
            Backing::Memory(map) => Backing::Memory(map.clone()),
        })
    }

    fn size(&self) -> Result<u64> {
        match self {
            Backing::Disk { file, .. } => {
                let file = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                Ok(file.metadata()?.len())
            }
            Backing::Memory(map) => Ok(map.len() as u64),
        }
    }

    fn read(&self, range: Range<u64>) -> Result<Cow<'_, [u8]>> {
        match self {
            Backing::Disk { file, .. } => {
                let len = usize::try_from(range.end - range.start)
                    .map_err(|_| OmgError::integrity("entry does not fit in memory"))?;
                let mut buffer = vec![0u8; len];
                // a poisoned lock still guards a usable handle; every read seeks first
                let mut file = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                file.seek(SeekFrom::Start(range.start))?;
                file.read_exact(&mut buffer)?;
                Ok(Cow::Owned(buffer))
            }
            Backing::Memory(map) => map.slice(range).map(Cow::Borrowed),
        }
    }
}

/// Reader for a finished container.
///
/// # Examples
///
/// ```rust
/// use omgfile::{
///     Config, IterSource, Omics, Pipeline, ReadMode, Reader, Record, Scan, SourceDescriptor,
/// };
///
/// # fn main() -> omgfile::Result<()> {
/// let dir = tempfile::tempdir()?;
/// let config = Config::default().with_output_dir(dir.path()).with_min_peaks(1);
///
/// let scans = (0..4u32).map(|i| {
///     Record::Proteomics(Scan {
///         index: i,
///         mz: vec![100.0, 200.0],
///         intensity: vec![4.0, 9.0],
///         ..Default::default()
///     })
/// });
/// let descriptor = SourceDescriptor::new("run.raw", "raw", Omics::Proteomics);
/// let report = Pipeline::new(config).run(&mut IterSource::new(descriptor, scans))?;
///
/// let reader = Reader::open(&report.path, ReadMode::Memory)?;
/// assert_eq!(reader.entry_number(), 4);
/// for record in reader.entries() {
///     assert_eq!(record?.omics(), Omics::Proteomics);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Reader {
    backing: Backing,
    mode: ReadMode,
    header: Header,
    table: EntryTable,
    ctx: DecodeContext,
}

impl Reader {
    /// Opens a container and validates its footer, offset table and header.
    ///
    /// # Errors
    ///
    /// Returns [`OmgError::Integrity`] if the file is shorter than the footer,
    /// the footer or offset block is malformed, the offsets do not add up to
    /// the offset block position, or the header entry count differs from the
    /// offset table.
    pub fn open<P: AsRef<Path>>(path: P, mode: ReadMode) -> Result<Self> {
        let path = path.as_ref();
        let backing = Backing::open(path, mode)?;

        let size = backing.size()?;
        let footer_size = FOOTER_SIZE as u64;
        if size < footer_size {
            return Err(OmgError::integrity(format!(
                "file is {} bytes, shorter than the {} byte footer",
                size, FOOTER_SIZE
            )));
        }
        let offset_len = parse_footer(&backing.read(size - footer_size..size)?)?;
        let block_start = (size - footer_size).checked_sub(offset_len).ok_or_else(|| {
            OmgError::integrity(format!(
                "offset block of {} bytes does not fit a {} byte file",
                offset_len, size
            ))
        })?;

        let lengths = parse_offset_block(&backing.read(block_start..size - footer_size)?)?;
        let table = EntryTable::from_lengths(&lengths)?;
        if table.end() != block_start {
            return Err(OmgError::integrity(format!(
                "offset table covers {} bytes but the offset block starts at {}",
                table.end(),
                block_start
            )));
        }

        let header = Header::parse(&backing.read(table.header_range())?)?;
        if header.entry_count != table.entry_count() as u64 {
            return Err(OmgError::integrity(format!(
                "header declares {} entries but the offset table holds {}",
                header.entry_count,
                table.entry_count()
            )));
        }
        let ctx = DecodeContext::from_header(&header);

        debug!(
            path = %path.display(),
            mode = %mode,
            entries = table.entry_count(),
            omics = %header.omics(),
            "container opened"
        );
        Ok(Self {
            backing,
            mode,
            header,
            table,
            ctx,
        })
    }

    /// Opens a container in disk mode.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, ReadMode::Disk)
    }

    /// A second reader over the same container, safe to move to another thread.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            backing: self.backing.fork()?,
            mode: self.mode,
            header: self.header.clone(),
            table: self.table.clone(),
            ctx: self.ctx.clone(),
        })
    }

    /// Number of entries, as declared by the header.
    pub fn entry_number(&self) -> usize {
        self.table.entry_count()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn omics(&self) -> Omics {
        self.header.omics()
    }

    pub fn read_mode(&self) -> ReadMode {
        self.mode
    }

    pub fn decode_context(&self) -> &DecodeContext {
        &self.ctx
    }

    pub fn entry_table(&self) -> &EntryTable {
        &self.table
    }

    /// The stored bytes of entry `id`, exactly as written.
    pub fn raw_entry(&self, id: usize) -> Result<Cow<'_, [u8]>> {
        let range = self.table.entry_range(id).ok_or(OmgError::InvalidIndex {
            idx: id,
            max: self.entry_number(),
        })?;
        self.backing.read(range)
    }

    /// Entry `id` parsed into fields and segments, still compressed.
    pub fn encoded_entry(&self, id: usize) -> Result<EncodedEntry> {
        let raw = self.raw_entry(id)?;
        let entry_id = u32::try_from(id).map_err(|_| OmgError::InvalidIndex {
            idx: id,
            max: self.entry_number(),
        })?;
        EncodedEntry::parse(
            &raw,
            self.header.write_mode,
            domain::schema(self.omics()),
            entry_id,
        )
    }

    /// Decodes entry `id` into a typed record.
    pub fn entry(&self, id: usize) -> Result<Record> {
        let entry = self.encoded_entry(id)?;
        domain::decode(&entry, self.omics(), &self.ctx)
    }

    /// Decodes every entry in id order.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            reader: self,
            next: 0,
        }
    }
}

/// Iterator over the decoded entries of a [`Reader`].
pub struct Entries<'a> {
    reader: &'a Reader,
    next: usize,
}

impl Iterator for Entries<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.reader.entry_number() {
            return None;
        }
        let record = self.reader.entry(self.next);
        self.next += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.reader.entry_number().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Entries<'_> {}

impl<'a> IntoIterator for &'a Reader {
    type Item = Result<Record>;
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries()
    }
}

impl ParallelReader for Reader {
    fn process_parallel<P: EntryProcessor + 'static>(
        &self,
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        let total = self.entry_number();
        if total == 0 {
            return Ok(());
        }
        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads.min(num_cpus::get())
        }
        .clamp(1, total);
        let per_thread = total / num_threads;
        let remainder = total % num_threads;

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(num_threads);
            for tid in 0..num_threads {
                let start = tid * per_thread;
                let end = if tid == num_threads - 1 {
                    start + per_thread + remainder
                } else {
                    start + per_thread
                };
                let mut thread_processor = processor.clone();
                thread_processor.set_tid(tid);
                handles.push(scope.spawn(move || -> Result<()> {
                    let reader = self.try_clone()?;
                    let mut batch_start = start;
                    while batch_start < end {
                        let batch_end = (batch_start + BATCH_SIZE).min(end);
                        for id in batch_start..batch_end {
                            thread_processor.process_entry(id, reader.entry(id)?)?;
                        }
                        thread_processor.on_batch_complete()?;
                        batch_start = batch_end;
                    }
                    Ok(())
                }));
            }

            let mut outcome = Ok(());
            for handle in handles {
                let result = handle
                    .join()
                    .unwrap_or_else(|_| Err(OmgError::Process("entry processor panicked".into())));
                if outcome.is_ok() {
                    outcome = result;
                }
            }
            outcome
        })
    }
}

/// Extracts `offsetLen` from the footer text.
pub(crate) fn parse_footer(bytes: &[u8]) -> Result<u64> {
    let malformed = || OmgError::integrity("footer holds no offsetLen value");
    let text = String::from_utf8_lossy(bytes);
    let at = text.find("offsetLen").ok_or_else(malformed)?;
    let rest = text[at + "offsetLen".len()..]
        .trim_start_matches(['"', ' '])
        .strip_prefix(':')
        .ok_or_else(malformed)?
        .trim_start_matches(['"', ' ']);
    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .map_or(rest, |end| &rest[..end]);
    digits.parse().map_err(|_| malformed())
}

/// Decodes the `offsetArr` block into `[header_len, len_0 ..]`.
pub(crate) fn parse_offset_block(bytes: &[u8]) -> Result<Vec<u32>> {
    let malformed = || OmgError::integrity("offset block holds no offsetArr value");
    let text = std::str::from_utf8(bytes)
        .map_err(|e| OmgError::integrity(format!("offset block is not UTF-8: {}", e)))?;
    let at = text.find("offsetArr").ok_or_else(malformed)?;
    let rest = &text[at + "offsetArr".len()..];
    let colon = rest.find(':').ok_or_else(malformed)?;
    let value = rest[colon + 1..]
        .trim()
        .trim_end_matches(',')
        .trim()
        .trim_matches('"');
    unpack_words::<u32>(&decode_base64(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        io::{
            writer::{footer, offset_block},
            ContainerWriter, TempStore,
        },
        Config, Scan, Summary, WriteMode,
    };
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn scan(index: u32) -> Scan {
        Scan {
            index,
            rt: index as f32 * 0.5,
            ms_level: 1 + index % 2,
            mz: vec![100.0 + index as f64, 150.5, 300.25],
            intensity: vec![4.0, 25.0, (index as f64 + 1.0).powi(2)],
            ..Default::default()
        }
    }

    fn build(dir: &Path, mode: WriteMode, count: u32) -> PathBuf {
        let config = Config::default().with_min_peaks(1).with_write_mode(mode);
        let mut temp = TempStore::create(dir, "scans").unwrap();
        let mut offsets = Vec::new();
        // arrival order differs from id order
        for id in (0..count).rev() {
            let entry = domain::encode(&Record::Proteomics(scan(id)), &config)
                .unwrap()
                .unwrap();
            offsets.push(temp.append(id, &entry.to_bytes(mode).unwrap()).unwrap());
        }
        let mut header = Header::new(
            mode,
            "scans.raw",
            "raw",
            config.mz_precision,
            Summary::empty(Omics::Proteomics),
        );
        header.entry_count = count as u64;
        let path = dir.join(format!("scans_{}.omg", mode));
        ContainerWriter::new(mode)
            .assemble(temp, offsets, &header, &path)
            .unwrap();
        path
    }

    fn assert_scan(record: Record, id: u32) {
        let Record::Proteomics(got) = record else {
            panic!("expected a scan");
        };
        let want = scan(id);
        assert_eq!(got.index, want.index);
        assert_eq!(got.rt, want.rt);
        assert_eq!(got.ms_level, want.ms_level);
        assert_eq!(got.intensity, want.intensity);
        for (g, w) in got.mz.iter().zip(&want.mz) {
            assert!((g - w).abs() <= 0.0005);
        }
    }

    #[test]
    fn test_reader_roundtrip_all_modes() {
        let dir = tempfile::tempdir().unwrap();
        for write_mode in [WriteMode::Binary, WriteMode::Json, WriteMode::Yaml] {
            let path = build(dir.path(), write_mode, 5);
            assert!(!dir.path().join("scans.omg.tmp").exists());
            for read_mode in [ReadMode::Disk, ReadMode::Memory] {
                let reader = Reader::open(&path, read_mode).unwrap();
                assert_eq!(reader.read_mode(), read_mode);
                assert_eq!(reader.entry_number(), 5);
                assert_eq!(reader.header().write_mode, write_mode);
                assert_eq!(reader.omics(), Omics::Proteomics);
                for id in 0..5 {
                    assert_scan(reader.entry(id).unwrap(), id as u32);
                }
            }
        }
    }

    #[test]
    fn test_reader_iterator() {
        let dir = tempfile::tempdir().unwrap();
        let path = build(dir.path(), WriteMode::Binary, 7);
        let reader = Reader::from_path(&path).unwrap();
        let entries = reader.entries();
        assert_eq!(entries.len(), 7);
        for (id, record) in reader.entries().enumerate() {
            assert_scan(record.unwrap(), id as u32);
        }
        assert_eq!((&reader).into_iter().count(), 7);
    }

    #[test]
    fn test_reader_invalid_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = build(dir.path(), WriteMode::Yaml, 3);
        let reader = Reader::open(&path, ReadMode::Memory).unwrap();
        assert!(matches!(
            reader.entry(3),
            Err(OmgError::InvalidIndex { idx: 3, max: 3 })
        ));
        assert!(reader.raw_entry(usize::MAX).is_err());
    }

    #[test]
    fn test_entry_table_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = build(dir.path(), WriteMode::Binary, 4);
        let reader = Reader::open(&path, ReadMode::Disk).unwrap();
        let table = reader.entry_table();
        let size = std::fs::metadata(&path).unwrap().len();

        assert_eq!(table.header_range().start, 0);
        assert_eq!(
            table.entry_range(0).unwrap().start,
            table.header_range().end
        );
        for id in 1..4 {
            assert_eq!(
                table.entry_range(id).unwrap().start,
                table.entry_range(id - 1).unwrap().end
            );
        }
        assert!(table.end() < size - FOOTER_SIZE as u64);
    }

    #[test]
    fn test_reader_truncated_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.omg");
        std::fs::write(&path, b"offsetLen:3\n").unwrap();
        for mode in [ReadMode::Disk, ReadMode::Memory] {
            assert!(matches!(
                Reader::open(&path, mode),
                Err(OmgError::Integrity(_))
            ));
        }
    }

    #[test]
    fn test_reader_rejects_shifted_footer() {
        let dir = tempfile::tempdir().unwrap();
        let path = build(dir.path(), WriteMode::Yaml, 2);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(b"trailing");
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            Reader::open(&path, ReadMode::Disk),
            Err(OmgError::Integrity(_))
        ));
    }

    #[test]
    fn test_reader_entry_count_mismatch() {
        let mut header = Header::new(
            WriteMode::Yaml,
            "scans.raw",
            "raw",
            0.001,
            Summary::empty(Omics::Proteomics),
        );
        header.entry_count = 2;
        let config = Config::default().with_min_peaks(1).with_write_mode(WriteMode::Yaml);
        let entry = domain::encode(&Record::Proteomics(scan(0)), &config)
            .unwrap()
            .unwrap()
            .to_bytes(WriteMode::Yaml)
            .unwrap();

        let mut bytes = header.to_bytes();
        let table = [bytes.len() as u32, entry.len() as u32];
        bytes.extend_from_slice(&entry);
        let block = offset_block(&table, WriteMode::Yaml);
        bytes.extend_from_slice(block.as_bytes());
        bytes.extend_from_slice(footer(block.len(), WriteMode::Yaml).unwrap().as_bytes());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mismatch.omg");
        std::fs::write(&path, &bytes).unwrap();
        let err = Reader::open(&path, ReadMode::Memory).err().unwrap();
        assert!(matches!(err, OmgError::Integrity(msg) if msg.contains("declares 2")));
    }

    #[test]
    fn test_parse_footer() {
        for mode in [WriteMode::Binary, WriteMode::Json, WriteMode::Yaml] {
            let text = footer(987, mode).unwrap();
            assert_eq!(parse_footer(text.as_bytes()).unwrap(), 987);
        }
        assert!(parse_footer(b"offsetLen: \n").is_err());
        assert!(parse_footer(&[b' '; 64]).is_err());
    }

    #[test]
    fn test_parse_offset_block() {
        for mode in [WriteMode::Binary, WriteMode::Json, WriteMode::Yaml] {
            let block = offset_block(&[10, 0, 7], mode);
            assert_eq!(parse_offset_block(block.as_bytes()).unwrap(), vec![10, 0, 7]);
        }
        assert!(parse_offset_block(b"offsets: AQAAAA==\n").is_err());
        assert!(parse_offset_block(b"offsetArr: AQA=\n").is_err());
    }

    #[derive(Clone)]
    struct Counter {
        seen: Arc<AtomicUsize>,
        id_sum: Arc<AtomicUsize>,
        batches: Arc<AtomicUsize>,
        tid: Option<usize>,
    }

    impl EntryProcessor for Counter {
        fn process_entry(&mut self, id: usize, record: Record) -> Result<()> {
            assert_eq!(record.id() as usize, id);
            self.seen.fetch_add(1, Ordering::Relaxed);
            self.id_sum.fetch_add(id, Ordering::Relaxed);
            Ok(())
        }

        fn on_batch_complete(&mut self) -> Result<()> {
            self.batches.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn set_tid(&mut self, tid: usize) {
            self.tid = Some(tid);
        }

        fn get_tid(&self) -> Option<usize> {
            self.tid
        }
    }

    #[test]
    fn test_process_parallel_visits_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = build(dir.path(), WriteMode::Binary, 20);
        for mode in [ReadMode::Disk, ReadMode::Memory] {
            let reader = Reader::open(&path, mode).unwrap();
            let counter = Counter {
                seen: Arc::default(),
                id_sum: Arc::default(),
                batches: Arc::default(),
                tid: None,
            };
            reader.process_parallel(counter.clone(), 3).unwrap();
            assert_eq!(counter.seen.load(Ordering::Relaxed), 20);
            assert_eq!(counter.id_sum.load(Ordering::Relaxed), (0..20).sum::<usize>());
            assert!(counter.batches.load(Ordering::Relaxed) >= 1);
        }
    }

    #[derive(Clone)]
    struct Failing;

    impl EntryProcessor for Failing {
        fn process_entry(&mut self, id: usize, _record: Record) -> Result<()> {
            if id == 2 {
                return Err(OmgError::precondition("stop at entry 2"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_process_parallel_propagates_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = build(dir.path(), WriteMode::Json, 4);
        let reader = Reader::open(&path, ReadMode::Memory).unwrap();
        assert!(matches!(
            reader.process_parallel(Failing, 2),
            Err(OmgError::Precondition(_))
        ));
    }
}
