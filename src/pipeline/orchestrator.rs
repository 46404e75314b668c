//! Three-stage conversion pipeline.
//!
//! ```text
//! source --RecordQueue--> [A: fetch] --work--> [B: encode x N] --done--> [C: sink -> temp]
//! ```
//!
//! Every channel is bounded. A failing stage drops its channel ends, which
//! unblocks and stops its neighbours; the run reports the first error that is
//! not such a closed-channel symptom. Entry order is restored after the drain
//! by [`ContainerWriter::assemble`].

use std::{
    collections::BTreeMap,
    fmt,
    path::PathBuf,
    sync::{
        mpsc::{sync_channel, Receiver, SyncSender},
        Arc, Mutex,
    },
    thread,
};

use tracing::{debug, info, warn};

use super::{
    queue::{QueueReader, RecordQueue},
    source::{RecordSource, SourceDescriptor},
};
use crate::{
    domain,
    io::{ContainerWriter, OffsetEntry, TempStore},
    Config, Header, ImzmlMode, Message, OmgError, Record, Result, Summary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Fetching,
    Transforming,
    Draining,
    Completed,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    /// Path of the finished container.
    pub path: PathBuf,
    /// Entries written to the container.
    pub entries: u64,
    /// Records dropped as empty.
    pub dropped: u64,
    pub header: Header,
}

/// Stage B output for one record.
struct Encoded {
    id: u32,
    /// Rendered entry, `None` when the record was empty.
    bytes: Option<Vec<u8>>,
    /// Intensity count of a spectrum that relies on the header m/z axis.
    axis_points: Option<usize>,
}

/// Stage C output.
#[derive(Debug, Default)]
struct Persisted {
    offsets: Vec<OffsetEntry>,
    dropped: u64,
    /// Intensity count of axis-relying spectra, mapped to the first id seen.
    axis_points: BTreeMap<usize, u32>,
}

/// Drives a [`RecordSource`] through encode and persistence into one container.
///
/// # Examples
///
/// ```rust,no_run
/// use omgfile::{Config, IterSource, Omics, Pipeline, Record, Scan, SourceDescriptor};
///
/// # fn main() -> omgfile::Result<()> {
/// let scans = (0..100u32).map(|i| {
///     Record::Proteomics(Scan {
///         index: i,
///         mz: (0..20).map(|p| 100.0 + p as f64).collect(),
///         intensity: vec![10.0; 20],
///         ..Default::default()
///     })
/// });
/// let descriptor = SourceDescriptor::new("run.raw", "raw", Omics::Proteomics);
/// let mut source = IterSource::new(descriptor, scans);
///
/// let mut pipeline = Pipeline::new(Config::default().with_output_dir("/tmp"));
/// let report = pipeline.run(&mut source)?;
/// println!("wrote {} entries to {}", report.entries, report.path.display());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    config: Config,
    state: Arc<Mutex<PipelineState>>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(PipelineState::Idle)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(PipelineState::Failed)
    }

    /// Converts every record of `source` into `<output_dir>/<stem>.omg`.
    ///
    /// # Errors
    ///
    /// Any stage error aborts the run. The temp file is removed and no
    /// container is written.
    pub fn run<S: RecordSource>(&mut self, source: &mut S) -> Result<PipelineReport> {
        self.config.validate()?;
        let descriptor = source.descriptor();
        let stem = descriptor.stem();
        let expected = source.expected_records();
        let temp = TempStore::create(&self.config.output_dir, &stem)?;

        info!(
            parent = %descriptor.parent_file,
            omics = %descriptor.omics,
            workers = self.config.worker_threads(),
            "starting conversion"
        );
        transition(&self.state, PipelineState::Fetching);

        let (temp, outcome) = self.run_stages(source, temp, expected);
        let persisted = match outcome {
            Ok(done) => done,
            Err(e) => {
                transition(&self.state, PipelineState::Failed);
                temp.discard();
                return Err(e);
            }
        };

        let dropped = persisted.dropped;
        let result = self.assemble(source, &descriptor, temp, persisted, &stem);
        match result {
            Ok((path, header)) => {
                transition(&self.state, PipelineState::Completed);
                let entries = header.entry_count;
                info!(entries, dropped, path = %path.display(), "conversion complete");
                Ok(PipelineReport {
                    path,
                    entries,
                    dropped,
                    header,
                })
            }
            Err(e) => {
                transition(&self.state, PipelineState::Failed);
                Err(e)
            }
        }
    }

    fn assemble<S: RecordSource>(
        &self,
        source: &mut S,
        descriptor: &SourceDescriptor,
        temp: TempStore,
        persisted: Persisted,
        stem: &str,
    ) -> Result<(PathBuf, Header)> {
        let summary = source.finish();
        if summary.omics() != descriptor.omics {
            temp.discard();
            return Err(OmgError::integrity(format!(
                "source summary is {} but the descriptor says {}",
                summary.omics(),
                descriptor.omics
            )));
        }
        if let Err(e) = check_continuous_axis(&summary, &persisted.axis_points) {
            temp.discard();
            return Err(e);
        }
        let offsets = persisted.offsets;
        let mut header = Header::new(
            self.config.write_mode,
            descriptor.parent_file.clone(),
            descriptor.parent_format.clone(),
            self.config.mz_precision,
            summary,
        );
        header.entry_count = offsets.len() as u64;

        let path = self.config.output_dir.join(format!("{}.omg", stem));
        ContainerWriter::new(self.config.write_mode).assemble(temp, offsets, &header, &path)?;
        Ok((path, header))
    }

    /// Runs stages A to C to completion; hands the temp store back either way.
    fn run_stages<S: RecordSource>(
        &self,
        source: &mut S,
        mut temp: TempStore,
        expected: Option<u64>,
    ) -> (TempStore, Result<Persisted>) {
        let omics = source.descriptor().omics;
        let workers = self.config.worker_threads();
        let capacity = self.config.queue_capacity();
        let config = &self.config;
        let state = &self.state;

        let (queue_writer, queue_reader) = RecordQueue::bounded(capacity);
        let (work_tx, work_rx) = sync_channel::<Record>(capacity);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (done_tx, done_rx) = sync_channel::<Result<Encoded>>(capacity);

        let outcome = thread::scope(|scope| {
            let producer = scope.spawn(move || -> Result<()> {
                source.produce(&queue_writer)?;
                queue_writer.finish()
            });

            let fetcher = scope.spawn(move || fetch(queue_reader, work_tx, omics, state));

            let encoders: Vec<_> = (0..workers)
                .map(|tid| {
                    let work_rx = Arc::clone(&work_rx);
                    let done_tx = done_tx.clone();
                    scope.spawn(move || transform(tid, work_rx, done_tx, config))
                })
                .collect();
            drop(work_rx);
            drop(done_tx);

            // Stage C on the calling thread
            let sink = persist(done_rx, &mut temp, expected);

            let mut results = vec![sink.map(Some)];
            results.push(join(producer).map(|_| None));
            results.push(join(fetcher).map(|_| None));
            for handle in encoders {
                results.push(join(handle).map(|_| None));
            }
            pick_outcome(results)
        });
        (temp, outcome)
    }
}

fn transition(state: &Mutex<PipelineState>, to: PipelineState) {
    if let Ok(mut current) = state.lock() {
        let from = *current;
        if from != to {
            info!(from = %from, to = %to, "pipeline state");
            *current = to;
        }
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(OmgError::Process("pipeline stage panicked".into())))
}

/// First root-cause error wins; closed-channel errors only when nothing else failed.
fn pick_outcome<T>(results: Vec<Result<Option<T>>>) -> Result<T> {
    let mut value = None;
    let mut closed = None;
    let mut root = None;
    for result in results {
        match result {
            Ok(Some(v)) => value = Some(v),
            Ok(None) => {}
            Err(e) if e.is_pipeline_closed() => {
                closed.get_or_insert(e);
            }
            Err(e) => {
                if root.is_none() {
                    root = Some(e);
                } else {
                    debug!(error = %e, "suppressed secondary pipeline error");
                }
            }
        }
    }
    match (root, closed, value) {
        (Some(e), _, _) | (None, Some(e), _) => Err(e),
        (None, None, Some(v)) => Ok(v),
        (None, None, None) => Err(OmgError::PipelineClosed("sink produced no result")),
    }
}

/// Spectra without their own m/z array need a continuous header axis of
/// matching length, or the container could never be decoded.
fn check_continuous_axis(summary: &Summary, axis_points: &BTreeMap<usize, u32>) -> Result<()> {
    let Some((&points, &id)) = axis_points.iter().next() else {
        return Ok(());
    };
    let axis = match summary {
        Summary::Metabolomics(m) if m.mode == ImzmlMode::Continuous => m.continuous_mz.as_ref(),
        _ => None,
    };
    let Some(axis) = axis else {
        return Err(OmgError::integrity(format!(
            "spectrum {} has no m/z array and the header has no continuous m/z axis",
            id
        )));
    };
    match axis_points.iter().find(|&(&n, _)| n != axis.len()) {
        Some((&n, &id)) => Err(OmgError::integrity(format!(
            "spectrum {} holds {} intensities but the continuous axis has {} points",
            id,
            n,
            axis.len()
        ))),
        None => {
            debug!(points, "continuous spectra match the header axis");
            Ok(())
        }
    }
}

/// Stage A: moves records from the source queue to the encode workers.
fn fetch(
    queue: QueueReader,
    work: SyncSender<Record>,
    omics: crate::Omics,
    state: &Mutex<PipelineState>,
) -> Result<()> {
    let mut dispatched = 0u64;
    loop {
        match queue.pop()? {
            Message::Data(record) => {
                if record.omics() != omics {
                    return Err(OmgError::InvalidRecord {
                        id: record.id(),
                        reason: format!("{} record in a {} stream", record.omics(), omics),
                    });
                }
                if dispatched == 0 {
                    transition(state, PipelineState::Transforming);
                }
                work.send(record)
                    .map_err(|_| OmgError::PipelineClosed("work channel"))?;
                dispatched += 1;
            }
            Message::EndOfStream => {
                debug!(dispatched, "end of stream");
                transition(state, PipelineState::Draining);
                return Ok(());
            }
        }
    }
}

/// Stage B: encodes records until the work channel closes.
fn transform(
    tid: usize,
    work: Arc<Mutex<Receiver<Record>>>,
    done: SyncSender<Result<Encoded>>,
    config: &Config,
) -> Result<()> {
    let mut encoded = 0u64;
    loop {
        let next = {
            let rx = work
                .lock()
                .map_err(|_| OmgError::PipelineClosed("work channel lock poisoned"))?;
            rx.recv()
        };
        let Ok(record) = next else {
            debug!(tid, encoded, "encoder finished");
            return Ok(());
        };
        let id = record.id();
        let axis_points = match &record {
            Record::Metabolomics(s) if s.mz.is_none() => Some(s.intensity.len()),
            _ => None,
        };
        let result = domain::encode(&record, config).and_then(|entry| {
            let bytes = entry
                .map(|entry| entry.to_bytes(config.write_mode))
                .transpose()?;
            Ok(Encoded {
                id,
                bytes,
                axis_points,
            })
        });
        let failed = result.is_err();
        match done.send(result) {
            // the sink reports the error and shuts the pipeline down
            Ok(()) if failed => return Ok(()),
            Ok(()) => encoded += 1,
            // sink gone: report the encode error ourselves if there was one
            Err(std::sync::mpsc::SendError(Err(e))) => return Err(e),
            Err(_) => return Err(OmgError::PipelineClosed("done channel")),
        }
    }
}

/// Stage C: appends encoded entries to the temp store in arrival order.
fn persist(
    done: Receiver<Result<Encoded>>,
    temp: &mut TempStore,
    expected: Option<u64>,
) -> Result<Persisted> {
    let mut persisted = Persisted::default();
    let mut seen = 0u64;
    let mut last_decile = 0u64;

    for message in done {
        let encoded = message?;
        match encoded.bytes {
            Some(bytes) => {
                persisted.offsets.push(temp.append(encoded.id, &bytes)?);
                if let Some(points) = encoded.axis_points {
                    persisted.axis_points.entry(points).or_insert(encoded.id);
                }
            }
            None => persisted.dropped += 1,
        }
        seen += 1;
        if let Some(total) = expected.filter(|t| *t > 0) {
            let decile = (seen * 10 / total).min(10);
            if decile > last_decile {
                last_decile = decile;
                info!(progress = decile * 10, "{}% of records persisted", decile * 10);
            }
        }
    }
    if let Some(total) = expected {
        if total != seen {
            warn!(expected = total, seen, "source record count differs from its estimate");
        }
    }
    if persisted.dropped > 0 {
        debug!(dropped = persisted.dropped, "empty records dropped");
    }
    Ok(persisted)
}
