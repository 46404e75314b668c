//! Converts synthetic records into a container and reads it back.
//!
//! ```text
//! RUST_LOG=debug cargo run --example synthetic -- --omics Genomics --records 5000
//! ```

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use anyhow::{bail, Result};
use clap::Parser;
use omgfile::{
    Config, EntryProcessor, FastqRead, IterSource, Omics, ParallelReader, Pipeline, Position,
    ReadBatch, ReadMode, Reader, Record, Scan, SourceDescriptor, Spectrum, WriteMode,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[derive(Parser, Debug)]
#[command(about = "Round-trip synthetic omics records through an .omg container")]
struct Args {
    /// Genomics, Proteomics or Metabolomics
    #[arg(long, default_value = "Proteomics")]
    omics: Omics,

    /// Number of records to generate
    #[arg(long, default_value_t = 10_000)]
    records: u32,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// binary, json or yaml
    #[arg(long, default_value = "binary")]
    write_mode: WriteMode,

    /// disk or memory
    #[arg(long, default_value = "memory")]
    read_mode: ReadMode,

    /// Encode workers and read threads (0 = all cores)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,
}

fn random_batch(rng: &mut impl Rng, index: u32) -> Record {
    const BASES: &[u8] = b"ACGT";
    let reads = (0..64)
        .map(|i| {
            let n = index * 64 + i;
            let seq: Vec<u8> = (0..100).map(|_| BASES[rng.random_range(0..4)]).collect();
            let qual: Vec<u8> = (0..100).map(|_| rng.random_range(b'F'..=b'J')).collect();
            FastqRead::new(format!("SYN:1:{}:{}:{}", 1101 + n % 4, n, n * 7), seq, qual)
        })
        .collect();
    Record::Genomics(ReadBatch {
        index,
        first_read: index * 64,
        reads,
    })
}

fn random_scan(rng: &mut impl Rng, index: u32) -> Record {
    let peaks = rng.random_range(10..500);
    Record::Proteomics(Scan {
        index,
        rt: index as f32 * 0.1,
        ms_level: if index % 10 == 0 { 1 } else { 2 },
        precursor_mz: rng.random_range(300.0..1500.0),
        collision_energy: 30.0,
        charge: rng.random_range(1..5),
        mz: (0..peaks).map(|_| rng.random_range(100.0..2000.0)).collect(),
        intensity: (0..peaks).map(|_| rng.random_range(0.0..1e6)).collect(),
        mobility: None,
    })
}

fn random_spectrum(rng: &mut impl Rng, index: u32) -> Record {
    let peaks = rng.random_range(50..300);
    Record::Metabolomics(Spectrum {
        index,
        position: Position::xy((index % 100) as f32, (index / 100) as f32),
        mz: Some((0..peaks).map(|_| rng.random_range(100.0..1000.0)).collect()),
        intensity: (0..peaks).map(|_| rng.random_range(0.0..5e4)).collect(),
    })
}

#[derive(Clone, Default)]
struct Tally {
    local: u64,
    total: Arc<AtomicU64>,
}

impl EntryProcessor for Tally {
    fn process_entry(&mut self, _id: usize, _record: Record) -> omgfile::Result<()> {
        self.local += 1;
        Ok(())
    }

    fn on_batch_complete(&mut self) -> omgfile::Result<()> {
        self.total.fetch_add(self.local, Ordering::Relaxed);
        self.local = 0;
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::default()
        .with_output_dir(&args.output)
        .with_write_mode(args.write_mode)
        .with_threads(args.threads);

    let omics = args.omics;
    let mut rng = StdRng::seed_from_u64(u64::from(args.records));
    let records = (0..args.records).map(move |i| match omics {
        Omics::Genomics => random_batch(&mut rng, i),
        Omics::Proteomics => random_scan(&mut rng, i),
        Omics::Metabolomics => random_spectrum(&mut rng, i),
    });
    let descriptor = SourceDescriptor::new(
        format!("synthetic_{}.raw", omics.as_str().to_lowercase()),
        "synthetic",
        omics,
    );
    let mut source =
        IterSource::new(descriptor, records).with_expected_records(args.records as u64);

    let start = Instant::now();
    let report = Pipeline::new(config).run(&mut source)?;
    eprintln!(
        "wrote {} entries ({} dropped) to {} in {:.2?}",
        report.entries,
        report.dropped,
        report.path.display(),
        start.elapsed()
    );

    let start = Instant::now();
    let reader = Reader::open(&report.path, args.read_mode)?;
    let tally = Tally::default();
    reader.process_parallel(tally.clone(), args.threads)?;
    let decoded = tally.total.load(Ordering::Relaxed);
    eprintln!(
        "decoded {} entries in {:.2?} ({} mode)",
        decoded,
        start.elapsed(),
        args.read_mode
    );
    if decoded != report.entries {
        bail!("decoded {} entries, expected {}", decoded, report.entries);
    }
    Ok(())
}
