use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use omgfile::{
    Config, FastqRead, ImzmlMode, IterSource, MetabolomicsSummary, Omics, OmgError, Pipeline,
    PipelineReport, Position, ReadBatch, ReadMode, Reader, Record, Scan, SourceDescriptor,
    Spectrum, Summary, WriteMode, FOOTER_SIZE,
};
use rand::Rng;

const MODES: [WriteMode; 3] = [WriteMode::Binary, WriteMode::Json, WriteMode::Yaml];

fn synthetic_scans(count: u32) -> Vec<Record> {
    let mut rng = rand::rng();
    (0..count)
        .map(|index| {
            let peaks = rng.random_range(1..40);
            let mz = (0..peaks)
                .map(|_| rng.random_range(50_000..2_000_000) as f64 / 1000.0)
                .collect();
            let intensity = (0..peaks)
                .map(|_| (rng.random_range(1..3000u32) as f64).powi(2))
                .collect();
            Record::Proteomics(Scan {
                index,
                rt: index as f32 * 0.25,
                ms_level: 1 + index % 2,
                precursor_mz: 400.5,
                collision_energy: 27.0,
                charge: 2,
                mz,
                intensity,
                mobility: None,
            })
        })
        .collect()
}

fn convert(dir: &Path, config: Config, name: &str, records: Vec<Record>, omics: Omics) -> PipelineReport {
    let descriptor = SourceDescriptor::new(format!("{}.raw", name), "raw", omics);
    let config = config.with_output_dir(dir);
    Pipeline::new(config)
        .run(&mut IterSource::new(descriptor, records))
        .unwrap()
}

fn assert_same_scan(got: &Record, want: &Record) {
    let (Record::Proteomics(got), Record::Proteomics(want)) = (got, want) else {
        panic!("expected scans");
    };
    assert_eq!(got.index, want.index);
    assert_eq!(got.rt, want.rt);
    assert_eq!(got.ms_level, want.ms_level);
    assert_eq!(got.charge, want.charge);

    let mut peaks: Vec<(f64, f64)> = want.mz.iter().copied().zip(want.intensity.iter().copied()).collect();
    peaks.sort_by(|a, b| a.0.total_cmp(&b.0));
    assert_eq!(got.mz.len(), peaks.len());
    for (i, (mz, intensity)) in peaks.iter().enumerate() {
        assert!((got.mz[i] - mz).abs() <= 0.0005, "m/z {} vs {}", got.mz[i], mz);
        // intensities are perfect squares, so they survive the sqrt quantization
        if (got.mz[i] - mz).abs() < 1e-9 {
            assert_eq!(got.intensity[i], *intensity);
        }
    }
}

#[test]
fn test_roundtrip_every_write_and_read_mode() {
    let dir = tempfile::tempdir().unwrap();
    let records = synthetic_scans(40);
    for write_mode in MODES {
        let config = Config::default()
            .with_write_mode(write_mode)
            .with_min_peaks(1)
            .with_threads(3);
        let name = format!("run_{}", write_mode);
        let report = convert(dir.path(), config, &name, records.clone(), Omics::Proteomics);
        assert_eq!(report.entries, 40);
        assert_eq!(report.dropped, 0);
        assert!(!dir.path().join(format!("{}.omg.tmp", name)).exists());

        for read_mode in [ReadMode::Disk, ReadMode::Memory] {
            let reader = Reader::open(&report.path, read_mode).unwrap();
            assert_eq!(reader.entry_number(), records.len());
            assert_eq!(reader.header().write_mode, write_mode);
            for (id, want) in records.iter().enumerate() {
                assert_same_scan(&reader.entry(id).unwrap(), want);
            }
        }
    }
}

#[test]
fn test_footer_locates_offset_table() {
    let dir = tempfile::tempdir().unwrap();
    let records = synthetic_scans(12);
    for write_mode in MODES {
        let config = Config::default().with_write_mode(write_mode).with_min_peaks(1);
        let report = convert(dir.path(), config, &format!("footer_{}", write_mode), records.clone(), Omics::Proteomics);

        let bytes = std::fs::read(&report.path).unwrap();
        let footer = std::str::from_utf8(&bytes[bytes.len() - FOOTER_SIZE..]).unwrap();
        assert_eq!(footer.len(), 64);
        let digits: String = footer
            .split("offsetLen")
            .nth(1)
            .unwrap()
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        let offset_len: usize = digits.parse().unwrap();

        let block_start = bytes.len() - FOOTER_SIZE - offset_len;
        let block = std::str::from_utf8(&bytes[block_start..bytes.len() - FOOTER_SIZE]).unwrap();
        let b64 = block
            .split_once(':')
            .unwrap()
            .1
            .trim()
            .trim_end_matches(',')
            .trim_matches('"');
        let table: Vec<u32> = STANDARD
            .decode(b64)
            .unwrap()
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        assert_eq!(table.len(), records.len() + 1);
        let total: u64 = table.iter().map(|&l| l as u64).sum();
        assert_eq!(total, block_start as u64);
    }
}

#[test]
fn test_json_container_is_valid_json() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default().with_write_mode(WriteMode::Json).with_min_peaks(1);
    let report = convert(dir.path(), config, "doc", synthetic_scans(3), Omics::Proteomics);

    let bytes = std::fs::read(&report.path).unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(doc["BasicInfo"]["omics"], "Proteomics");
    assert_eq!(doc["BasicInfo"]["entryCount"], "3");
    assert!(doc["scan_0"]["RT"].is_number());
    assert!(doc["scan_2"]["mz_arr"].is_string());
    assert!(doc["offsetArr"].is_string());
    assert!(doc["offsetLen"].is_u64());
}

#[test]
fn test_yaml_container_is_valid_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default()
        .with_write_mode(WriteMode::Yaml)
        .with_min_peaks(1)
        .with_output_dir(dir.path());
    let descriptor = SourceDescriptor::new("run: #1.raw", "raw", Omics::Proteomics);
    let report = Pipeline::new(config)
        .run(&mut IterSource::new(descriptor, synthetic_scans(3)))
        .unwrap();

    let text = std::fs::read_to_string(&report.path).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
    assert_eq!(doc["BasicInfo"]["omics"].as_str(), Some("Proteomics"));
    assert_eq!(doc["BasicInfo"]["parentFile"].as_str(), Some("run: #1.raw"));
    assert!(doc["scan_0"]["RT"].is_number());
    assert!(doc["scan_2"]["mz_arr"].is_string());
    assert!(doc["offsetArr"].is_string());
    assert!(doc["offsetLen"].is_u64());

    let reader = Reader::open(&report.path, ReadMode::Disk).unwrap();
    assert_eq!(reader.header().parent_file, "run: #1.raw");
}

#[test]
fn test_shared_disk_reader_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default().with_min_peaks(1);
    let report = convert(dir.path(), config, "shared", synthetic_scans(200), Omics::Proteomics);
    let reader = Reader::open(&report.path, ReadMode::Disk).unwrap();
    let sequential: Vec<Record> = reader.entries().map(|r| r.unwrap()).collect();

    std::thread::scope(|scope| {
        for t in 0..8usize {
            let reader = &reader;
            let sequential = &sequential;
            scope.spawn(move || {
                // strided and reversed so threads seek across each other
                for round in 0..3 {
                    for id in (0..sequential.len()).rev().skip(t).step_by(3 + round) {
                        assert_eq!(reader.entry(id).unwrap(), sequential[id], "entry {}", id);
                        assert_eq!(
                            reader.raw_entry(id).unwrap(),
                            reader.raw_entry(id).unwrap()
                        );
                    }
                }
            });
        }
    });
}

#[test]
fn test_worker_count_does_not_change_entries() {
    let dir = tempfile::tempdir().unwrap();
    let records = synthetic_scans(60);
    let readers: Vec<Reader> = [1, 2, 8]
        .into_iter()
        .map(|threads| {
            let config = Config::default()
                .with_min_peaks(1)
                .with_threads(threads)
                .with_queue_capacity(4);
            let report = convert(dir.path(), config, &format!("workers_{}", threads), records.clone(), Omics::Proteomics);
            Reader::open(&report.path, ReadMode::Memory).unwrap()
        })
        .collect();

    for id in 0..records.len() {
        let first = readers[0].raw_entry(id).unwrap().into_owned();
        for reader in &readers[1..] {
            assert_eq!(reader.raw_entry(id).unwrap().as_ref(), first.as_slice());
        }
    }
}

#[test]
fn test_skip_zero_intensity_scan() {
    let dir = tempfile::tempdir().unwrap();
    let scan = Record::Proteomics(Scan {
        index: 0,
        mz: vec![100.001, 100.002, 100.050],
        intensity: vec![0.0, 50.0, 0.0],
        ..Default::default()
    });
    let config = Config::default().with_min_peaks(1);
    let report = convert(dir.path(), config, "skip", vec![scan], Omics::Proteomics);

    let reader = Reader::open(&report.path, ReadMode::Disk).unwrap();
    let Record::Proteomics(back) = reader.entry(0).unwrap() else {
        panic!("expected a scan");
    };
    assert_eq!(back.mz.len(), 1);
    assert!((back.mz[0] - 100.002).abs() < 1e-9);
    assert_eq!(back.intensity, vec![49.0]);
}

#[test]
fn test_small_scans_are_dropped_from_container() {
    let dir = tempfile::tempdir().unwrap();
    let mut records = synthetic_scans(5);
    records.push(Record::Proteomics(Scan {
        index: 5,
        mz: vec![1.0],
        intensity: vec![4.0],
        ..Default::default()
    }));
    // every synthetic scan has fewer than 40 peaks
    let config = Config::default().with_min_peaks(40);
    let report = convert(dir.path(), config, "dropped", records, Omics::Proteomics);
    assert_eq!(report.entries, 0);
    assert_eq!(report.dropped, 6);

    let reader = Reader::open(&report.path, ReadMode::Disk).unwrap();
    assert_eq!(reader.entry_number(), 0);
    assert!(matches!(reader.entry(0), Err(OmgError::InvalidIndex { .. })));
}

#[test]
fn test_genomics_batches_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let bases = [b'A', b'C', b'G', b'T'];
    let mut rng = rand::rng();
    let batches: Vec<Record> = (0..6u32)
        .map(|index| {
            let reads = (0..25u32)
                .map(|i| {
                    let n = index * 25 + i;
                    let seq: Vec<u8> = (0..50).map(|_| bases[rng.random_range(0..4)]).collect();
                    let qual: Vec<u8> = (0..50).map(|_| rng.random_range(b'#'..=b'I')).collect();
                    FastqRead::new(format!("SRR001:{}:{} length=50", n % 3, n), seq, qual)
                })
                .collect();
            Record::Genomics(ReadBatch {
                index,
                first_read: index * 25,
                reads,
            })
        })
        .collect();

    for write_mode in MODES {
        let config = Config::default().with_write_mode(write_mode).with_threads(2);
        let report = convert(dir.path(), config, &format!("reads_{}", write_mode), batches.clone(), Omics::Genomics);
        match &report.header.summary {
            Summary::Genomics(g) => {
                assert_eq!(g.read_count, 150);
                assert_eq!(g.read_length, 50);
            }
            other => panic!("unexpected summary {:?}", other),
        }
        let reader = Reader::open(&report.path, ReadMode::Memory).unwrap();
        for (id, want) in batches.iter().enumerate() {
            assert_eq!(&reader.entry(id).unwrap(), want);
        }
    }
}

#[test]
fn test_continuous_metabolomics_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let axis: Vec<f64> = (0..32).map(|i| 100.0 + i as f64 * 0.5).collect();
    let spectra: Vec<Record> = (0..10u32)
        .map(|index| {
            Record::Metabolomics(Spectrum {
                index,
                position: Position::xy((index % 5) as f32, (index / 5) as f32),
                mz: None,
                intensity: (0..32).map(|p| ((p * index) % 17) as f64 * 3.5 + 2.0).collect(),
            })
        })
        .collect();
    let summary = Summary::Metabolomics(MetabolomicsSummary {
        spectrum_count: 10,
        pixel_size: [10.0, 10.0],
        max_pixel_count: [5, 2],
        mode: ImzmlMode::Continuous,
        continuous_mz: Some(axis.clone()),
        ..Default::default()
    });

    let descriptor = SourceDescriptor::new("tissue.imzML", "imzML", Omics::Metabolomics);
    let mut source = IterSource::new(descriptor, spectra.clone()).with_summary(summary);
    let config = Config::default().with_output_dir(dir.path()).with_write_mode(WriteMode::Yaml);
    let report = Pipeline::new(config).run(&mut source).unwrap();

    let reader = Reader::open(&report.path, ReadMode::Disk).unwrap();
    assert_eq!(reader.decode_context().continuous_mz.as_deref(), Some(axis.as_slice()));
    for (id, want) in spectra.iter().enumerate() {
        let (Record::Metabolomics(got), Record::Metabolomics(want)) = (reader.entry(id).unwrap(), want) else {
            panic!("expected spectra");
        };
        assert_eq!(got.index, want.index);
        assert_eq!((got.position.x, got.position.y), (want.position.x, want.position.y));
        assert_eq!(got.mz.as_deref(), Some(axis.as_slice()));
        for (g, w) in got.intensity.iter().zip(&want.intensity) {
            assert!((g - w).abs() < 0.1, "intensity {} vs {}", g, w);
        }
    }
}
