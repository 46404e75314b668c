use std::{fmt, str::FromStr};

use crate::{OmgError, Result};

/// Domain tag stored in the header as `omics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Omics {
    Genomics,
    Proteomics,
    Metabolomics,
}

impl Omics {
    pub fn as_str(&self) -> &'static str {
        match self {
            Omics::Genomics => "Genomics",
            Omics::Proteomics => "Proteomics",
            Omics::Metabolomics => "Metabolomics",
        }
    }
}

impl fmt::Display for Omics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Omics {
    type Err = OmgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Genomics" => Ok(Omics::Genomics),
            "Proteomics" => Ok(Omics::Proteomics),
            "Metabolomics" => Ok(Omics::Metabolomics),
            other => Err(OmgError::integrity(format!("unknown omics tag {:?}", other))),
        }
    }
}

/// One FASTQ read: identifier line without the leading `@`, bases, qualities.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FastqRead {
    pub id: Vec<u8>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl FastqRead {
    pub fn new(id: impl Into<Vec<u8>>, seq: impl Into<Vec<u8>>, qual: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            seq: seq.into(),
            qual: qual.into(),
        }
    }
}

/// A batch of consecutive reads encoded as one entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadBatch {
    pub index: u32,
    /// Ordinal of the first read of the batch within the input.
    pub first_read: u32,
    pub reads: Vec<FastqRead>,
}

/// One mass-spectrometry scan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scan {
    pub index: u32,
    pub rt: f32,
    pub ms_level: u32,
    pub precursor_mz: f32,
    pub collision_energy: f32,
    pub charge: i32,
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
    /// Per-peak index into the header mobility table.
    pub mobility: Option<Vec<u32>>,
}

/// Spatial coordinates of an imaging spectrum; absent axes are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub x3d: Option<f32>,
    pub y3d: Option<f32>,
    pub z3d: Option<f32>,
}

impl Position {
    pub fn xy(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }
}

/// One metabolomics imaging spectrum.
///
/// `mz` is `None` in continuous mode, where every spectrum shares the axis
/// carried by the header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Spectrum {
    pub index: u32,
    pub position: Position,
    pub mz: Option<Vec<f64>>,
    pub intensity: Vec<f64>,
}

/// A typed record produced by a source and consumed by an encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Genomics(ReadBatch),
    Proteomics(Scan),
    Metabolomics(Spectrum),
}

impl Record {
    /// Ingestion id, assigned once by the source.
    pub fn id(&self) -> u32 {
        match self {
            Record::Genomics(batch) => batch.index,
            Record::Proteomics(scan) => scan.index,
            Record::Metabolomics(spectrum) => spectrum.index,
        }
    }

    pub fn omics(&self) -> Omics {
        match self {
            Record::Genomics(_) => Omics::Genomics,
            Record::Proteomics(_) => Omics::Proteomics,
            Record::Metabolomics(_) => Omics::Metabolomics,
        }
    }
}

impl From<ReadBatch> for Record {
    fn from(batch: ReadBatch) -> Self {
        Record::Genomics(batch)
    }
}

impl From<Scan> for Record {
    fn from(scan: Scan) -> Self {
        Record::Proteomics(scan)
    }
}

impl From<Spectrum> for Record {
    fn from(spectrum: Spectrum) -> Self {
        Record::Metabolomics(spectrum)
    }
}

/// Item carried by the record queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Data(Record),
    /// Terminates the stream; sent exactly once.
    EndOfStream,
}
