//! Run configuration shared read-only by every pipeline stage.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{codec::block::DEFAULT_COMPRESSION_LEVEL, OmgError, Result};

pub const DEFAULT_MZ_PRECISION: f64 = 0.001;
pub const DEFAULT_MIN_PEAKS: usize = 10;

/// Surface form of header and entries in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum WriteMode {
    /// Fixed-width little-endian fields, raw segments.
    #[default]
    Binary,
    Json,
    Yaml,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Binary => "binary",
            WriteMode::Json => "json",
            WriteMode::Yaml => "yaml",
        }
    }

    /// `true` for the modes whose entries are key/value text.
    pub fn is_text(&self) -> bool {
        !matches!(self, WriteMode::Binary)
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteMode {
    type Err = OmgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(WriteMode::Binary),
            "json" => Ok(WriteMode::Json),
            "yaml" => Ok(WriteMode::Yaml),
            other => Err(OmgError::InvalidConfig(format!(
                "unknown write mode {:?} (expected binary, json or yaml)",
                other
            ))),
        }
    }
}

/// How a [`Reader`](crate::Reader) reaches the container bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ReadMode {
    /// Seek and read per access through one shared file handle.
    #[default]
    Disk,
    /// Whole file memory mapped.
    Memory,
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadMode::Disk => f.write_str("disk"),
            ReadMode::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for ReadMode {
    type Err = OmgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disk" => Ok(ReadMode::Disk),
            "memory" | "mem" => Ok(ReadMode::Memory),
            other => Err(OmgError::InvalidConfig(format!(
                "unknown read mode {:?} (expected disk or memory)",
                other
            ))),
        }
    }
}

/// Immutable conversion settings.
///
/// Built once by the caller and passed by reference into the encoders and the
/// pipeline. Every field has a usable default.
///
/// # Examples
///
/// ```rust
/// use omgfile::{Config, WriteMode};
///
/// # fn main() -> omgfile::Result<()> {
/// let config = Config::default()
///     .with_write_mode(WriteMode::Json)
///     .with_mz_precision(0.0001)
///     .with_threads(4);
/// config.validate()?;
/// assert_eq!(config.queue_capacity(), 8);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Directory receiving the container and its temp file. Must exist.
    pub output_dir: PathBuf,
    pub write_mode: WriteMode,
    /// Step of the fixed-point m/z quantization.
    pub mz_precision: f64,
    /// Drop proteomics peaks with intensity below 0.01.
    pub skip_zero_intensity: bool,
    /// Emit the per-peak mobility segment when scans carry one.
    pub write_mobility: bool,
    /// Scans with fewer raw peaks are dropped.
    pub min_peaks: usize,
    /// Stage B worker count, 0 for available parallelism.
    pub threads: usize,
    /// Record queue capacity, 0 for twice the available parallelism.
    pub queue_capacity: usize,
    pub compression_level: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            write_mode: WriteMode::default(),
            mz_precision: DEFAULT_MZ_PRECISION,
            skip_zero_intensity: true,
            write_mobility: false,
            min_peaks: DEFAULT_MIN_PEAKS,
            threads: 0,
            queue_capacity: 0,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl Config {
    pub fn with_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    pub fn with_mz_precision(mut self, precision: f64) -> Self {
        self.mz_precision = precision;
        self
    }

    pub fn with_skip_zero_intensity(mut self, skip: bool) -> Self {
        self.skip_zero_intensity = skip;
        self
    }

    pub fn with_write_mobility(mut self, write: bool) -> Self {
        self.write_mobility = write;
        self
    }

    pub fn with_min_peaks(mut self, min_peaks: usize) -> Self {
        self.min_peaks = min_peaks;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Effective Stage B worker count.
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.threads
        }
    }

    /// Effective record queue capacity. Independent of `threads`.
    pub fn queue_capacity(&self) -> usize {
        if self.queue_capacity == 0 {
            2 * num_cpus::get().max(1)
        } else {
            self.queue_capacity
        }
    }

    /// Checks every value that the encoders or the pipeline rely on.
    ///
    /// # Errors
    ///
    /// Returns [`OmgError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(self.mz_precision.is_finite() && self.mz_precision > 0.0) {
            return Err(OmgError::InvalidConfig(format!(
                "mz_precision must be a positive real, got {}",
                self.mz_precision
            )));
        }
        let levels = zstd::compression_level_range();
        if !levels.contains(&self.compression_level) {
            return Err(OmgError::InvalidConfig(format!(
                "compression_level {} outside zstd range {:?}",
                self.compression_level, levels
            )));
        }
        if !self.output_dir.is_dir() {
            return Err(OmgError::InvalidConfig(format!(
                "output directory {} does not exist",
                self.output_dir.display()
            )));
        }
        Ok(())
    }

    /// Parses a configuration from JSON; absent keys take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)
            .map_err(|e| OmgError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.write_mode, WriteMode::Binary);
        assert_eq!(config.mz_precision, 0.001);
        assert!(config.skip_zero_intensity);
        assert!(!config.write_mobility);
        assert_eq!(config.min_peaks, 10);
        assert!(config.worker_threads() >= 1);
        assert_eq!(config.queue_capacity(), 2 * num_cpus::get().max(1));
        config.validate().unwrap();
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_threads(3)
            .with_queue_capacity(5)
            .with_min_peaks(1)
            .with_write_mobility(true);
        assert_eq!(config.worker_threads(), 3);
        assert_eq!(config.queue_capacity(), 5);
        assert_eq!(config.min_peaks, 1);
        assert!(config.write_mobility);

        // pinned workers leave the queue sized by the machine
        let config = Config::default().with_threads(1);
        assert_eq!(config.worker_threads(), 1);
        assert_eq!(config.queue_capacity(), 2 * num_cpus::get().max(1));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        for precision in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = Config::default().with_mz_precision(precision);
            assert!(matches!(config.validate(), Err(OmgError::InvalidConfig(_))));
        }
        let config = Config::default().with_compression_level(1000);
        assert!(config.validate().is_err());

        let config = Config::default().with_output_dir("/definitely/not/here");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_modes_from_str() {
        assert_eq!("JSON".parse::<WriteMode>().unwrap(), WriteMode::Json);
        assert_eq!("yaml".parse::<WriteMode>().unwrap(), WriteMode::Yaml);
        assert_eq!(WriteMode::Binary.to_string(), "binary");
        assert!("xml".parse::<WriteMode>().is_err());

        assert_eq!("memory".parse::<ReadMode>().unwrap(), ReadMode::Memory);
        assert_eq!(ReadMode::Disk.to_string(), "disk");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json() {
        let config =
            Config::from_json(r#"{"write_mode": "yaml", "min_peaks": 3, "threads": 2}"#).unwrap();
        assert_eq!(config.write_mode, WriteMode::Yaml);
        assert_eq!(config.min_peaks, 3);
        assert_eq!(config.worker_threads(), 2);
        assert_eq!(config.mz_precision, DEFAULT_MZ_PRECISION);

        assert!(Config::from_json("{\"write_mode\": \"xml\"}").is_err());
    }
}
