//! The `BasicInfo` block opening every container.
//!
//! The header is key/value text in every write mode: JSON for `json`, YAML
//! style lines for `yaml` and `binary`. Numeric tables (mobility values, the
//! continuous m/z axis) are embedded as Base64 of little-endian floats.

use std::{collections::HashMap, fmt, str::FromStr};

use crate::{
    codec::block::{decode_base64, encode_base64, pack_f32s, pack_f64s, unpack_f32s, unpack_f64s},
    constructs::entry::split_key_value,
    OmgError, Omics, Result, WriteMode,
};

/// Spelling of an absent optional value.
pub const NONE: &str = "None";

/// Date layout of the `date` key.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Instrument {
    pub model: String,
    pub detector: String,
    pub ionisation: String,
    pub mass_analyzer: String,
    pub manufacturer: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenomicsSummary {
    pub read_count: u64,
    /// Uniform read length, 0 when reads vary.
    pub read_length: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProteomicsSummary {
    pub scan_count: u64,
    pub start_time: f32,
    pub end_time: f32,
    pub instrument: Instrument,
    /// Ion mobility values addressed by the per-peak mobility index.
    pub mobility_values: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImzmlMode {
    /// One m/z axis shared by every spectrum, stored in the header.
    Continuous,
    #[default]
    Processed,
}

impl fmt::Display for ImzmlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImzmlMode::Continuous => f.write_str("continuous"),
            ImzmlMode::Processed => f.write_str("processed"),
        }
    }
}

impl FromStr for ImzmlMode {
    type Err = OmgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" => Ok(ImzmlMode::Continuous),
            "processed" => Ok(ImzmlMode::Processed),
            other => Err(OmgError::integrity(format!("unknown imzML mode {:?}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetabolomicsSummary {
    pub spectrum_count: u64,
    pub pixel_size: [f32; 2],
    pub max_dimension: [f32; 2],
    pub max_pixel_count: [u32; 2],
    pub instrument: Instrument,
    pub mode: ImzmlMode,
    pub continuous_mz: Option<Vec<f64>>,
}

/// Per-domain header content reported by the record source.
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    Genomics(GenomicsSummary),
    Proteomics(ProteomicsSummary),
    Metabolomics(MetabolomicsSummary),
}

impl Summary {
    pub fn omics(&self) -> Omics {
        match self {
            Summary::Genomics(_) => Omics::Genomics,
            Summary::Proteomics(_) => Omics::Proteomics,
            Summary::Metabolomics(_) => Omics::Metabolomics,
        }
    }

    /// An empty summary for `omics`.
    pub fn empty(omics: Omics) -> Self {
        match omics {
            Omics::Genomics => Summary::Genomics(GenomicsSummary::default()),
            Omics::Proteomics => Summary::Proteomics(ProteomicsSummary::default()),
            Omics::Metabolomics => Summary::Metabolomics(MetabolomicsSummary::default()),
        }
    }
}

/// Container header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub write_mode: WriteMode,
    pub date: String,
    pub parent_file: String,
    pub parent_format: String,
    /// Number of entries following the header.
    pub entry_count: u64,
    /// Step used to quantize m/z values.
    pub mz_precision: f64,
    pub summary: Summary,
}

impl Header {
    /// Builds a header stamped with the current local time.
    pub fn new(
        write_mode: WriteMode,
        parent_file: impl Into<String>,
        parent_format: impl Into<String>,
        mz_precision: f64,
        summary: Summary,
    ) -> Self {
        Self {
            write_mode,
            date: chrono::Local::now().format(DATE_FORMAT).to_string(),
            parent_file: parent_file.into(),
            parent_format: parent_format.into(),
            entry_count: 0,
            mz_precision,
            summary,
        }
    }

    pub fn omics(&self) -> Omics {
        self.summary.omics()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.mz_precision.is_finite() && self.mz_precision > 0.0) {
            return Err(OmgError::integrity(format!(
                "header mzPrecision {} is not a positive real",
                self.mz_precision
            )));
        }
        if let Summary::Metabolomics(meta) = &self.summary {
            if meta.mode == ImzmlMode::Continuous && meta.continuous_mz.is_none() {
                return Err(OmgError::integrity(
                    "continuous imzML header carries no m/z axis",
                ));
            }
        }
        Ok(())
    }

    /// Ordered key/value pairs, as rendered.
    pub fn key_values(&self) -> Vec<(&'static str, String)> {
        let mut kv = vec![
            ("omics", self.omics().to_string()),
            ("writeFormat", self.write_mode.to_string()),
            ("date", self.date.clone()),
            ("parentFile", self.parent_file.clone()),
            ("parentFormat", self.parent_format.clone()),
            ("entryCount", self.entry_count.to_string()),
            ("mzPrecision", self.mz_precision.to_string()),
        ];
        match &self.summary {
            Summary::Genomics(g) => {
                kv.push(("readCount", g.read_count.to_string()));
                kv.push(("readLength", g.read_length.to_string()));
            }
            Summary::Proteomics(p) => {
                kv.push(("scanCount", p.scan_count.to_string()));
                kv.push(("startTime", p.start_time.to_string()));
                kv.push(("endTime", p.end_time.to_string()));
                push_instrument(&mut kv, &p.instrument);
                kv.push(("msManufacturer", p.instrument.manufacturer.clone()));
                let mobility = p
                    .mobility_values
                    .as_deref()
                    .map(|v| encode_base64(&pack_f32s(v)))
                    .unwrap_or_else(|| NONE.to_string());
                kv.push(("mobilityValue", mobility));
            }
            Summary::Metabolomics(m) => {
                kv.push(("scanCount", m.spectrum_count.to_string()));
                kv.push(("pixelSize_X", m.pixel_size[0].to_string()));
                kv.push(("pixelSize_Y", m.pixel_size[1].to_string()));
                kv.push(("maxDimension_X", m.max_dimension[0].to_string()));
                kv.push(("maxDimension_Y", m.max_dimension[1].to_string()));
                kv.push(("maxCountofPixel_X", m.max_pixel_count[0].to_string()));
                kv.push(("maxCountofPixel_Y", m.max_pixel_count[1].to_string()));
                push_instrument(&mut kv, &m.instrument);
                kv.push(("imzMLMode", m.mode.to_string()));
                let axis = m
                    .continuous_mz
                    .as_deref()
                    .map(|v| encode_base64(&pack_f64s(v)))
                    .unwrap_or_else(|| NONE.to_string());
                kv.push(("continuousMzCode", axis));
            }
        }
        kv
    }

    /// Renders the header block; binary containers use the YAML form.
    pub fn render(&self) -> String {
        let kv = self.key_values();
        match self.write_mode {
            WriteMode::Json => {
                let mut out = String::from("{\n \"BasicInfo\": {\n");
                for (i, (key, value)) in kv.iter().enumerate() {
                    let sep = if i + 1 == kv.len() { "" } else { "," };
                    out.push_str(&format!("  \"{}\": {}{}\n", key, json_string(value), sep));
                }
                out.push_str(" },\n");
                out
            }
            WriteMode::Yaml | WriteMode::Binary => {
                let mut out = String::from("BasicInfo:\n");
                for (key, value) in kv {
                    out.push_str(&format!(" {}: {}\n", key, yaml_scalar(&value)));
                }
                out.push('\n');
                out
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.render().into_bytes()
    }

    /// Parses a header block produced by [`render`](Self::render).
    ///
    /// # Errors
    ///
    /// Returns [`OmgError::Integrity`] on a missing or malformed key and
    /// [`OmgError::Decode`] on a malformed embedded table.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| OmgError::integrity(format!("header is not UTF-8: {}", e)))?;
        let is_json = text.trim_start().starts_with('{');

        let mut map: HashMap<String, String> = HashMap::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('{') || line.starts_with('}') {
                continue;
            }
            let parsed = if is_json {
                split_key_value(line)
            } else {
                line.split_once(':')
                    .map(|(k, v)| (k.trim(), v.strip_prefix(' ').unwrap_or(v)))
            };
            let Some((key, raw)) = parsed else {
                return Err(OmgError::integrity(format!(
                    "header has malformed line {:?}",
                    line
                )));
            };
            if key == "BasicInfo" {
                continue;
            }
            let value = if is_json {
                // re-quote: the raw value was unquoted by split_key_value
                serde_json::from_str::<String>(&format!("\"{}\"", raw)).map_err(|e| {
                    OmgError::integrity(format!("header key {} is not a JSON string: {}", key, e))
                })?
            } else if raw.starts_with('"') {
                serde_json::from_str::<String>(raw).map_err(|e| {
                    OmgError::integrity(format!("header key {} has a bad quoted value: {}", key, e))
                })?
            } else {
                raw.to_string()
            };
            map.insert(key.to_string(), value);
        }

        let keys = HeaderKeys { map: &map };
        let omics: Omics = keys.get("omics")?.parse()?;
        let summary = match omics {
            Omics::Genomics => Summary::Genomics(GenomicsSummary {
                read_count: keys.parse("readCount")?,
                read_length: keys.parse("readLength")?,
            }),
            Omics::Proteomics => Summary::Proteomics(ProteomicsSummary {
                scan_count: keys.parse("scanCount")?,
                start_time: keys.parse("startTime")?,
                end_time: keys.parse("endTime")?,
                instrument: keys.instrument()?,
                mobility_values: keys
                    .table("mobilityValue")?
                    .map(|b| unpack_f32s(&b))
                    .transpose()?,
            }),
            Omics::Metabolomics => Summary::Metabolomics(MetabolomicsSummary {
                spectrum_count: keys.parse("scanCount")?,
                pixel_size: [keys.parse("pixelSize_X")?, keys.parse("pixelSize_Y")?],
                max_dimension: [keys.parse("maxDimension_X")?, keys.parse("maxDimension_Y")?],
                max_pixel_count: [
                    keys.parse("maxCountofPixel_X")?,
                    keys.parse("maxCountofPixel_Y")?,
                ],
                instrument: keys.instrument()?,
                mode: keys.get("imzMLMode")?.parse()?,
                continuous_mz: keys
                    .table("continuousMzCode")?
                    .map(|b| unpack_f64s(&b))
                    .transpose()?,
            }),
        };

        let header = Self {
            write_mode: keys.get("writeFormat")?.parse()?,
            date: keys.get("date")?.to_string(),
            parent_file: keys.get("parentFile")?.to_string(),
            parent_format: keys.get("parentFormat")?.to_string(),
            entry_count: keys.parse("entryCount")?,
            mz_precision: keys.parse("mzPrecision")?,
            summary,
        };
        header.validate()?;
        Ok(header)
    }
}

fn push_instrument(kv: &mut Vec<(&'static str, String)>, instrument: &Instrument) {
    kv.push(("msModel", instrument.model.clone()));
    kv.push(("msDetector", instrument.detector.clone()));
    kv.push(("msIonisation", instrument.ionisation.clone()));
    kv.push(("msMassAnalyzer", instrument.mass_analyzer.clone()));
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Plain scalar when unambiguous, double-quoted otherwise.
fn yaml_scalar(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._-+/=".contains(c));
    if plain {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

struct HeaderKeys<'a> {
    map: &'a HashMap<String, String>,
}

impl HeaderKeys<'_> {
    fn get(&self, key: &str) -> Result<&str> {
        self.map
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| OmgError::integrity(format!("header has no key {}", key)))
    }

    fn parse<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.get(key)?;
        raw.trim().parse().map_err(|e: T::Err| {
            OmgError::integrity(format!("header key {} has bad value {:?}: {}", key, raw, e))
        })
    }

    fn table(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.get(key)? {
            NONE | "" => Ok(None),
            b64 => decode_base64(b64).map(Some),
        }
    }

    fn instrument(&self) -> Result<Instrument> {
        Ok(Instrument {
            model: self.get("msModel")?.to_string(),
            detector: self.get("msDetector")?.to_string(),
            ionisation: self.get("msIonisation")?.to_string(),
            mass_analyzer: self.get("msMassAnalyzer")?.to_string(),
            manufacturer: self
                .map
                .get("msManufacturer")
                .cloned()
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proteomics_header(mode: WriteMode) -> Header {
        let mut header = Header::new(
            mode,
            "/data/run 01.raw",
            "raw",
            0.001,
            Summary::Proteomics(ProteomicsSummary {
                scan_count: 12,
                start_time: 0.5,
                end_time: 90.25,
                instrument: Instrument {
                    model: "Orbitrap \"Exploris\" 480".into(),
                    detector: "inductive".into(),
                    ionisation: "ESI".into(),
                    mass_analyzer: "orbitrap".into(),
                    manufacturer: "Thermo".into(),
                },
                mobility_values: Some(vec![0.6, 0.75, 1.3]),
            }),
        );
        header.entry_count = 11;
        header
    }

    #[test]
    fn test_header_roundtrip_all_modes() {
        for mode in [WriteMode::Binary, WriteMode::Json, WriteMode::Yaml] {
            let header = proteomics_header(mode);
            let parsed = Header::parse(&header.to_bytes()).unwrap();
            assert_eq!(parsed, header, "{}", mode);
        }
    }

    #[test]
    fn test_json_header_is_object_prefix() {
        let text = proteomics_header(WriteMode::Json).render();
        assert!(text.starts_with("{\n \"BasicInfo\": {\n  \"omics\": \"Proteomics\",\n"));
        assert!(text.ends_with("\"\n },\n"));

        // closing the document yields valid JSON
        let doc = format!("{}\"x\": 0\n}}", text);
        let value: serde_json::Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(value["BasicInfo"]["entryCount"], "11");
        assert_eq!(value["BasicInfo"]["msModel"], "Orbitrap \"Exploris\" 480");
    }

    #[test]
    fn test_awkward_strings_roundtrip() {
        for parent in ["run: #1.raw", "dir/ run.raw ", " - [x]\tname\n", "", "a\\b \"c\""] {
            for mode in [WriteMode::Binary, WriteMode::Json, WriteMode::Yaml] {
                let mut header = proteomics_header(mode);
                header.parent_file = parent.to_string();
                let parsed = Header::parse(&header.to_bytes()).unwrap();
                assert_eq!(parsed.parent_file, parent, "{}", mode);
            }
        }
    }

    #[test]
    fn test_yaml_header_parses_as_yaml() {
        let mut header = proteomics_header(WriteMode::Yaml);
        header.parent_file = "run: #1.raw".into();
        let value: serde_yaml::Value = serde_yaml::from_str(&header.render()).unwrap();
        let info = &value["BasicInfo"];
        assert_eq!(info["parentFile"].as_str(), Some("run: #1.raw"));
        assert_eq!(info["msModel"].as_str(), Some("Orbitrap \"Exploris\" 480"));
        assert_eq!(info["omics"].as_str(), Some("Proteomics"));
        assert_eq!(info["date"].as_str(), Some(header.date.as_str()));
    }

    #[test]
    fn test_binary_header_uses_yaml_form() {
        let text = proteomics_header(WriteMode::Binary).render();
        assert!(text.starts_with("BasicInfo:\n omics: Proteomics\n writeFormat: binary\n"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_metabolomics_tables() {
        let mut header = Header::new(
            WriteMode::Yaml,
            "slide.imzML",
            "imzML",
            0.0001,
            Summary::Metabolomics(MetabolomicsSummary {
                spectrum_count: 4,
                pixel_size: [10.0, 10.0],
                max_dimension: [200.0, 100.0],
                max_pixel_count: [20, 10],
                mode: ImzmlMode::Continuous,
                continuous_mz: Some(vec![100.0, 100.5, 101.0]),
                ..Default::default()
            }),
        );
        header.entry_count = 4;
        let parsed = Header::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_missing_key_is_integrity_error() {
        let text = "BasicInfo:\n omics: Genomics\n writeFormat: yaml\n\n";
        let err = Header::parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, OmgError::Integrity(_)));
    }

    #[test]
    fn test_continuous_without_axis_is_rejected() {
        let mut header = Header::new(
            WriteMode::Yaml,
            "a",
            "imzML",
            0.001,
            Summary::Metabolomics(MetabolomicsSummary {
                mode: ImzmlMode::Continuous,
                ..Default::default()
            }),
        );
        header.entry_count = 0;
        assert!(header.validate().is_err());
    }

    #[test]
    fn test_date_format() {
        let header = Header::new(
            WriteMode::Yaml,
            "a.fastq",
            "fastq",
            0.001,
            Summary::empty(Omics::Genomics),
        );
        assert!(chrono::NaiveDateTime::parse_from_str(&header.date, DATE_FORMAT).is_ok());
    }
}
