//! Domain encoders and decoders.
//!
//! Each domain turns one record into an [`EncodedEntry`] of fixed fields and
//! compressed Elias-Fano segments. Encoders only read the shared [`Config`],
//! so workers call them concurrently without coordination. `Ok(None)` marks a
//! record with nothing worth storing; the sink drops it.

pub mod genomics;
pub mod metabolomics;
pub mod proteomics;

use crate::{
    Config, EncodedEntry, EntrySchema, Header, OmgError, Omics, Record, Result, Summary,
};

/// Header-derived values needed to decode entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeContext {
    pub mz_precision: f64,
    pub mobility_values: Option<Vec<f32>>,
    pub continuous_mz: Option<Vec<f64>>,
}

impl DecodeContext {
    pub fn new(mz_precision: f64) -> Self {
        Self {
            mz_precision,
            ..Default::default()
        }
    }

    pub fn from_header(header: &Header) -> Self {
        let mut ctx = Self::new(header.mz_precision);
        match &header.summary {
            Summary::Proteomics(p) => ctx.mobility_values = p.mobility_values.clone(),
            Summary::Metabolomics(m) => ctx.continuous_mz = m.continuous_mz.clone(),
            Summary::Genomics(_) => {}
        }
        ctx
    }
}

/// Encodes any record with its domain encoder.
pub fn encode(record: &Record, config: &Config) -> Result<Option<EncodedEntry>> {
    match record {
        Record::Genomics(batch) => genomics::encode(batch, config),
        Record::Proteomics(scan) => proteomics::encode(scan, config),
        Record::Metabolomics(spectrum) => metabolomics::encode(spectrum, config),
    }
}

/// Decodes a parsed entry back into a typed record.
pub fn decode(entry: &EncodedEntry, omics: Omics, ctx: &DecodeContext) -> Result<Record> {
    match omics {
        Omics::Genomics => genomics::decode(entry).map(Record::Genomics),
        Omics::Proteomics => proteomics::decode(entry, ctx).map(Record::Proteomics),
        Omics::Metabolomics => metabolomics::decode(entry, ctx).map(Record::Metabolomics),
    }
}

pub fn schema(omics: Omics) -> &'static EntrySchema {
    match omics {
        Omics::Genomics => &genomics::SCHEMA,
        Omics::Proteomics => &proteomics::SCHEMA,
        Omics::Metabolomics => &metabolomics::SCHEMA,
    }
}

/// Fixed-point m/z: `round(mz / precision)`.
pub(crate) fn quantize_mz(mz: f64, precision: f64, id: u32) -> Result<u32> {
    let q = (mz / precision).round();
    if !q.is_finite() || q < 0.0 {
        return Err(OmgError::InvalidRecord {
            id,
            reason: format!("m/z {} is not a non-negative number", mz),
        });
    }
    if q > u32::MAX as f64 {
        return Err(OmgError::precondition(format!(
            "m/z {} at precision {} overflows a 32-bit word",
            mz, precision
        )));
    }
    Ok(q as u32)
}

/// Rejects NaN and negative intensities.
pub(crate) fn check_intensity(value: f64, id: u32) -> Result<()> {
    if value.is_nan() || value < 0.0 {
        return Err(OmgError::InvalidRecord {
            id,
            reason: format!("intensity {} is not a non-negative number", value),
        });
    }
    Ok(())
}

/// Indices of `mz` in ascending m/z order, ties kept in input order.
pub(crate) fn mz_order(mz: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..mz.len()).collect();
    order.sort_by(|a, b| mz[*a].total_cmp(&mz[*b]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_mz() {
        assert_eq!(quantize_mz(100.001, 0.001, 0).unwrap(), 100_001);
        assert_eq!(quantize_mz(0.0, 0.001, 0).unwrap(), 0);
        assert!(matches!(
            quantize_mz(-1.0, 0.001, 3),
            Err(OmgError::InvalidRecord { id: 3, .. })
        ));
        assert!(matches!(
            quantize_mz(1e9, 0.001, 0),
            Err(OmgError::Precondition(_))
        ));
    }

    #[test]
    fn test_mz_order_is_stable() {
        assert_eq!(mz_order(&[3.0, 1.0, 3.0, 2.0]), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_schema_dispatch() {
        assert_eq!(schema(Omics::Proteomics).segments[0], "mz_arr");
        assert_eq!(schema(Omics::Metabolomics).segments[0], "int_arr");
        assert_eq!(schema(Omics::Genomics).segments[0], "idKey");
    }
}
