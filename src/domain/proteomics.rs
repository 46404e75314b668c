//! Mass-spectrometry scans.
//!
//! m/z values are quantized to the configured precision and stored directly
//! (they are sorted, hence monotone). Intensities keep only `round(sqrt(I))`,
//! prefix summed, so decoding yields the squared integer approximation.

use super::{check_intensity, mz_order, quantize_mz, DecodeContext};
use crate::{
    codec::{decode_monotone, encode_monotone, prefix_sum, successive_differences},
    Config, EncodedEntry, EntrySchema, FieldKind, FieldValue, OmgError, Result, Scan,
};

/// Peaks below this intensity are dropped when `skip_zero_intensity` is set.
pub const ZERO_INTENSITY: f64 = 0.01;

pub const SCHEMA: EntrySchema = EntrySchema {
    fields: &[
        ("RT", FieldKind::F32),
        ("precursorMz", FieldKind::F32),
        ("collisionEnergy", FieldKind::F32),
        ("scanIndex", FieldKind::U32),
        ("msLevel", FieldKind::U32),
        ("chargeState", FieldKind::I32),
    ],
    segments: &["mz_arr", "int_arr", "mobilityIndex"],
};

pub fn encode(scan: &Scan, config: &Config) -> Result<Option<EncodedEntry>> {
    let id = scan.index;
    if scan.mz.len() != scan.intensity.len() {
        return Err(OmgError::InvalidRecord {
            id,
            reason: format!(
                "{} m/z values but {} intensities",
                scan.mz.len(),
                scan.intensity.len()
            ),
        });
    }
    if let Some(mobility) = &scan.mobility {
        if mobility.len() != scan.mz.len() {
            return Err(OmgError::InvalidRecord {
                id,
                reason: format!(
                    "{} mobility indices for {} peaks",
                    mobility.len(),
                    scan.mz.len()
                ),
            });
        }
    }
    if scan.mz.is_empty() || scan.mz.len() < config.min_peaks {
        return Ok(None);
    }

    let mut order = mz_order(&scan.mz);
    if config.skip_zero_intensity {
        order.retain(|&i| scan.intensity[i] >= ZERO_INTENSITY);
    }
    if order.is_empty() {
        return Ok(None);
    }

    let mut mz = Vec::with_capacity(order.len());
    let mut intensity = Vec::with_capacity(order.len());
    for &i in &order {
        mz.push(quantize_mz(scan.mz[i], config.mz_precision, id)?);
        check_intensity(scan.intensity[i], id)?;
        intensity.push(scan.intensity[i].sqrt().round() as u64);
    }

    let mut entry = EncodedEntry::new(id, format!("scan_{}", id));
    entry.push_field("RT", FieldValue::F32(scan.rt));
    entry.push_field("precursorMz", FieldValue::F32(scan.precursor_mz));
    entry.push_field("collisionEnergy", FieldValue::F32(scan.collision_energy));
    entry.push_field("scanIndex", FieldValue::U32(id));
    entry.push_field("msLevel", FieldValue::U32(scan.ms_level));
    entry.push_field("chargeState", FieldValue::I32(scan.charge));

    let level = config.compression_level;
    entry.push_segment("mz_arr", encode_monotone(&mz, level)?);
    entry.push_segment(
        "int_arr",
        encode_monotone(&prefix_sum::<u64>(&intensity)?, level)?,
    );

    let mobility = match (&scan.mobility, config.write_mobility) {
        (Some(mobility), true) => {
            let deltas: Vec<u64> = order.iter().map(|&i| mobility[i] as u64).collect();
            encode_monotone(&prefix_sum::<u32>(&deltas)?, level)?
        }
        _ => Vec::new(),
    };
    entry.push_segment("mobilityIndex", mobility);

    Ok(Some(entry))
}

pub fn decode(entry: &EncodedEntry, ctx: &DecodeContext) -> Result<Scan> {
    let mz: Vec<f64> = decode_monotone::<u32>(entry.segment("mz_arr")?)?
        .into_iter()
        .map(|q| q as f64 * ctx.mz_precision)
        .collect();
    let intensity: Vec<f64> =
        successive_differences(&decode_monotone::<u64>(entry.segment("int_arr")?)?)?
            .into_iter()
            .map(|d| (d as f64) * (d as f64))
            .collect();
    if mz.len() != intensity.len() {
        return Err(OmgError::integrity(format!(
            "scan entry {} holds {} m/z values and {} intensities",
            entry.id,
            mz.len(),
            intensity.len()
        )));
    }

    let raw = entry.segment("mobilityIndex")?;
    let mobility = if raw.is_empty() {
        None
    } else {
        let indices = successive_differences(&decode_monotone::<u32>(raw)?)?;
        if indices.len() != mz.len() {
            return Err(OmgError::integrity(format!(
                "scan entry {} holds {} mobility indices for {} peaks",
                entry.id,
                indices.len(),
                mz.len()
            )));
        }
        Some(indices.into_iter().map(|i| i as u32).collect())
    };

    Ok(Scan {
        index: entry.u32("scanIndex")?,
        rt: entry.f32("RT")?,
        ms_level: entry.u32("msLevel")?,
        precursor_mz: entry.f32("precursorMz")?,
        collision_energy: entry.f32("collisionEnergy")?,
        charge: entry.i32("chargeState")?,
        mz,
        intensity,
        mobility,
    })
}

/// Looks up the ion mobility value of every peak in the header table.
///
/// # Errors
///
/// Returns [`OmgError::Integrity`] when the scan carries indices but the
/// header has no table, or an index falls outside it.
pub fn resolve_mobility(scan: &Scan, ctx: &DecodeContext) -> Result<Option<Vec<f32>>> {
    let Some(indices) = &scan.mobility else {
        return Ok(None);
    };
    let table = ctx.mobility_values.as_deref().ok_or_else(|| {
        OmgError::integrity(format!(
            "scan {} has mobility indices but the header has no mobility table",
            scan.index
        ))
    })?;
    indices
        .iter()
        .map(|&i| {
            table.get(i as usize).copied().ok_or_else(|| {
                OmgError::integrity(format!(
                    "scan {} mobility index {} outside table of {}",
                    scan.index,
                    i,
                    table.len()
                ))
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}
