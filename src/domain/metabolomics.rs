//! Imaging mass-spectrometry spectra.
//!
//! Intensities are shifted by the spectrum minimum before quantization.
//! Processed spectra carry their own m/z array and store `round((I - min) * 1e5)`;
//! continuous spectra share the header m/z axis and store
//! `round(sqrt((I - min) * 1e4))`.

use super::{check_intensity, mz_order, quantize_mz, DecodeContext};
use crate::{
    codec::{decode_monotone, encode_monotone, prefix_sum, successive_differences},
    Config, EncodedEntry, EntrySchema, FieldKind, FieldValue, OmgError, Position, Result,
    Spectrum,
};

const PROCESSED_SCALE: f64 = 1e5;
const CONTINUOUS_SCALE: f64 = 1e4;

pub const SCHEMA: EntrySchema = EntrySchema {
    fields: &[
        ("posX", FieldKind::F32),
        ("posY", FieldKind::F32),
        ("3DPosX", FieldKind::F32),
        ("3DPosY", FieldKind::F32),
        ("3DPosZ", FieldKind::F32),
        ("minIntensity", FieldKind::F32),
        ("spectrumId", FieldKind::U32),
    ],
    segments: &["int_arr", "mz_arr"],
};

pub fn encode(spectrum: &Spectrum, config: &Config) -> Result<Option<EncodedEntry>> {
    let id = spectrum.index;
    if spectrum.intensity.is_empty() {
        return Ok(None);
    }
    if let Some(mz) = &spectrum.mz {
        if mz.len() != spectrum.intensity.len() {
            return Err(OmgError::InvalidRecord {
                id,
                reason: format!(
                    "{} m/z values but {} intensities",
                    mz.len(),
                    spectrum.intensity.len()
                ),
            });
        }
    }
    for value in &spectrum.intensity {
        check_intensity(*value, id)?;
    }
    // stored as f32, so shift by the stored value
    let min = spectrum
        .intensity
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min) as f32;
    let shift = |value: f64| (value - min as f64).max(0.0);

    let level = config.compression_level;
    let (intensity, mz) = match &spectrum.mz {
        Some(mz) => {
            let order = mz_order(mz);
            let quantized = order
                .iter()
                .map(|&i| quantize_mz(mz[i], config.mz_precision, id))
                .collect::<Result<Vec<u32>>>()?;
            let deltas: Vec<u64> = order
                .iter()
                .map(|&i| (shift(spectrum.intensity[i]) * PROCESSED_SCALE).round() as u64)
                .collect();
            (
                encode_monotone(&prefix_sum::<u64>(&deltas)?, level)?,
                encode_monotone(&quantized, level)?,
            )
        }
        None => {
            let deltas: Vec<u64> = spectrum
                .intensity
                .iter()
                .map(|&v| (shift(v) * CONTINUOUS_SCALE).sqrt().round() as u64)
                .collect();
            (
                encode_monotone(&prefix_sum::<u64>(&deltas)?, level)?,
                Vec::new(),
            )
        }
    };

    let pos = &spectrum.position;
    let mut entry = EncodedEntry::new(id, format!("spectrum_{}", id));
    for (key, value) in [
        ("posX", pos.x),
        ("posY", pos.y),
        ("3DPosX", pos.x3d),
        ("3DPosY", pos.y3d),
        ("3DPosZ", pos.z3d),
    ] {
        entry.push_field(key, FieldValue::F32(value.unwrap_or(f32::NAN)));
    }
    entry.push_field("minIntensity", FieldValue::F32(min));
    entry.push_field("spectrumId", FieldValue::U32(id));
    entry.push_segment("int_arr", intensity);
    entry.push_segment("mz_arr", mz);
    Ok(Some(entry))
}

pub fn decode(entry: &EncodedEntry, ctx: &DecodeContext) -> Result<Spectrum> {
    let min = entry.f32("minIntensity")? as f64;
    let deltas = successive_differences(&decode_monotone::<u64>(entry.segment("int_arr")?)?)?;
    let raw_mz = entry.segment("mz_arr")?;

    let (mz, intensity): (Vec<f64>, Vec<f64>) = if raw_mz.is_empty() {
        let axis = ctx.continuous_mz.as_ref().ok_or_else(|| {
            OmgError::integrity(format!(
                "spectrum entry {} has no m/z array and the header has no continuous axis",
                entry.id
            ))
        })?;
        if axis.len() != deltas.len() {
            return Err(OmgError::integrity(format!(
                "spectrum entry {} holds {} intensities but the continuous axis has {} points",
                entry.id,
                deltas.len(),
                axis.len()
            )));
        }
        let intensity = deltas
            .into_iter()
            .map(|d| (d as f64) * (d as f64) / CONTINUOUS_SCALE + min)
            .collect();
        (axis.clone(), intensity)
    } else {
        let mz: Vec<f64> = decode_monotone::<u32>(raw_mz)?
            .into_iter()
            .map(|q| q as f64 * ctx.mz_precision)
            .collect();
        if mz.len() != deltas.len() {
            return Err(OmgError::integrity(format!(
                "spectrum entry {} holds {} m/z values and {} intensities",
                entry.id,
                mz.len(),
                deltas.len()
            )));
        }
        let intensity = deltas
            .into_iter()
            .map(|d| d as f64 / PROCESSED_SCALE + min)
            .collect();
        (mz, intensity)
    };

    let present = |v: f32| (!v.is_nan()).then_some(v);
    Ok(Spectrum {
        index: entry.u32("spectrumId")?,
        position: Position {
            x: present(entry.f32("posX")?),
            y: present(entry.f32("posY")?),
            x3d: present(entry.f32("3DPosX")?),
            y3d: present(entry.f32("3DPosY")?),
            z3d: present(entry.f32("3DPosZ")?),
        },
        mz: Some(mz),
        intensity,
    })
}
