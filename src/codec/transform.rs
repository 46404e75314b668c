//! Monotone transforms applied before and after Elias-Fano coding.

use super::elias_fano::EfWord;
use crate::{OmgError, Result};

/// Turns non-negative deltas into a non-decreasing sequence of codec words.
///
/// # Errors
///
/// Returns [`OmgError::Precondition`] when the running total leaves the word
/// range.
pub fn prefix_sum<W: EfWord>(deltas: &[u64]) -> Result<Vec<W>> {
    let mut total = 0u64;
    let mut out = Vec::with_capacity(deltas.len());
    for (i, delta) in deltas.iter().enumerate() {
        total = total
            .checked_add(*delta)
            .filter(|t| *t <= W::MAX_U64)
            .ok_or_else(|| {
                OmgError::precondition(format!(
                    "prefix sum overflows a {}-bit word at index {}",
                    W::BITS,
                    i
                ))
            })?;
        out.push(W::from_u64(total));
    }
    Ok(out)
}

/// Inverse of [`prefix_sum`].
///
/// # Errors
///
/// Returns [`OmgError::Decode`] when the sequence decreases.
pub fn successive_differences<W: EfWord>(values: &[W]) -> Result<Vec<u64>> {
    let mut prev = 0u64;
    let mut out = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        let value = value.to_u64();
        let delta = value.checked_sub(prev).ok_or_else(|| {
            OmgError::decode(
                "successive differences",
                format!("sequence decreases at index {}", i),
            )
        })?;
        out.push(delta);
        prev = value;
    }
    Ok(out)
}
