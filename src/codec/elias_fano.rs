//! Elias-Fano coding of non-decreasing integer sequences.
//!
//! A code is a vector of words of the same width as the values:
//!
//! ```text
//! [ upper bitmap | lower bits | padding ][ n ][ upperBits * 100 + L ]
//! ```
//!
//! The upper bitmap holds one set bit per value at position `(x[i] >> L) + i`,
//! the lower region holds the `L` low bits of every value in input order.
//! Bits are numbered MSB-first inside each word. The body is sized to
//! `ceil(n * (L + 2) / W)` words, which always fits both regions because
//! `U >> L <= n`.

use std::fmt::Debug;

use bytemuck::Pod;

use crate::{OmgError, Result};

/// Multiplier used to fold `upperBits` and `L` into one trailer word.
pub const TRAILER_RADIX: u64 = 100;

/// Number of trailer words appended after the bit body.
pub const TRAILER_WORDS: usize = 2;

/// Word types the codec can operate on.
pub trait EfWord: Pod + Copy + Ord + Eq + Debug + Default + Send + Sync + 'static {
    /// Width of the word in bits.
    const BITS: u32;
    /// Width of the word in bytes.
    const BYTES: usize;
    /// Largest representable value as `u64`.
    const MAX_U64: u64;

    fn to_u64(self) -> u64;

    /// Narrows `value`; callers guarantee `value <= MAX_U64`.
    fn from_u64(value: u64) -> Self;

    fn write_le(self, out: &mut Vec<u8>);

    /// Reads one word from exactly `Self::BYTES` little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_ef_word {
    ($t:ty) => {
        impl EfWord for $t {
            const BITS: u32 = <$t>::BITS;
            const BYTES: usize = std::mem::size_of::<$t>();
            const MAX_U64: u64 = <$t>::MAX as u64;

            #[inline]
            fn to_u64(self) -> u64 {
                self as u64
            }

            #[inline]
            fn from_u64(value: u64) -> Self {
                value as $t
            }

            #[inline]
            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }
        }
    };
}

impl_ef_word!(u32);
impl_ef_word!(u64);

/// Parameters recovered from (or computed for) a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EfParams {
    /// Number of encoded values.
    pub len: u64,
    /// Width of the low-bit part of every value.
    pub low_bits: u32,
    /// Number of bit positions used by the upper bitmap.
    pub upper_bits: u64,
}

/// Computes `L`: zero when `U <= n`, otherwise the smallest `L` with `n * 2^L >= U`.
///
/// This is `ceil(log2(U / n))` evaluated without floating point.
pub fn low_bit_width(max: u64, len: u64) -> u32 {
    if max <= len {
        return 0;
    }
    let (max, len) = (max as u128, len as u128);
    let mut width = 0u32;
    while (len << width) < max {
        width += 1;
    }
    width
}

/// Encodes a non-decreasing sequence.
///
/// # Errors
///
/// Returns [`OmgError::Precondition`] when the sequence is empty, decreases
/// anywhere, or when the trailer cannot be represented in the word width.
///
/// # Examples
///
/// ```rust
/// use omgfile::elias_fano;
///
/// # fn main() -> omgfile::Result<()> {
/// let values = [2u32, 2, 5, 7, 7, 7, 10];
/// let code = elias_fano::encode(&values)?;
/// assert_eq!(elias_fano::params(&code)?.low_bits, 1);
/// assert_eq!(elias_fano::decode(&code)?, values);
/// # Ok(())
/// # }
/// ```
pub fn encode<W: EfWord>(values: &[W]) -> Result<Vec<W>> {
    if values.is_empty() {
        return Err(OmgError::precondition(
            "Elias-Fano input must hold at least one value",
        ));
    }
    if let Some(idx) = values.windows(2).position(|w| w[1] < w[0]) {
        return Err(OmgError::precondition(format!(
            "Elias-Fano input decreases at index {} ({:?} -> {:?})",
            idx + 1,
            values[idx],
            values[idx + 1]
        )));
    }

    let n = values.len() as u64;
    if n > W::MAX_U64 {
        return Err(OmgError::precondition(format!(
            "{} values do not fit a {}-bit length word",
            n,
            W::BITS
        )));
    }
    let max = values[values.len() - 1].to_u64();
    let low_bits = low_bit_width(max, n);

    let space = n
        .checked_mul(low_bits as u64 + 2)
        .ok_or_else(|| OmgError::precondition("Elias-Fano code size overflows"))?;
    let body_words = space.div_ceil(W::BITS as u64) as usize;

    let mut bits = BitBuf::<W>::zeroed(body_words);

    let mut pos = 0u64;
    let mut prev_high = 0u64;
    for value in values {
        let high = shr(value.to_u64(), low_bits);
        pos += high - prev_high;
        bits.set(pos);
        pos += 1;
        prev_high = high;
    }
    let upper_bits = pos;

    if low_bits > 0 {
        let mask = low_mask(low_bits);
        for value in values {
            let low = value.to_u64() & mask;
            for j in (0..low_bits).rev() {
                if (low >> j) & 1 == 1 {
                    bits.set(pos);
                }
                pos += 1;
            }
        }
    }

    let composite = upper_bits
        .checked_mul(TRAILER_RADIX)
        .and_then(|v| v.checked_add(low_bits as u64))
        .filter(|v| *v <= W::MAX_U64)
        .ok_or_else(|| {
            OmgError::precondition(format!(
                "trailer {} * {} + {} does not fit a {}-bit word",
                upper_bits,
                TRAILER_RADIX,
                low_bits,
                W::BITS
            ))
        })?;

    let mut words = bits.into_words();
    words.push(W::from_u64(n));
    words.push(W::from_u64(composite));
    Ok(words)
}

/// Reads and validates the trailer of a code.
pub fn params<W: EfWord>(code: &[W]) -> Result<EfParams> {
    if code.len() < TRAILER_WORDS {
        return Err(OmgError::decode(
            "elias-fano",
            format!("code holds {} words, trailer needs 2", code.len()),
        ));
    }
    let body_bits = (code.len() - TRAILER_WORDS) as u64 * W::BITS as u64;
    let len = code[code.len() - 2].to_u64();
    let composite = code[code.len() - 1].to_u64();
    let low_bits = (composite % TRAILER_RADIX) as u32;
    let upper_bits = composite / TRAILER_RADIX;

    if len == 0 {
        return Err(OmgError::decode("elias-fano", "code declares zero values"));
    }
    if low_bits > W::BITS {
        return Err(OmgError::decode(
            "elias-fano",
            format!("low bit width {} exceeds word width {}", low_bits, W::BITS),
        ));
    }
    let needed = len
        .checked_mul(low_bits as u64)
        .and_then(|lower| lower.checked_add(upper_bits));
    match needed {
        Some(needed) if needed <= body_bits && upper_bits >= len => Ok(EfParams {
            len,
            low_bits,
            upper_bits,
        }),
        _ => Err(OmgError::decode(
            "elias-fano",
            format!(
                "trailer (n={}, upperBits={}, L={}) inconsistent with {} body bits",
                len, upper_bits, low_bits, body_bits
            ),
        )),
    }
}

/// Decodes a code produced by [`encode`].
///
/// # Errors
///
/// Returns [`OmgError::Decode`] when the trailer is inconsistent with the body
/// or when the upper bitmap does not hold exactly `n` set bits.
pub fn decode<W: EfWord>(code: &[W]) -> Result<Vec<W>> {
    let EfParams {
        len,
        low_bits,
        upper_bits,
    } = params(code)?;
    let body = &code[..code.len() - TRAILER_WORDS];
    let word_bits = W::BITS as u64;

    let mut out = Vec::with_capacity(len as usize);
    let mut idx = 0u64;

    'words: for (wi, word) in body.iter().enumerate() {
        let base = wi as u64 * word_bits;
        if base >= upper_bits {
            break;
        }
        // left-align so leading_zeros counts from the word's MSB
        let mut w = word.to_u64() << (64 - W::BITS);
        let valid = (upper_bits - base).min(word_bits) as u32;
        if valid < 64 {
            w &= !(u64::MAX >> valid);
        }
        while w != 0 {
            if idx == len {
                break 'words;
            }
            let offset = w.leading_zeros() as u64;
            w &= !(1u64 << (63 - offset));

            let high = base + offset - idx;
            let low = read_bits(body, upper_bits + idx * low_bits as u64, low_bits);
            let value = shl(high, low_bits)
                .and_then(|h| h.checked_add(low))
                .filter(|v| *v <= W::MAX_U64)
                .ok_or_else(|| {
                    OmgError::decode(
                        "elias-fano",
                        format!("value {} overflows a {}-bit word", idx, W::BITS),
                    )
                })?;
            out.push(W::from_u64(value));
            idx += 1;
        }
    }

    if idx != len {
        return Err(OmgError::decode(
            "elias-fano",
            format!("upper bitmap holds {} values, trailer declares {}", idx, len),
        ));
    }
    Ok(out)
}

#[inline]
fn shr(value: u64, shift: u32) -> u64 {
    value.checked_shr(shift).unwrap_or(0)
}

#[inline]
fn shl(value: u64, shift: u32) -> Option<u64> {
    if shift >= 64 {
        return if value == 0 { Some(0) } else { None };
    }
    if value.leading_zeros() < shift {
        return None;
    }
    Some(value << shift)
}

#[inline]
fn low_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn read_bits<W: EfWord>(body: &[W], start: u64, width: u32) -> u64 {
    let word_bits = W::BITS as u64;
    let mut value = 0u64;
    for pos in start..start + width as u64 {
        let word = body[(pos / word_bits) as usize].to_u64();
        let bit = (word >> (word_bits - 1 - pos % word_bits)) & 1;
        value = (value << 1) | bit;
    }
    value
}

/// MSB-first bit buffer over codec words.
struct BitBuf<W: EfWord> {
    words: Vec<W>,
}

impl<W: EfWord> BitBuf<W> {
    fn zeroed(len: usize) -> Self {
        Self {
            words: vec![W::default(); len],
        }
    }

    #[inline]
    fn set(&mut self, pos: u64) {
        let word_bits = W::BITS as u64;
        let idx = (pos / word_bits) as usize;
        let bit = 1u64 << (word_bits - 1 - pos % word_bits);
        self.words[idx] = W::from_u64(self.words[idx].to_u64() | bit);
    }

    fn into_words(self) -> Vec<W> {
        self.words
    }
}
