//! Byte-level wrappers around the Elias-Fano codec.
//!
//! Codec words are always serialized little-endian, independent of the host.
//! Packed words are then compressed as a single zstd frame, and textual write
//! modes carry the compressed bytes as standard padded Base64.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::elias_fano::{self, EfWord};
use crate::{OmgError, Result};

/// zstd level used when the configuration does not override it.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 1;

/// Compresses `data` into one zstd frame.
pub fn compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    zstd::bulk::compress(data, level)
        .map_err(|e| OmgError::decode("zstd compress", e.to_string()))
}

/// Decompresses a zstd frame produced by [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::stream::decode_all(data).map_err(|e| OmgError::decode("zstd block", e.to_string()))
}

/// Serializes codec words as little-endian bytes.
pub fn pack_words<W: EfWord>(words: &[W]) -> Vec<u8> {
    if cfg!(target_endian = "little") {
        return bytemuck::cast_slice::<W, u8>(words).to_vec();
    }
    let mut out = Vec::with_capacity(words.len() * W::BYTES);
    for word in words {
        word.write_le(&mut out);
    }
    out
}

/// Deserializes little-endian bytes back into codec words.
///
/// # Errors
///
/// Returns [`OmgError::Decode`] when the byte count is not a multiple of the
/// word size.
pub fn unpack_words<W: EfWord>(bytes: &[u8]) -> Result<Vec<W>> {
    if bytes.len() % W::BYTES != 0 {
        return Err(OmgError::decode(
            "word unpack",
            format!(
                "{} bytes is not a multiple of the {}-byte word size",
                bytes.len(),
                W::BYTES
            ),
        ));
    }
    if cfg!(target_endian = "little") {
        // copies, so the input needs no particular alignment
        return Ok(bytemuck::pod_collect_to_vec::<u8, W>(bytes));
    }
    Ok(bytes.chunks_exact(W::BYTES).map(W::read_le).collect())
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| OmgError::decode("base64", e.to_string()))
}

/// Elias-Fano encodes a non-decreasing sequence, packs it and compresses it.
pub fn encode_monotone<W: EfWord>(values: &[W], level: i32) -> Result<Vec<u8>> {
    let code = elias_fano::encode(values)?;
    compress(&pack_words(&code), level)
}

/// Inverse of [`encode_monotone`].
pub fn decode_monotone<W: EfWord>(bytes: &[u8]) -> Result<Vec<W>> {
    let packed = decompress(bytes)?;
    let code = unpack_words::<W>(&packed)?;
    elias_fano::decode(&code)
}

/// Serializes an `f32` table as little-endian bytes.
pub fn pack_f32s(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn unpack_f32s(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(OmgError::decode(
            "f32 table",
            format!("{} bytes is not a multiple of 4", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Serializes an `f64` table as little-endian bytes.
pub fn pack_f64s(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn unpack_f64s(bytes: &[u8]) -> Result<Vec<f64>> {
    if bytes.len() % 8 != 0 {
        return Err(OmgError::decode(
            "f64 table",
            format!("{} bytes is not a multiple of 8", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(c);
            f64::from_le_bytes(buf)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_words_is_little_endian() {
        let bytes = pack_words(&[0x0102_0304u32, 0xA0B0_C0D0]);
        assert_eq!(bytes, vec![0x04, 0x03, 0x02, 0x01, 0xD0, 0xC0, 0xB0, 0xA0]);

        let bytes = pack_words(&[1u64]);
        assert_eq!(bytes, vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_unpack_words_unaligned_input() {
        let mut bytes = vec![0xFFu8];
        bytes.extend_from_slice(&pack_words(&[7u64, 9]));
        let words = unpack_words::<u64>(&bytes[1..]).unwrap();
        assert_eq!(words, vec![7, 9]);
    }

    #[test]
    fn test_unpack_words_rejects_partial_word() {
        let err = unpack_words::<u32>(&[1, 2, 3, 4, 5]).unwrap_err();
        assert!(matches!(err, OmgError::Decode { .. }));
    }

    #[test]
    fn test_compress_roundtrip() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 17) as u8).collect();
        let packed = compress(&data, DEFAULT_COMPRESSION_LEVEL).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_decompress_garbage_is_decode_error() {
        let err = decompress(b"definitely not zstd").unwrap_err();
        assert!(matches!(err, OmgError::Decode { context: "zstd block", .. }));
    }

    #[test]
    fn test_base64() {
        assert_eq!(encode_base64(b"omg"), "b21n");
        assert_eq!(decode_base64("b21n\n").unwrap(), b"omg");
        assert!(decode_base64("b2*n").is_err());
    }

    #[test]
    fn test_monotone_segment() {
        let values: Vec<u64> = (0..500).map(|i| i * i).collect();
        let bytes = encode_monotone(&values, 3).unwrap();
        assert_eq!(decode_monotone::<u64>(&bytes).unwrap(), values);
    }

    #[test]
    fn test_float_tables() {
        let values = [0.5f32, -1.25, f32::NAN];
        let back = unpack_f32s(&pack_f32s(&values)).unwrap();
        assert_eq!(back[..2], values[..2]);
        assert!(back[2].is_nan());

        let values = [100.0f64, 100.001, 250.5];
        assert_eq!(unpack_f64s(&pack_f64s(&values)).unwrap(), values);
        assert!(unpack_f64s(&[0; 7]).is_err());
    }
}
