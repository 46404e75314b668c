//! FASTQ read batches.
//!
//! A batch is stored as four independent streams:
//!
//! * identifiers, tokenized on `:` and ` ` into columns. Constant columns go
//!   into the `idKey` text once; varying columns are either numeric or an
//!   index into a per-column symbol table, written column-major as one
//!   prefix-summed EF64 sequence in `idValue`.
//! * bases, 2-bit packed MSB-first (A=00, T=01, G=10, C=11). Anything else is
//!   packed as A and its position recorded in `npos`; it decodes as `N`.
//! * read lengths, either the uniform `readLength` field or a `len` segment.
//! * qualities, run-length collapsed with the alphabet ranked by frequency.
//!
//! The `idKey` text is line based:
//!
//! ```text
//! S<separators>
//! =<literal>          constant column
//! #                   numeric column
//! @<sym>\t<sym>...    categorical column, symbols in first-appearance order
//! ```
//!
//! A batch whose identifiers do not share one separator pattern is stored
//! literally: `idKey` is `*` and `idValue` holds the newline-joined ids.

use std::collections::HashMap;

use crate::{
    codec::{
        compress, decode_monotone, decompress, encode_monotone, prefix_sum,
        successive_differences,
    },
    Config, EncodedEntry, EntrySchema, FastqRead, FieldKind, FieldValue, OmgError, ReadBatch,
    Result,
};

pub const SCHEMA: EntrySchema = EntrySchema {
    fields: &[
        ("firstRead", FieldKind::U32),
        ("lastRead", FieldKind::U32),
        ("readLength", FieldKind::U32),
        ("batchIndex", FieldKind::U32),
    ],
    segments: &["idKey", "idValue", "seq", "npos", "len", "qKey", "qValue"],
};

const LITERAL_KEY: &[u8] = b"*";

pub fn encode(batch: &ReadBatch, config: &Config) -> Result<Option<EncodedEntry>> {
    let id = batch.index;
    if batch.reads.is_empty() {
        return Ok(None);
    }
    for (i, read) in batch.reads.iter().enumerate() {
        if read.seq.len() != read.qual.len() {
            return Err(OmgError::InvalidRecord {
                id,
                reason: format!(
                    "read {} has {} bases but {} quality values",
                    i,
                    read.seq.len(),
                    read.qual.len()
                ),
            });
        }
        if read.id.contains(&b'\n') {
            return Err(OmgError::InvalidRecord {
                id,
                reason: format!("read {} identifier contains a newline", i),
            });
        }
    }
    let count = u32::try_from(batch.reads.len()).map_err(|_| OmgError::InvalidRecord {
        id,
        reason: "batch holds more than u32::MAX reads".to_string(),
    })?;
    let last_read = batch
        .first_read
        .checked_add(count - 1)
        .ok_or_else(|| OmgError::InvalidRecord {
            id,
            reason: "read numbering overflows u32".to_string(),
        })?;

    let level = config.compression_level;
    let (id_key, id_value) = encode_identifiers(&batch.reads, level)?;
    let (seq, npos) = encode_sequence(&batch.reads, level)?;
    let (read_length, len) = encode_lengths(&batch.reads, level)?;
    let (q_key, q_value) = encode_quality(&batch.reads, level)?;

    let mut entry = EncodedEntry::new(id, format!("read_{}-{}", batch.first_read, last_read));
    entry.push_field("firstRead", FieldValue::U32(batch.first_read));
    entry.push_field("lastRead", FieldValue::U32(last_read));
    entry.push_field("readLength", FieldValue::U32(read_length));
    entry.push_field("batchIndex", FieldValue::U32(batch.index));
    entry.push_segment("idKey", id_key);
    entry.push_segment("idValue", id_value);
    entry.push_segment("seq", seq);
    entry.push_segment("npos", npos);
    entry.push_segment("len", len);
    entry.push_segment("qKey", q_key);
    entry.push_segment("qValue", q_value);
    Ok(Some(entry))
}

/// Decodes a read batch with the index it had in the source.
pub fn decode(entry: &EncodedEntry) -> Result<ReadBatch> {
    let first_read = entry.u32("firstRead")?;
    let last_read = entry.u32("lastRead")?;
    if last_read < first_read {
        return Err(OmgError::integrity(format!(
            "read entry {} spans {}..{}",
            entry.id, first_read, last_read
        )));
    }
    let count = (last_read - first_read) as usize + 1;

    let lengths = decode_lengths(entry, count)?;
    let ids = decode_identifiers(entry, count)?;
    let total: usize = lengths.iter().sum();
    let bases = decode_sequence(entry, total)?;
    let quals = decode_quality(entry, total)?;

    let mut reads = Vec::with_capacity(count);
    let mut offset = 0;
    for (id, len) in ids.into_iter().zip(lengths) {
        reads.push(FastqRead {
            id,
            seq: bases[offset..offset + len].to_vec(),
            qual: quals[offset..offset + len].to_vec(),
        });
        offset += len;
    }
    Ok(ReadBatch {
        index: entry.u32("batchIndex")?,
        first_read,
        reads,
    })
}

fn is_separator(b: u8) -> bool {
    b == b':' || b == b' '
}

fn tokenize(id: &[u8]) -> (Vec<u8>, Vec<&[u8]>) {
    let seps = id.iter().copied().filter(|b| is_separator(*b)).collect();
    let tokens = id.split(|b| is_separator(*b)).collect();
    (seps, tokens)
}

/// Parses decimal text that round-trips through `u64`.
fn canonical_number(token: &[u8]) -> Option<u64> {
    if token.is_empty() || !token.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if token.len() > 1 && token[0] == b'0' {
        return None;
    }
    std::str::from_utf8(token).ok()?.parse().ok()
}

enum Column<'a> {
    Constant(&'a [u8]),
    Numeric(Vec<u64>),
    Categorical(Vec<&'a [u8]>, Vec<u64>),
}

fn classify<'a>(values: &[&'a [u8]]) -> Column<'a> {
    if values.iter().all(|v| *v == values[0]) {
        return Column::Constant(values[0]);
    }
    if let Some(numbers) = values
        .iter()
        .map(|v| canonical_number(v))
        .collect::<Option<Vec<u64>>>()
    {
        return Column::Numeric(numbers);
    }
    let mut symbols: Vec<&'a [u8]> = Vec::new();
    let mut lookup: HashMap<&'a [u8], u64> = HashMap::new();
    let indices: Vec<u64> = values
        .iter()
        .map(|&v| {
            *lookup.entry(v).or_insert_with(|| {
                symbols.push(v);
                (symbols.len() - 1) as u64
            })
        })
        .collect();
    Column::Categorical(symbols, indices)
}

fn encode_identifiers(reads: &[FastqRead], level: i32) -> Result<(Vec<u8>, Vec<u8>)> {
    match tokenized_identifiers(reads, level)? {
        Some(streams) => Ok(streams),
        None => {
            let joined = reads
                .iter()
                .map(|r| r.id.as_slice())
                .collect::<Vec<_>>()
                .join(&b'\n');
            Ok((compress(LITERAL_KEY, level)?, compress(&joined, level)?))
        }
    }
}

/// Column-wise identifier streams, or `None` when the batch needs the literal form.
fn tokenized_identifiers(reads: &[FastqRead], level: i32) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    if reads.iter().any(|r| r.id.contains(&b'\t') || r.id.contains(&b'\r')) {
        return Ok(None);
    }
    let rows: Vec<(Vec<u8>, Vec<&[u8]>)> = reads.iter().map(|r| tokenize(&r.id)).collect();
    let seps = &rows[0].0;
    if rows.iter().any(|(s, _)| s != seps) {
        return Ok(None);
    }

    let mut key = Vec::new();
    key.push(b'S');
    key.extend_from_slice(seps);
    key.push(b'\n');

    let mut values: Vec<u64> = Vec::new();
    for col in 0..seps.len() + 1 {
        let column: Vec<&[u8]> = rows.iter().map(|(_, tokens)| tokens[col]).collect();
        match classify(&column) {
            Column::Constant(literal) => {
                key.push(b'=');
                key.extend_from_slice(literal);
            }
            Column::Numeric(numbers) => {
                key.push(b'#');
                values.extend(numbers);
            }
            Column::Categorical(symbols, indices) => {
                key.push(b'@');
                key.extend_from_slice(&symbols.join(&b'\t'));
                values.extend(indices);
            }
        }
        key.push(b'\n');
    }

    let id_value = if values.is_empty() {
        Vec::new()
    } else {
        match prefix_sum::<u64>(&values) {
            Ok(sums) => encode_monotone(&sums, level)?,
            // huge numeric columns; keep the identifiers verbatim instead
            Err(OmgError::Precondition(_)) => return Ok(None),
            Err(e) => return Err(e),
        }
    };
    Ok(Some((compress(&key, level)?, id_value)))
}

fn decode_identifiers(entry: &EncodedEntry, count: usize) -> Result<Vec<Vec<u8>>> {
    let key = decompress(entry.segment("idKey")?)?;
    let raw_value = entry.segment("idValue")?;

    if key == LITERAL_KEY {
        let joined = decompress(raw_value)?;
        let ids: Vec<Vec<u8>> = joined.split(|b| *b == b'\n').map(<[u8]>::to_vec).collect();
        if ids.len() != count {
            return Err(OmgError::integrity(format!(
                "read entry {} stores {} literal identifiers for {} reads",
                entry.id,
                ids.len(),
                count
            )));
        }
        return Ok(ids);
    }

    let bad_key = |reason: &str| {
        OmgError::integrity(format!("read entry {} idKey: {}", entry.id, reason))
    };
    let mut lines = key.split(|b| *b == b'\n');
    let seps = lines
        .next()
        .and_then(|l| l.strip_prefix(b"S"))
        .ok_or_else(|| bad_key("missing separator line"))?;

    let values = if raw_value.is_empty() {
        Vec::new()
    } else {
        successive_differences(&decode_monotone::<u64>(raw_value)?)?
    };
    let mut values = values.chunks(count.max(1));

    let mut columns: Vec<Vec<Vec<u8>>> = Vec::with_capacity(seps.len() + 1);
    for _ in 0..seps.len() + 1 {
        let line = lines.next().ok_or_else(|| bad_key("too few column lines"))?;
        let column = match line.split_first() {
            Some((&b'=', literal)) => vec![literal.to_vec(); count],
            Some((&b'#', _)) => {
                let chunk = values.next().ok_or_else(|| bad_key("idValue too short"))?;
                chunk.iter().map(|v| v.to_string().into_bytes()).collect()
            }
            Some((&b'@', table)) => {
                let symbols: Vec<&[u8]> = table.split(|b| *b == b'\t').collect();
                let chunk = values.next().ok_or_else(|| bad_key("idValue too short"))?;
                chunk
                    .iter()
                    .map(|&v| {
                        symbols
                            .get(v as usize)
                            .map(|s| s.to_vec())
                            .ok_or_else(|| bad_key("symbol index out of range"))
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            _ => return Err(bad_key("unknown column line")),
        };
        if column.len() != count {
            return Err(bad_key("idValue too short"));
        }
        columns.push(column);
    }
    if values.next().is_some() {
        return Err(bad_key("idValue has trailing values"));
    }

    let ids = (0..count)
        .map(|row| {
            let mut id = columns[0][row].clone();
            for (sep, column) in seps.iter().zip(&columns[1..]) {
                id.push(*sep);
                id.extend_from_slice(&column[row]);
            }
            id
        })
        .collect();
    Ok(ids)
}

fn base_code(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(0b00),
        b'T' => Some(0b01),
        b'G' => Some(0b10),
        b'C' => Some(0b11),
        _ => None,
    }
}

const BASES: [u8; 4] = [b'A', b'T', b'G', b'C'];

fn encode_sequence(reads: &[FastqRead], level: i32) -> Result<(Vec<u8>, Vec<u8>)> {
    let total: usize = reads.iter().map(|r| r.seq.len()).sum();
    let mut packed = Vec::with_capacity(total.div_ceil(4));
    let mut npos: Vec<u32> = Vec::new();

    let mut byte = 0u8;
    let mut filled = 0;
    let mut pos = 0usize;
    for base in reads.iter().flat_map(|r| r.seq.iter()) {
        let code = match base_code(base.to_ascii_uppercase()) {
            Some(code) => code,
            None => {
                let pos = u32::try_from(pos).map_err(|_| {
                    OmgError::precondition("ambiguous base position overflows a 32-bit word")
                })?;
                npos.push(pos);
                0
            }
        };
        byte = (byte << 2) | code;
        filled += 1;
        if filled == 4 {
            packed.push(byte);
            byte = 0;
            filled = 0;
        }
        pos += 1;
    }
    if filled > 0 {
        packed.push(byte << (2 * (4 - filled)));
    }

    let npos = if npos.is_empty() {
        Vec::new()
    } else {
        encode_monotone(&npos, level)?
    };
    Ok((compress(&packed, level)?, npos))
}

fn decode_sequence(entry: &EncodedEntry, total: usize) -> Result<Vec<u8>> {
    let packed = decompress(entry.segment("seq")?)?;
    if packed.len() != total.div_ceil(4) {
        return Err(OmgError::integrity(format!(
            "read entry {} packs {} bytes for {} bases",
            entry.id,
            packed.len(),
            total
        )));
    }
    let mut bases: Vec<u8> = packed
        .iter()
        .flat_map(|&byte| {
            (0..4u32)
                .rev()
                .map(move |slot| BASES[((byte >> (2 * slot)) & 0b11) as usize])
        })
        .take(total)
        .collect();

    let raw = entry.segment("npos")?;
    if !raw.is_empty() {
        for pos in decode_monotone::<u32>(raw)? {
            let base = bases.get_mut(pos as usize).ok_or_else(|| {
                OmgError::integrity(format!(
                    "read entry {} ambiguous base {} past {} bases",
                    entry.id, pos, total
                ))
            })?;
            *base = b'N';
        }
    }
    Ok(bases)
}

/// Returns the `readLength` field and the `len` segment.
fn encode_lengths(reads: &[FastqRead], level: i32) -> Result<(u32, Vec<u8>)> {
    let first = reads[0].seq.len();
    if first > 0 && reads.iter().all(|r| r.seq.len() == first) {
        if let Ok(len) = u32::try_from(first) {
            return Ok((len, Vec::new()));
        }
    }
    let lengths: Vec<u64> = reads.iter().map(|r| r.seq.len() as u64).collect();
    Ok((0, encode_monotone(&prefix_sum::<u32>(&lengths)?, level)?))
}

fn decode_lengths(entry: &EncodedEntry, count: usize) -> Result<Vec<usize>> {
    let uniform = entry.u32("readLength")?;
    if uniform > 0 {
        return Ok(vec![uniform as usize; count]);
    }
    let lengths = successive_differences(&decode_monotone::<u32>(entry.segment("len")?)?)?;
    if lengths.len() != count {
        return Err(OmgError::integrity(format!(
            "read entry {} stores {} lengths for {} reads",
            entry.id,
            lengths.len(),
            count
        )));
    }
    Ok(lengths.into_iter().map(|l| l as usize).collect())
}

fn encode_quality(reads: &[FastqRead], level: i32) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut counts = [0u64; 256];
    for q in reads.iter().flat_map(|r| r.qual.iter()) {
        counts[*q as usize] += 1;
    }
    // descending frequency, ties by byte value
    let mut alphabet: Vec<u8> = (0..=255u8).filter(|b| counts[*b as usize] > 0).collect();
    alphabet.sort_by(|a, b| counts[*b as usize].cmp(&counts[*a as usize]).then(a.cmp(b)));

    if alphabet.len() <= 1 {
        return Ok((alphabet, Vec::new()));
    }

    let mut rank = [0u64; 256];
    for (r, symbol) in alphabet.iter().enumerate() {
        rank[*symbol as usize] = r as u64;
    }

    let mut pairs: Vec<u64> = Vec::new();
    let mut qualities = reads.iter().flat_map(|r| r.qual.iter().copied());
    if let Some(mut current) = qualities.next() {
        let mut run = 1u64;
        for q in qualities {
            if q == current {
                run += 1;
            } else {
                pairs.push(rank[current as usize]);
                pairs.push(run);
                current = q;
                run = 1;
            }
        }
        pairs.push(rank[current as usize]);
        pairs.push(run);
    }
    Ok((alphabet, encode_monotone(&prefix_sum::<u64>(&pairs)?, level)?))
}

fn decode_quality(entry: &EncodedEntry, total: usize) -> Result<Vec<u8>> {
    let alphabet = entry.segment("qKey")?;
    let raw = entry.segment("qValue")?;
    let quals = match (alphabet.len(), raw.is_empty()) {
        (0, true) => Vec::new(),
        (1, true) => vec![alphabet[0]; total],
        (_, false) => {
            let pairs = successive_differences(&decode_monotone::<u64>(raw)?)?;
            if pairs.len() % 2 != 0 {
                return Err(OmgError::integrity(format!(
                    "read entry {} quality runs are not pairs",
                    entry.id
                )));
            }
            let mut quals = Vec::with_capacity(total);
            for pair in pairs.chunks_exact(2) {
                let symbol = alphabet.get(pair[0] as usize).ok_or_else(|| {
                    OmgError::integrity(format!(
                        "read entry {} quality rank {} outside alphabet of {}",
                        entry.id,
                        pair[0],
                        alphabet.len()
                    ))
                })?;
                if quals.len() as u64 + pair[1] > total as u64 {
                    break;
                }
                quals.extend(std::iter::repeat(*symbol).take(pair[1] as usize));
            }
            quals
        }
        _ => {
            return Err(OmgError::integrity(format!(
                "read entry {} has a multi-symbol quality alphabet without runs",
                entry.id
            )))
        }
    };
    if quals.len() != total {
        return Err(OmgError::integrity(format!(
            "read entry {} decodes {} quality values for {} bases",
            entry.id,
            quals.len(),
            total
        )));
    }
    Ok(quals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteMode;

    fn batch(reads: Vec<FastqRead>) -> ReadBatch {
        ReadBatch {
            index: 0,
            first_read: 100,
            reads,
        }
    }

    fn roundtrip(batch: &ReadBatch) -> ReadBatch {
        let entry = encode(batch, &Config::default()).unwrap().unwrap();
        decode(&entry).unwrap()
    }

    fn illumina(tile: u32, x: u32, y: u32, seq: &str, qual: &str) -> FastqRead {
        FastqRead::new(
            format!("M00123:45:000000000-ABCDE:1:{}:{}:{} 1:N:0:1", tile, x, y),
            seq,
            qual,
        )
    }

    #[test]
    fn test_illumina_batch_roundtrip() {
        let batch = batch(vec![
            illumina(1101, 15589, 1333, "ACGTNACGTA", "IIIIIHHH#I"),
            illumina(1101, 15234, 1340, "TTGCAACGTT", "IIIIIIIIII"),
            illumina(1102, 2000, 1, "GGGGCCCCAA", "##########"),
        ]);
        assert_eq!(roundtrip(&batch), batch);
    }

    #[test]
    fn test_title_and_fields() {
        let batch = batch(vec![
            illumina(1, 1, 1, "ACGT", "IIII"),
            illumina(1, 1, 2, "ACGT", "IIII"),
        ]);
        let entry = encode(&batch, &Config::default()).unwrap().unwrap();
        assert_eq!(entry.title, "read_100-101");
        assert_eq!(entry.u32("readLength").unwrap(), 4);
        assert!(entry.segment("len").unwrap().is_empty());
        // single quality symbol: key only
        assert_eq!(entry.segment("qKey").unwrap(), b"I");
        assert!(entry.segment("qValue").unwrap().is_empty());
    }

    #[test]
    fn test_identifier_columns() {
        let reads = vec![
            FastqRead::new("run7:lane1:tileA:10", "A", "I"),
            FastqRead::new("run7:lane2:tileB:11", "A", "I"),
            FastqRead::new("run7:lane1:tileA:9", "A", "I"),
        ];
        let (key, _) = tokenized_identifiers(&reads, 1).unwrap().unwrap();
        let key = decompress(&key).unwrap();
        assert_eq!(key, b"S:::\n=run7\n@lane1\tlane2\n@tileA\ttileB\n#\n".to_vec());
        assert_eq!(roundtrip(&batch(reads.clone())).reads, reads);
    }

    #[test]
    fn test_leading_zero_numbers_stay_categorical() {
        let reads = vec![
            FastqRead::new("r:007", "A", "I"),
            FastqRead::new("r:8", "A", "I"),
        ];
        let (key, _) = tokenized_identifiers(&reads, 1).unwrap().unwrap();
        assert_eq!(decompress(&key).unwrap(), b"S:\n=r\n@007\t8\n".to_vec());
        assert_eq!(roundtrip(&batch(reads.clone())).reads, reads);
    }

    #[test]
    fn test_literal_identifier_fallback() {
        let reads = vec![
            FastqRead::new("SRR001.1 length=4", "ACGT", "IIII"),
            FastqRead::new("SRR001.2:extra", "ACGT", "IIII"),
            FastqRead::new("tab\tseparated", "ACGT", "IIII"),
        ];
        let entry = encode(&batch(reads.clone()), &Config::default())
            .unwrap()
            .unwrap();
        assert_eq!(decompress(entry.segment("idKey").unwrap()).unwrap(), b"*");
        assert_eq!(decode(&entry).unwrap().reads, reads);
    }

    #[test]
    fn test_sequence_packing_flushes_last_byte() {
        let reads = vec![FastqRead::new("r", "ATGCA", "IIIII")];
        let (seq, npos) = encode_sequence(&reads, 1).unwrap();
        assert_eq!(decompress(&seq).unwrap(), vec![0b0001_1011, 0b0000_0000]);
        assert!(npos.is_empty());

        let reads = vec![FastqRead::new("r", "CCCCC", "IIIII")];
        let (seq, _) = encode_sequence(&reads, 1).unwrap();
        assert_eq!(decompress(&seq).unwrap(), vec![0xFF, 0b1100_0000]);
    }

    #[test]
    fn test_ambiguous_and_lowercase_bases() {
        let batch = batch(vec![
            FastqRead::new("r:1", "acgtn", "IIIII"),
            FastqRead::new("r:2", "NNRYA", "IIIII"),
        ]);
        let back = roundtrip(&batch);
        assert_eq!(back.reads[0].seq, b"ACGTN");
        assert_eq!(back.reads[1].seq, b"NNNNA");
    }

    #[test]
    fn test_variable_read_lengths() {
        let batch = batch(vec![
            FastqRead::new("r:1", "ACGTACGT", "IIIIIIII"),
            FastqRead::new("r:2", "", ""),
            FastqRead::new("r:3", "GG", "#I"),
        ]);
        let entry = encode(&batch, &Config::default()).unwrap().unwrap();
        assert_eq!(entry.u32("readLength").unwrap(), 0);
        assert!(!entry.segment("len").unwrap().is_empty());
        assert_eq!(decode(&entry).unwrap(), batch);
    }

    #[test]
    fn test_quality_ranking_and_final_run() {
        let reads = vec![
            FastqRead::new("r:1", "AAAAA", "BBAAC"),
            FastqRead::new("r:2", "AAA", "CCC"),
        ];
        let (alphabet, _) = encode_quality(&reads, 1).unwrap();
        // C x4, B x2, A x2 (tie broken by byte value)
        assert_eq!(alphabet, b"CAB");
        assert_eq!(roundtrip(&batch(reads.clone())).reads, reads);
    }

    #[test]
    fn test_invalid_batches() {
        assert!(encode(&batch(vec![]), &Config::default()).unwrap().is_none());

        let bad = ReadBatch {
            index: 8,
            first_read: 0,
            reads: vec![FastqRead::new("r", "ACGT", "II")],
        };
        assert!(matches!(
            encode(&bad, &Config::default()),
            Err(OmgError::InvalidRecord { id: 8, .. })
        ));
    }

    #[test]
    fn test_source_index_survives_position() {
        let mut batch = batch(vec![illumina(3, 1, 1, "ACGT", "IIII")]);
        batch.index = 41;
        let entry = encode(&batch, &Config::default()).unwrap().unwrap();
        assert_eq!(entry.u32("batchIndex").unwrap(), 41);

        // stored at position 2 after earlier batches were dropped
        let bytes = entry.to_bytes(WriteMode::Binary).unwrap();
        let parsed = EncodedEntry::parse(&bytes, WriteMode::Binary, &SCHEMA, 2).unwrap();
        assert_eq!(decode(&parsed).unwrap().index, 41);
    }

    #[test]
    fn test_entry_parses_in_every_mode() {
        let batch = batch(vec![
            illumina(3, 1, 1, "ACGTT", "IIII#"),
            illumina(3, 2, 9, "ACNTT", "II#II"),
        ]);
        let entry = encode(&batch, &Config::default()).unwrap().unwrap();
        for mode in [WriteMode::Binary, WriteMode::Json, WriteMode::Yaml] {
            let bytes = entry.to_bytes(mode).unwrap();
            let parsed = EncodedEntry::parse(&bytes, mode, &SCHEMA, 0).unwrap();
            assert_eq!(decode(&parsed).unwrap(), batch, "{}", mode);
        }
    }
}
