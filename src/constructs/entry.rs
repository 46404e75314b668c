//! Byte layout of one encoded entry in each write mode.
//!
//! Binary entries are laid out as
//!
//! ```text
//! [field_0 .. field_k: 4 bytes LE each][seg_len_0 .. seg_len_m: u32 LE][seg_0 .. seg_m]
//! ```
//!
//! and are parsed against an [`EntrySchema`], since they carry no keys.
//! Text entries are a title line followed by one `key: value` line per field
//! and segment, segments as Base64.

use std::collections::HashMap;

use crate::{
    codec::{decode_base64, encode_base64},
    OmgError, Result, WriteMode,
};

/// Spelling of a missing float in text modes.
pub const MISSING: &str = "NA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    F32,
    U32,
    I32,
}

/// A fixed-width scalar field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    F32(f32),
    U32(u32),
    I32(i32),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::F32(_) => FieldKind::F32,
            FieldValue::U32(_) => FieldKind::U32,
            FieldValue::I32(_) => FieldKind::I32,
        }
    }

    fn le_bytes(&self) -> [u8; 4] {
        match self {
            FieldValue::F32(v) => v.to_le_bytes(),
            FieldValue::U32(v) => v.to_le_bytes(),
            FieldValue::I32(v) => v.to_le_bytes(),
        }
    }

    fn from_le_bytes(kind: FieldKind, bytes: [u8; 4]) -> Self {
        match kind {
            FieldKind::F32 => FieldValue::F32(f32::from_le_bytes(bytes)),
            FieldKind::U32 => FieldValue::U32(u32::from_le_bytes(bytes)),
            FieldKind::I32 => FieldValue::I32(i32::from_le_bytes(bytes)),
        }
    }

    fn to_text(self, mode: WriteMode) -> String {
        match self {
            FieldValue::F32(v) if v.is_nan() => match mode {
                WriteMode::Json => format!("\"{}\"", MISSING),
                _ => MISSING.to_string(),
            },
            // JSON has no infinity literal
            FieldValue::F32(v) if v.is_infinite() && mode == WriteMode::Json => {
                format!("\"{}\"", v)
            }
            FieldValue::F32(v) => v.to_string(),
            FieldValue::U32(v) => v.to_string(),
            FieldValue::I32(v) => v.to_string(),
        }
    }

    fn parse_text(kind: FieldKind, key: &str, text: &str) -> Result<Self> {
        let bad = |e: &dyn std::fmt::Display| {
            OmgError::integrity(format!("field {} has unparsable value {:?}: {}", key, text, e))
        };
        match kind {
            FieldKind::F32 if text == MISSING => Ok(FieldValue::F32(f32::NAN)),
            FieldKind::F32 => text.parse().map(FieldValue::F32).map_err(|e| bad(&e)),
            FieldKind::U32 => text.parse().map(FieldValue::U32).map_err(|e| bad(&e)),
            FieldKind::I32 => text.parse().map(FieldValue::I32).map_err(|e| bad(&e)),
        }
    }
}

/// Ordered field and segment names of one domain's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySchema {
    pub fields: &'static [(&'static str, FieldKind)],
    pub segments: &'static [&'static str],
}

impl EntrySchema {
    /// Size of the fixed part of a binary entry.
    pub fn fixed_len(&self) -> usize {
        4 * (self.fields.len() + self.segments.len())
    }
}

/// The serialized form of one record before it is rendered to bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedEntry {
    pub id: u32,
    pub title: String,
    pub fields: Vec<(&'static str, FieldValue)>,
    pub segments: Vec<(&'static str, Vec<u8>)>,
}

impl EncodedEntry {
    pub fn new(id: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            fields: Vec::new(),
            segments: Vec::new(),
        }
    }

    pub fn push_field(&mut self, key: &'static str, value: FieldValue) {
        self.fields.push((key, value));
    }

    pub fn push_segment(&mut self, key: &'static str, bytes: Vec<u8>) {
        self.segments.push((key, bytes));
    }

    pub fn field(&self, key: &str) -> Result<FieldValue> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| OmgError::integrity(format!("entry {} has no field {}", self.id, key)))
    }

    pub fn f32(&self, key: &str) -> Result<f32> {
        match self.field(key)? {
            FieldValue::F32(v) => Ok(v),
            other => Err(self.kind_mismatch(key, other)),
        }
    }

    pub fn u32(&self, key: &str) -> Result<u32> {
        match self.field(key)? {
            FieldValue::U32(v) => Ok(v),
            other => Err(self.kind_mismatch(key, other)),
        }
    }

    pub fn i32(&self, key: &str) -> Result<i32> {
        match self.field(key)? {
            FieldValue::I32(v) => Ok(v),
            other => Err(self.kind_mismatch(key, other)),
        }
    }

    fn kind_mismatch(&self, key: &str, value: FieldValue) -> OmgError {
        OmgError::integrity(format!(
            "entry {} field {} holds {:?}",
            self.id,
            key,
            value.kind()
        ))
    }

    pub fn segment(&self, key: &str) -> Result<&[u8]> {
        self.segments
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_slice())
            .ok_or_else(|| {
                OmgError::integrity(format!("entry {} has no segment {}", self.id, key))
            })
    }

    /// Renders the entry in the given write mode.
    ///
    /// # Errors
    ///
    /// Returns [`OmgError::Precondition`] when a binary segment exceeds the
    /// u32 length prefix.
    pub fn to_bytes(&self, mode: WriteMode) -> Result<Vec<u8>> {
        match mode {
            WriteMode::Binary => self.to_binary(),
            WriteMode::Json => Ok(self.to_json().into_bytes()),
            WriteMode::Yaml => Ok(self.to_yaml().into_bytes()),
        }
    }

    fn to_binary(&self) -> Result<Vec<u8>> {
        let payload: usize = self.segments.iter().map(|(_, s)| s.len()).sum();
        let mut out =
            Vec::with_capacity(4 * (self.fields.len() + self.segments.len()) + payload);
        for (_, value) in &self.fields {
            out.extend_from_slice(&value.le_bytes());
        }
        for (key, segment) in &self.segments {
            let len = u32::try_from(segment.len()).map_err(|_| {
                OmgError::precondition(format!(
                    "segment {} of entry {} is {} bytes, above the u32 limit",
                    key,
                    self.id,
                    segment.len()
                ))
            })?;
            out.extend_from_slice(&len.to_le_bytes());
        }
        for (_, segment) in &self.segments {
            out.extend_from_slice(segment);
        }
        Ok(out)
    }

    fn text_lines(&self, mode: WriteMode) -> Vec<(&'static str, String)> {
        let mut lines = Vec::with_capacity(self.fields.len() + self.segments.len());
        for (key, value) in &self.fields {
            lines.push((*key, value.to_text(mode)));
        }
        for (key, segment) in &self.segments {
            let b64 = encode_base64(segment);
            let value = match mode {
                WriteMode::Json => format!("\"{}\"", b64),
                _ => b64,
            };
            lines.push((*key, value));
        }
        lines
    }

    fn to_json(&self) -> String {
        let lines = self.text_lines(WriteMode::Json);
        let mut out = format!(" \"{}\": {{\n", self.title);
        for (i, (key, value)) in lines.iter().enumerate() {
            let sep = if i + 1 == lines.len() { "" } else { "," };
            out.push_str(&format!("  \"{}\": {}{}\n", key, value, sep));
        }
        out.push_str(" },\n");
        out
    }

    fn to_yaml(&self) -> String {
        let mut out = format!("{}:\n", self.title);
        for (key, value) in self.text_lines(WriteMode::Yaml) {
            out.push_str(&format!(" {}: {}\n", key, value));
        }
        out.push('\n');
        out
    }

    /// Parses an entry rendered by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`OmgError::Integrity`] when the bytes do not match the schema
    /// and [`OmgError::Decode`] on malformed Base64.
    pub fn parse(bytes: &[u8], mode: WriteMode, schema: &EntrySchema, id: u32) -> Result<Self> {
        match mode {
            WriteMode::Binary => Self::parse_binary(bytes, schema, id),
            WriteMode::Json | WriteMode::Yaml => Self::parse_text(bytes, schema, id),
        }
    }

    fn parse_binary(bytes: &[u8], schema: &EntrySchema, id: u32) -> Result<Self> {
        if bytes.len() < schema.fixed_len() {
            return Err(OmgError::integrity(format!(
                "entry {} is {} bytes, shorter than its {} byte fixed part",
                id,
                bytes.len(),
                schema.fixed_len()
            )));
        }
        let word = |i: usize| [bytes[4 * i], bytes[4 * i + 1], bytes[4 * i + 2], bytes[4 * i + 3]];

        let mut entry = Self::new(id, String::new());
        for (i, (key, kind)) in schema.fields.iter().enumerate() {
            entry.push_field(key, FieldValue::from_le_bytes(*kind, word(i)));
        }

        let mut cursor = schema.fixed_len();
        for (j, key) in schema.segments.iter().enumerate() {
            let len = u32::from_le_bytes(word(schema.fields.len() + j)) as usize;
            let end = cursor
                .checked_add(len)
                .filter(|end| *end <= bytes.len())
                .ok_or_else(|| {
                    OmgError::integrity(format!(
                        "segment {} of entry {} runs past the entry end",
                        key, id
                    ))
                })?;
            entry.push_segment(key, bytes[cursor..end].to_vec());
            cursor = end;
        }
        if cursor != bytes.len() {
            return Err(OmgError::integrity(format!(
                "entry {} has {} trailing bytes",
                id,
                bytes.len() - cursor
            )));
        }
        Ok(entry)
    }

    fn parse_text(bytes: &[u8], schema: &EntrySchema, id: u32) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| OmgError::integrity(format!("entry {} is not UTF-8: {}", id, e)))?;
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

        let title = lines
            .next()
            .map(|l| l.trim_end_matches('{').trim().trim_end_matches(':'))
            .map(unquote)
            .ok_or_else(|| OmgError::integrity(format!("entry {} is empty", id)))?;

        let mut values: HashMap<&str, &str> = HashMap::new();
        for line in lines {
            if line.starts_with('}') {
                break;
            }
            let (key, value) = split_key_value(line).ok_or_else(|| {
                OmgError::integrity(format!("entry {} has malformed line {:?}", id, line))
            })?;
            values.insert(key, value);
        }

        let lookup = |key: &str| {
            values.get(key).copied().ok_or_else(|| {
                OmgError::integrity(format!("entry {} ({}) has no key {}", id, title, key))
            })
        };

        let mut entry = Self::new(id, title);
        for (key, kind) in schema.fields {
            entry.push_field(key, FieldValue::parse_text(*kind, key, lookup(key)?)?);
        }
        for key in schema.segments {
            entry.push_segment(key, decode_base64(lookup(key)?)?);
        }
        Ok(entry)
    }
}

/// Splits `key: value` at the first colon, stripping quotes and a trailing comma.
pub(crate) fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let value = value.trim().trim_end_matches(',').trim();
    Some((unquote(key.trim()), unquote(value)))
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}
