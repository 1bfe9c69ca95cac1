//! Export/import codec (spec.md S:4.5). Binary is the canonical,
//! fully round-trippable format; JSON and CSV are export-only here --
//! their import paths return [`KvError::NotSupported`], exactly as the
//! contract allows ("JSON and CSV import may return NotSupported").
//!
//! Grounded in the teacher's `sqlite/issues.rs` export helpers for the
//! "stream rows, call progress every N, honor cancellation" shape; the
//! three wire formats themselves are new since the teacher has no
//! multi-format export surface.

pub mod binary;
pub mod csv;
pub mod json;

use crate::backend::{ProgressCallback, Record};
use crate::error::{KvError, Result};

/// Selects which wire format `export`/`import` use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Binary,
    Json,
    Csv,
}

/// Maps each byte of `data` to its own Latin-1 code point (`0u8..=255u8`
/// are all valid Unicode scalar values), producing a `String` that carries
/// arbitrary binary data byte-for-byte. Used instead of
/// `String::from_utf8_lossy`, which replaces any byte sequence that isn't
/// valid UTF-8 with U+FFFD and permanently destroys it -- `data` is an
/// opaque blob per spec.md S:3, not text, so it is not generally valid
/// UTF-8 to begin with.
pub(crate) fn bytes_to_latin1_string(data: &[u8]) -> String {
    data.iter().map(|&b| b as char).collect()
}

/// Encodes `data` as the inner content of a JSON string literal (without
/// the surrounding quotes), byte-for-byte via [`bytes_to_latin1_string`].
/// Control characters and DEL are emitted as `\u00XX`; quote and backslash
/// are escaped as JSON requires (spec.md S:4.5).
pub(crate) fn escape_json_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &b in data {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x08 => out.push_str("\\b"),
            0x0C => out.push_str("\\f"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x00..=0x1F | 0x7F => out.push_str(&format!("\\u{b:04x}")),
            _ => out.push(b as char),
        }
    }
    out
}

/// Detects the format of an import file by peeking its magic (binary) or
/// its first printable byte (`{` -> JSON, otherwise CSV), per spec.md S:4.5.
pub fn sniff_format(bytes: &[u8]) -> Format {
    if bytes.starts_with(binary::MAGIC) {
        return Format::Binary;
    }
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Format::Json,
        _ => Format::Csv,
    }
}

/// Whether `term`/`cmd` are included alongside `key`/`data` in the wire
/// representation. Binary always carries all four fields; JSON/CSV may
/// suppress term/cmd to produce a terser export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub include_metadata: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
        }
    }
}

/// Encodes `records` in `format` and returns the serialized bytes,
/// invoking `callback` every 100 entries and once more at the end. A
/// `false` return from the callback aborts with [`KvError::Cancelled`]
/// at the next boundary.
pub fn encode(
    records: &[Record],
    format: Format,
    options: ExportOptions,
    mut callback: Option<&mut ProgressCallback<'_>>,
) -> Result<Vec<u8>> {
    let total = records.len() as u64;
    let mut poll = |done: u64| -> Result<()> {
        if done % 100 == 0 || done == total {
            if let Some(cb) = callback.as_deref_mut() {
                if !cb(done, total) {
                    return Err(KvError::Cancelled);
                }
            }
        }
        Ok(())
    };

    let bytes = match format {
        Format::Binary => binary::encode(records, &mut poll)?,
        Format::Json => json::encode(records, options, &mut poll)?,
        Format::Csv => csv::encode(records, options, &mut poll)?,
    };
    Ok(bytes)
}

/// Decodes a record stream previously produced by [`encode`]. Only
/// [`Format::Binary`] is actually supported for import; JSON and CSV
/// return [`KvError::NotSupported`].
pub fn decode(
    bytes: &[u8],
    format: Format,
    mut callback: Option<&mut ProgressCallback<'_>>,
) -> Result<Vec<Record>> {
    match format {
        Format::Binary => binary::decode(bytes, &mut callback),
        Format::Json => Err(KvError::NotSupported("JSON import".into())),
        Format::Csv => Err(KvError::NotSupported("CSV import".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Record> {
        vec![
            Record {
                id: 1,
                term: 1,
                cmd: 1,
                data: b"a".to_vec(),
            },
            Record {
                id: 2,
                term: 2,
                cmd: 2,
                data: b"b".to_vec(),
            },
        ]
    }

    #[test]
    fn sniff_detects_binary_json_csv() {
        let bin = encode(&sample(), Format::Binary, ExportOptions::default(), None).unwrap();
        assert_eq!(sniff_format(&bin), Format::Binary);

        let json = encode(&sample(), Format::Json, ExportOptions::default(), None).unwrap();
        assert_eq!(sniff_format(&json), Format::Json);

        let csv = encode(&sample(), Format::Csv, ExportOptions::default(), None).unwrap();
        assert_eq!(sniff_format(&csv), Format::Csv);
    }

    #[test]
    fn json_and_csv_import_are_not_supported() {
        let json = encode(&sample(), Format::Json, ExportOptions::default(), None).unwrap();
        assert!(decode(&json, Format::Json, None).unwrap_err().to_string().contains("not supported"));

        let csv = encode(&sample(), Format::Csv, ExportOptions::default(), None).unwrap();
        assert!(decode(&csv, Format::Csv, None).unwrap_err().to_string().contains("not supported"));
    }

    #[test]
    fn binary_round_trips() {
        let records = sample();
        let bytes = encode(&records, Format::Binary, ExportOptions::default(), None).unwrap();
        let decoded = decode(&bytes, Format::Binary, None).unwrap();
        assert_eq!(decoded, records);
    }
}
