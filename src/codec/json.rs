//! JSON export format (spec.md S:4.5): `{"format":"kvidx-json","version":1,
//! "entries":[{"key":N,"term":N,"cmd":N,"data":"<escaped>"}, ...]}`.
//! `term`/`cmd` are omitted per-entry when metadata is suppressed. Import
//! is not implemented; the contract allows JSON import to report
//! [`KvError::NotSupported`].
//!
//! The text is built by hand rather than through `serde_json::to_vec` on a
//! struct: `data` is an opaque byte blob (spec.md S:3) that is not generally
//! valid UTF-8, so it cannot be held in a `String` field and serialized by
//! serde's own escaper. Each entry's `data` goes through
//! [`crate::codec::escape_json_bytes`] instead, which escapes byte-for-byte.

use crate::backend::Record;
use crate::codec::{escape_json_bytes, ExportOptions};
use crate::error::Result;

pub(super) fn encode(
    records: &[Record],
    options: ExportOptions,
    poll: &mut impl FnMut(u64) -> Result<()>,
) -> Result<Vec<u8>> {
    let mut out = String::from("{\"format\":\"kvidx-json\",\"version\":1,\"entries\":[");
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str("{\"key\":");
        out.push_str(&record.id.to_string());
        if options.include_metadata {
            out.push_str(",\"term\":");
            out.push_str(&record.term.to_string());
            out.push_str(",\"cmd\":");
            out.push_str(&record.cmd.to_string());
        }
        out.push_str(",\"data\":\"");
        out.push_str(&escape_json_bytes(&record.data));
        out.push_str("\"}");
        poll((i + 1) as u64)?;
    }
    out.push_str("]}");
    Ok(out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_envelope_with_metadata() {
        let records = vec![Record {
            id: 1,
            term: 2,
            cmd: 3,
            data: b"hi".to_vec(),
        }];
        let bytes = encode(&records, ExportOptions::default(), &mut |_| Ok(())).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"format\":\"kvidx-json\""));
        assert!(text.contains("\"term\":2"));
        assert!(text.contains("\"cmd\":3"));
    }

    #[test]
    fn omits_metadata_when_suppressed() {
        let records = vec![Record {
            id: 1,
            term: 2,
            cmd: 3,
            data: b"hi".to_vec(),
        }];
        let options = ExportOptions {
            include_metadata: false,
        };
        let bytes = encode(&records, options, &mut |_| Ok(())).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("\"term\""));
        assert!(!text.contains("\"cmd\""));
    }

    #[test]
    fn escapes_invalid_utf8_byte_losslessly() {
        let records = vec![Record {
            id: 1,
            term: 0,
            cmd: 0,
            data: vec![0xFF, b'a', 0x01],
        }];
        let options = ExportOptions {
            include_metadata: false,
        };
        let bytes = encode(&records, options, &mut |_| Ok(())).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"data\":\"\u{00ff}a\\u0001\""));
    }
}
