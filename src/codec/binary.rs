//! Canonical little-endian binary export format (spec.md S:4.5).
//!
//! Header: `magic (8B, "KVIDX\0\0\0"), version (4B, =1), reserved (4B, 0),
//! entry_count (8B)`. Each entry: `key(8) term(8) cmd(8) dataLen(8) data`.

use crate::backend::Record;
use crate::error::{KvError, Result};

pub const MAGIC: &[u8; 8] = b"KVIDX\0\0\0";
pub const VERSION: u32 = 1;

pub(super) fn encode(
    records: &[Record],
    poll: &mut impl FnMut(u64) -> Result<()>,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(24 + records.len() * 32);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(records.len() as u64).to_le_bytes());

    for (i, record) in records.iter().enumerate() {
        out.extend_from_slice(&record.id.to_le_bytes());
        out.extend_from_slice(&record.term.to_le_bytes());
        out.extend_from_slice(&record.cmd.to_le_bytes());
        out.extend_from_slice(&(record.data.len() as u64).to_le_bytes());
        out.extend_from_slice(&record.data);
        poll((i + 1) as u64)?;
    }
    Ok(out)
}

pub(super) fn decode(
    bytes: &[u8],
    callback: &mut Option<&mut crate::backend::ProgressCallback<'_>>,
) -> Result<Vec<Record>> {
    if bytes.len() < 24 {
        return Err(KvError::InvalidArgument("binary export: truncated header".into()));
    }
    let (magic, rest) = bytes.split_at(8);
    if magic != MAGIC {
        return Err(KvError::InvalidArgument("binary export: bad magic".into()));
    }
    let (version_bytes, rest) = rest.split_at(4);
    let version = u32::from_le_bytes(version_bytes.try_into().unwrap());
    if version != VERSION {
        return Err(KvError::InvalidArgument(format!(
            "binary export: unsupported version {version}"
        )));
    }
    let (_reserved, rest) = rest.split_at(4);
    let (count_bytes, mut rest) = rest.split_at(8);
    let entry_count = u64::from_le_bytes(count_bytes.try_into().unwrap());

    let mut records = Vec::with_capacity(entry_count as usize);
    for i in 0..entry_count {
        if rest.len() < 32 {
            return Err(KvError::InvalidArgument("binary export: truncated entry".into()));
        }
        let id = u64::from_le_bytes(rest[0..8].try_into().unwrap());
        let term = u64::from_le_bytes(rest[8..16].try_into().unwrap());
        let cmd = u64::from_le_bytes(rest[16..24].try_into().unwrap());
        let data_len = u64::from_le_bytes(rest[24..32].try_into().unwrap()) as usize;
        rest = &rest[32..];
        if rest.len() < data_len {
            return Err(KvError::InvalidArgument("binary export: truncated data".into()));
        }
        let (data, remainder) = rest.split_at(data_len);
        rest = remainder;

        records.push(Record {
            id,
            term,
            cmd,
            data: data.to_vec(),
        });

        let done = i + 1;
        if done % 100 == 0 || done == entry_count {
            if let Some(cb) = callback.as_deref_mut() {
                if !cb(done, entry_count) {
                    return Err(KvError::Cancelled);
                }
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let err = decode(b"not-a-kvidx-file-------", &mut None).unwrap_err();
        assert!(matches!(err, KvError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut header = MAGIC.to_vec();
        header.extend_from_slice(&2u32.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(&0u64.to_le_bytes());
        let err = decode(&header, &mut None).unwrap_err();
        assert!(matches!(err, KvError::InvalidArgument(_)));
    }

    #[test]
    fn round_trips_empty_data() {
        let records = vec![Record {
            id: 7,
            term: 0,
            cmd: 0,
            data: Vec::new(),
        }];
        let bytes = encode(&records, &mut |_| Ok(())).unwrap();
        let decoded = decode(&bytes, &mut None).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn cancellation_stops_decode() {
        let records = (0..250)
            .map(|i| Record {
                id: i,
                term: 0,
                cmd: 0,
                data: vec![1, 2, 3],
            })
            .collect::<Vec<_>>();
        let bytes = encode(&records, &mut |_| Ok(())).unwrap();
        let mut calls = 0u64;
        let mut cb = |_done: u64, _total: u64| {
            calls += 1;
            false
        };
        let mut callback: Option<&mut crate::backend::ProgressCallback<'_>> = Some(&mut cb);
        let err = decode(&bytes, &mut callback).unwrap_err();
        assert!(matches!(err, KvError::Cancelled));
        assert_eq!(calls, 1);
    }
}
