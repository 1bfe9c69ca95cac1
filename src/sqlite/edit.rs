//! Partial-value content edits for [`SqliteBackend`]: append, prepend, and
//! byte-range read/write. Term and cmd are preserved across all of these.

use rusqlite::{params, OptionalExtension};

use crate::error::{KvError, Result};
use crate::sqlite::records::key_to_sql;
use crate::sqlite::store::SqliteBackend;

impl SqliteBackend {
    pub(crate) fn append_impl(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<u64> {
        self.guard(|conn| {
            let current: Option<Vec<u8>> = conn
                .prepare_cached("SELECT data FROM log WHERE id = ?1")?
                .query_row(params![key_to_sql(key)], |r| r.get(0))
                .optional()
                .map_err(KvError::Store)?;

            match current {
                None => {
                    conn.prepare_cached(
                        "INSERT INTO log (id, created, term, cmd, data) VALUES (?1, 0, ?2, ?3, ?4)",
                    )?
                    .execute(params![key_to_sql(key), key_to_sql(term), key_to_sql(cmd), data])
                    .map_err(KvError::Store)?;
                    Ok(data.len() as u64)
                }
                Some(mut current) => {
                    current.extend_from_slice(data);
                    let new_len = current.len() as u64;
                    conn.prepare_cached("UPDATE log SET data = ?2 WHERE id = ?1")?
                        .execute(params![key_to_sql(key), current])
                        .map_err(KvError::Store)?;
                    Ok(new_len)
                }
            }
        })
    }

    pub(crate) fn prepend_impl(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<u64> {
        self.guard(|conn| {
            let current: Option<Vec<u8>> = conn
                .prepare_cached("SELECT data FROM log WHERE id = ?1")?
                .query_row(params![key_to_sql(key)], |r| r.get(0))
                .optional()
                .map_err(KvError::Store)?;

            match current {
                None => {
                    conn.prepare_cached(
                        "INSERT INTO log (id, created, term, cmd, data) VALUES (?1, 0, ?2, ?3, ?4)",
                    )?
                    .execute(params![key_to_sql(key), key_to_sql(term), key_to_sql(cmd), data])
                    .map_err(KvError::Store)?;
                    Ok(data.len() as u64)
                }
                Some(current) => {
                    let mut combined = data.to_vec();
                    combined.extend_from_slice(&current);
                    let new_len = combined.len() as u64;
                    conn.prepare_cached("UPDATE log SET data = ?2 WHERE id = ?1")?
                        .execute(params![key_to_sql(key), combined])
                        .map_err(KvError::Store)?;
                    Ok(new_len)
                }
            }
        })
    }

    pub(crate) fn get_value_range_impl(
        &mut self,
        key: u64,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>> {
        let current: Option<Vec<u8>> = self
            .conn
            .prepare_cached("SELECT data FROM log WHERE id = ?1")?
            .query_row(params![key_to_sql(key)], |r| r.get(0))
            .optional()
            .map_err(KvError::Store)?;
        let current = current.ok_or(KvError::NotFound(key))?;

        let offset = offset as usize;
        if offset >= current.len() {
            return Ok(Vec::new());
        }
        let available = current.len() - offset;
        let take = if length == 0 {
            available
        } else {
            (length as usize).min(available)
        };
        Ok(current[offset..offset + take].to_vec())
    }

    pub(crate) fn set_value_range_impl(
        &mut self,
        key: u64,
        offset: u64,
        data: &[u8],
    ) -> Result<u64> {
        self.guard(|conn| {
            let current: Option<Vec<u8>> = conn
                .prepare_cached("SELECT data FROM log WHERE id = ?1")?
                .query_row(params![key_to_sql(key)], |r| r.get(0))
                .optional()
                .map_err(KvError::Store)?;
            let current = current.ok_or(KvError::NotFound(key))?;

            let offset = offset as usize;
            let new_len = current.len().max(offset + data.len());
            let mut buf = vec![0u8; new_len];
            buf[..current.len()].copy_from_slice(&current);
            buf[offset..offset + data.len()].copy_from_slice(data);

            conn.prepare_cached("UPDATE log SET data = ?2 WHERE id = ?1")?
                .execute(params![key_to_sql(key), buf])
                .map_err(KvError::Store)?;
            Ok(new_len as u64)
        })
    }
}
