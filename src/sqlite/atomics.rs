//! Atomic read-modify-write primitives for [`SqliteBackend`].
//!
//! Each of these composes multiple statements inside whatever transaction
//! is current (explicit, if the caller wrapped one via `begin`, or the
//! store's implicit per-statement transaction otherwise) -- spec.md S:4.4
//! documents that the adapter provides no implicit wrapping of its own.

use rusqlite::{params, OptionalExtension};

use crate::backend::Record;
use crate::error::{KvError, Result};
use crate::sqlite::records::{key_from_sql, key_to_sql};
use crate::sqlite::store::SqliteBackend;

impl SqliteBackend {
    pub(crate) fn get_and_set_impl(
        &mut self,
        key: u64,
        term: u64,
        cmd: u64,
        data: &[u8],
    ) -> Result<Option<Record>> {
        self.guard(|conn| {
            let previous: Option<(i64, i64, Vec<u8>)> = conn
                .prepare_cached("SELECT term, cmd, data FROM log WHERE id = ?1")?
                .query_row(params![key_to_sql(key)], |r| {
                    Ok((r.get(0)?, r.get(1)?, r.get(2)?))
                })
                .optional()
                .map_err(KvError::Store)?;

            conn.prepare_cached(
                "INSERT INTO log (id, created, term, cmd, data) VALUES (?1, 0, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET term = excluded.term, cmd = excluded.cmd, data = excluded.data",
            )?
            .execute(params![key_to_sql(key), key_to_sql(term), key_to_sql(cmd), data])
            .map_err(KvError::Store)?;

            Ok(previous.map(|(t, c, d)| Record {
                id: key,
                term: key_from_sql(t),
                cmd: key_from_sql(c),
                data: d,
            }))
        })
    }

    pub(crate) fn get_and_remove_impl(&mut self, key: u64) -> Result<Record> {
        self.guard(|conn| {
            let previous: Option<(i64, i64, Vec<u8>)> = conn
                .prepare_cached("SELECT term, cmd, data FROM log WHERE id = ?1")?
                .query_row(params![key_to_sql(key)], |r| {
                    Ok((r.get(0)?, r.get(1)?, r.get(2)?))
                })
                .optional()
                .map_err(KvError::Store)?;
            let (term, cmd, data) = previous.ok_or(KvError::NotFound(key))?;

            conn.prepare_cached("DELETE FROM log WHERE id = ?1")?
                .execute(params![key_to_sql(key)])
                .map_err(KvError::Store)?;

            Ok(Record {
                id: key,
                term: key_from_sql(term),
                cmd: key_from_sql(cmd),
                data,
            })
        })
    }

    pub(crate) fn compare_and_swap_impl(
        &mut self,
        key: u64,
        expected: &[u8],
        new: &[u8],
    ) -> Result<bool> {
        self.guard(|conn| {
            let current: Option<Vec<u8>> = conn
                .prepare_cached("SELECT data FROM log WHERE id = ?1")?
                .query_row(params![key_to_sql(key)], |r| r.get(0))
                .optional()
                .map_err(KvError::Store)?;
            let current = current.ok_or(KvError::NotFound(key))?;

            let matches = if expected.is_empty() {
                current.is_empty()
            } else {
                current == expected
            };
            if !matches {
                return Ok(false);
            }

            conn.prepare_cached("UPDATE log SET data = ?2 WHERE id = ?1")?
                .execute(params![key_to_sql(key), new])
                .map_err(KvError::Store)?;
            Ok(true)
        })
    }

    pub(crate) fn compare_term_and_swap_impl(
        &mut self,
        key: u64,
        expected_term: u64,
        new_term: u64,
        new_cmd: u64,
        new: &[u8],
    ) -> Result<bool> {
        self.guard(|conn| {
            let current_term: Option<i64> = conn
                .prepare_cached("SELECT term FROM log WHERE id = ?1")?
                .query_row(params![key_to_sql(key)], |r| r.get(0))
                .optional()
                .map_err(KvError::Store)?;
            let current_term = current_term.ok_or(KvError::NotFound(key))?;

            if key_from_sql(current_term) != expected_term {
                return Ok(false);
            }

            conn.prepare_cached("UPDATE log SET term = ?2, cmd = ?3, data = ?4 WHERE id = ?1")?
                .execute(params![
                    key_to_sql(key),
                    key_to_sql(new_term),
                    key_to_sql(new_cmd),
                    new
                ])
                .map_err(KvError::Store)?;
            Ok(true)
        })
    }
}
