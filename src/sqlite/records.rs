//! Point reads, ordered navigation, and writes for [`SqliteBackend`].
//!
//! Grounded in the teacher's per-concern modules (`sqlite/issues.rs`,
//! `sqlite/queries.rs`): one `_impl` method per operation, row-scanning
//! helpers shared across them, SQL built with `rusqlite::params!`.

use rusqlite::{params, OptionalExtension};

use crate::backend::{InsertCondition, Record};
use crate::error::{KvError, Result};
use crate::sqlite::store::SqliteBackend;

/// A zero-copy view into the last record read by `get_ref`/`get_prev_ref`/
/// `get_next_ref`. Borrows `SqliteBackend`'s scratch buffer: the borrow
/// checker ties this to the `&mut self` call that produced it, so any
/// subsequent call on the instance (which requires a fresh `&mut self`)
/// cannot compile while a `ValueRef` from an earlier call is still alive --
/// this is the "invalidated by the next call" contract from spec.md S:5,
/// enforced statically instead of at runtime.
#[derive(Debug)]
pub struct ValueRef<'a> {
    pub term: u64,
    pub cmd: u64,
    pub data: &'a [u8],
}

/// Converts a user-facing u64 key to the signed 64-bit representation
/// stored in the `id` column. This is a bit-for-bit reinterpretation, not
/// an arithmetic cast: `u64::MAX as i64 == -1`, which is exactly the
/// documented signed/unsigned quirk callers must special-case around
/// (spec.md S:4.4).
pub(crate) fn key_to_sql(key: u64) -> i64 {
    key as i64
}

pub(crate) fn key_from_sql(raw: i64) -> u64 {
    raw as u64
}

impl SqliteBackend {
    fn fetch_into_scratch(&mut self, sql: &str, key: u64) -> Result<Option<(u64, u64)>> {
        let row: Option<(i64, i64, Vec<u8>)> = self
            .conn
            .prepare_cached(sql)?
            .query_row(params![key_to_sql(key)], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .optional()
            .map_err(KvError::Store)?;
        match row {
            Some((term, cmd, data)) => {
                self.scratch = data;
                Ok(Some((key_from_sql(term), key_from_sql(cmd))))
            }
            None => {
                self.scratch.clear();
                Ok(None)
            }
        }
    }

    /// Zero-copy point read. See [`ValueRef`] for lifetime semantics.
    pub fn get_ref(&mut self, key: u64) -> Result<Option<ValueRef<'_>>> {
        match self.fetch_into_scratch("SELECT term, cmd, data FROM log WHERE id = ?1", key)? {
            Some((term, cmd)) => Ok(Some(ValueRef {
                term,
                cmd,
                data: &self.scratch,
            })),
            None => Ok(None),
        }
    }

    pub(crate) fn get_impl(&mut self, key: u64) -> Result<Option<Record>> {
        Ok(self.get_ref(key)?.map(|v| Record {
            id: key,
            term: v.term,
            cmd: v.cmd,
            data: v.data.to_vec(),
        }))
    }

    pub(crate) fn exists_impl(&mut self, key: u64) -> Result<bool> {
        self.conn
            .prepare_cached("SELECT 1 FROM log WHERE id = ?1")?
            .exists(params![key_to_sql(key)])
            .map_err(KvError::Store)
    }

    pub(crate) fn exists_dual_impl(&mut self, key: u64, expected_term: u64) -> Result<bool> {
        self.conn
            .prepare_cached("SELECT 1 FROM log WHERE id = ?1 AND term = ?2")?
            .exists(params![key_to_sql(key), key_to_sql(expected_term)])
            .map_err(KvError::Store)
    }

    /// Zero-copy `getPrev`. `next_key == u64::MAX` is special-cased to mean
    /// "fetch the record at `max(id)`" (spec.md S:4.4).
    pub fn get_prev_ref(&mut self, next_key: u64) -> Result<Option<(u64, ValueRef<'_>)>> {
        let row: Option<(i64, i64, i64, Vec<u8>)> = if next_key == u64::MAX {
            self.conn
                .prepare_cached("SELECT id, term, cmd, data FROM log ORDER BY id DESC LIMIT 1")?
                .query_row([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))
                .optional()
                .map_err(KvError::Store)?
        } else {
            self.conn
                .prepare_cached(
                    "SELECT id, term, cmd, data FROM log WHERE id < ?1 ORDER BY id DESC LIMIT 1",
                )?
                .query_row(params![key_to_sql(next_key)], |r| {
                    Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
                })
                .optional()
                .map_err(KvError::Store)?
        };
        match row {
            Some((id, term, cmd, data)) => {
                self.scratch = data;
                Ok(Some((
                    key_from_sql(id),
                    ValueRef {
                        term: key_from_sql(term),
                        cmd: key_from_sql(cmd),
                        data: &self.scratch,
                    },
                )))
            }
            None => {
                self.scratch.clear();
                Ok(None)
            }
        }
    }

    /// Zero-copy `getNext`. `previous_key == u64::MAX` is always empty
    /// (there is no representable key greater than the maximum).
    pub fn get_next_ref(&mut self, previous_key: u64) -> Result<Option<(u64, ValueRef<'_>)>> {
        if previous_key == u64::MAX {
            self.scratch.clear();
            return Ok(None);
        }
        let row: Option<(i64, i64, i64, Vec<u8>)> = self
            .conn
            .prepare_cached(
                "SELECT id, term, cmd, data FROM log WHERE id > ?1 ORDER BY id ASC LIMIT 1",
            )?
            .query_row(params![key_to_sql(previous_key)], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })
            .optional()
            .map_err(KvError::Store)?;
        match row {
            Some((id, term, cmd, data)) => {
                self.scratch = data;
                Ok(Some((
                    key_from_sql(id),
                    ValueRef {
                        term: key_from_sql(term),
                        cmd: key_from_sql(cmd),
                        data: &self.scratch,
                    },
                )))
            }
            None => {
                self.scratch.clear();
                Ok(None)
            }
        }
    }

    pub(crate) fn get_prev_impl(&mut self, next_key: u64) -> Result<Option<Record>> {
        Ok(self
            .get_prev_ref(next_key)?
            .map(|(id, v)| Record {
                id,
                term: v.term,
                cmd: v.cmd,
                data: v.data.to_vec(),
            }))
    }

    pub(crate) fn get_next_impl(&mut self, previous_key: u64) -> Result<Option<Record>> {
        Ok(self
            .get_next_ref(previous_key)?
            .map(|(id, v)| Record {
                id,
                term: v.term,
                cmd: v.cmd,
                data: v.data.to_vec(),
            }))
    }

    pub(crate) fn max_key_impl(&mut self) -> Result<Option<u64>> {
        let raw: Option<i64> = self
            .conn
            .query_row("SELECT MAX(id) FROM log", [], |r| r.get(0))
            .map_err(KvError::Store)?;
        Ok(raw.map(key_from_sql))
    }

    pub(crate) fn min_key_impl(&mut self) -> Result<Option<u64>> {
        let raw: Option<i64> = self
            .conn
            .query_row("SELECT MIN(id) FROM log", [], |r| r.get(0))
            .map_err(KvError::Store)?;
        Ok(raw.map(key_from_sql))
    }

    pub(crate) fn insert_impl(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<()> {
        self.guard(|conn| {
            conn.prepare_cached(
                "INSERT INTO log (id, created, term, cmd, data) VALUES (?1, 0, ?2, ?3, ?4)",
            )?
            .execute(params![
                key_to_sql(key),
                key_to_sql(term),
                key_to_sql(cmd),
                data
            ])
            .map_err(KvError::Store)?;
            Ok(())
        })
    }

    pub(crate) fn insert_ex_impl(
        &mut self,
        key: u64,
        term: u64,
        cmd: u64,
        data: &[u8],
        condition: InsertCondition,
    ) -> Result<()> {
        match condition {
            InsertCondition::Always => self.guard(|conn| {
                conn.prepare_cached(
                    "INSERT INTO log (id, created, term, cmd, data) VALUES (?1, 0, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET term = excluded.term, cmd = excluded.cmd, data = excluded.data",
                )?
                .execute(params![key_to_sql(key), key_to_sql(term), key_to_sql(cmd), data])
                .map_err(KvError::Store)?;
                Ok(())
            }),
            InsertCondition::IfNotExists => {
                if self.exists_impl(key)? {
                    return Err(KvError::ConditionFailed(key));
                }
                let result = self.guard(|conn| {
                    conn.prepare_cached(
                        "INSERT INTO log (id, created, term, cmd, data) VALUES (?1, 0, ?2, ?3, ?4)",
                    )?
                    .execute(params![key_to_sql(key), key_to_sql(term), key_to_sql(cmd), data])
                    .map_err(KvError::Store)?;
                    Ok(())
                });
                match result {
                    Err(KvError::Store(rusqlite::Error::SqliteFailure(e, _)))
                        if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        Err(KvError::ConditionFailed(key))
                    }
                    other => other,
                }
            }
            InsertCondition::IfExists => self.guard(|conn| {
                let affected = conn
                    .prepare_cached(
                        "UPDATE log SET term = ?2, cmd = ?3, data = ?4 WHERE id = ?1",
                    )?
                    .execute(params![key_to_sql(key), key_to_sql(term), key_to_sql(cmd), data])
                    .map_err(KvError::Store)?;
                if affected == 0 {
                    Err(KvError::ConditionFailed(key))
                } else {
                    Ok(())
                }
            }),
        }
    }

    pub(crate) fn remove_impl(&mut self, key: u64) -> Result<()> {
        self.guard(|conn| {
            conn.prepare_cached("DELETE FROM log WHERE id = ?1")?
                .execute(params![key_to_sql(key)])
                .map_err(KvError::Store)?;
            Ok(())
        })
    }

    pub(crate) fn remove_after_n_impl(&mut self, key: u64) -> Result<u64> {
        self.guard(|conn| {
            let affected = conn
                .prepare_cached("DELETE FROM log WHERE id >= ?1")?
                .execute(params![key_to_sql(key)])
                .map_err(KvError::Store)?;
            Ok(affected as u64)
        })
    }

    pub(crate) fn remove_before_n_impl(&mut self, key: u64) -> Result<u64> {
        self.guard(|conn| {
            let affected = conn
                .prepare_cached("DELETE FROM log WHERE id <= ?1")?
                .execute(params![key_to_sql(key)])
                .map_err(KvError::Store)?;
            Ok(affected as u64)
        })
    }

    pub(crate) fn remove_range_impl(
        &mut self,
        start: u64,
        end: u64,
        start_incl: bool,
        end_incl: bool,
    ) -> Result<u64> {
        self.guard(|conn| {
            let lower_op = if start_incl { ">=" } else { ">" };
            let mut clauses = vec![format!("id {lower_op} ?1")];
            let mut args: Vec<i64> = vec![key_to_sql(start)];
            if end != u64::MAX {
                let upper_op = if end_incl { "<=" } else { "<" };
                clauses.push(format!("id {upper_op} ?2"));
                args.push(key_to_sql(end));
            }
            let sql = format!("DELETE FROM log WHERE {}", clauses.join(" AND "));
            let affected = conn
                .execute(&sql, rusqlite::params_from_iter(args.iter()))
                .map_err(KvError::Store)?;
            Ok(affected as u64)
        })
    }

    pub(crate) fn count_range_impl(&mut self, start: u64, end: u64) -> Result<u64> {
        let sql = if end == u64::MAX {
            "SELECT COUNT(*) FROM log WHERE id >= ?1".to_string()
        } else {
            "SELECT COUNT(*) FROM log WHERE id >= ?1 AND id <= ?2".to_string()
        };
        let count: i64 = if end == u64::MAX {
            self.conn
                .query_row(&sql, params![key_to_sql(start)], |r| r.get(0))
        } else {
            self.conn
                .query_row(&sql, params![key_to_sql(start), key_to_sql(end)], |r| r.get(0))
        }
        .map_err(KvError::Store)?;
        Ok(count as u64)
    }

    pub(crate) fn exists_in_range_impl(&mut self, start: u64, end: u64) -> Result<bool> {
        Ok(self.count_range_impl(start, end)? > 0)
    }

    /// Materialises every record in `[start, end]` (`end == u64::MAX` is
    /// unbounded) ordered by ascending key. Used by the export codec, which
    /// streams its progress callback over this in-memory snapshot rather
    /// than over a live cursor -- the adapter has no API for a partial scan
    /// that survives across multiple public calls (see `ValueRef`'s note on
    /// why borrows are single-call only).
    pub(crate) fn range_records_impl(&mut self, start: u64, end: u64) -> Result<Vec<Record>> {
        let sql = if end == u64::MAX {
            "SELECT id, term, cmd, data FROM log WHERE id >= ?1 ORDER BY id ASC"
        } else {
            "SELECT id, term, cmd, data FROM log WHERE id >= ?1 AND id <= ?2 ORDER BY id ASC"
        };
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = |r: &rusqlite::Row| -> rusqlite::Result<Record> {
            let id: i64 = r.get(0)?;
            let term: i64 = r.get(1)?;
            let cmd: i64 = r.get(2)?;
            let data: Vec<u8> = r.get(3)?;
            Ok(Record {
                id: key_from_sql(id),
                term: key_from_sql(term),
                cmd: key_from_sql(cmd),
                data,
            })
        };
        let records = if end == u64::MAX {
            stmt.query_map(params![key_to_sql(start)], rows)
        } else {
            stmt.query_map(params![key_to_sql(start), key_to_sql(end)], rows)
        }
        .map_err(KvError::Store)?
        .collect::<std::result::Result<Vec<Record>, _>>()
        .map_err(KvError::Store)?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SqliteBackend {
        SqliteBackend::open_in_memory().unwrap()
    }

    #[test]
    fn insert_get_exists_remove_roundtrip() {
        let mut b = backend();
        let data = vec![3u8; 65536];
        b.insert_impl(331, 701, 88, &data).unwrap();
        assert!(b.exists_impl(331).unwrap());
        assert!(b.exists_dual_impl(331, 701).unwrap());
        assert_eq!(b.max_key_impl().unwrap(), Some(331));
        let rec = b.get_impl(331).unwrap().unwrap();
        assert_eq!(rec.term, 701);
        assert_eq!(rec.cmd, 88);
        assert_eq!(rec.data, data);
        b.remove_impl(331).unwrap();
        assert!(!b.exists_impl(331).unwrap());
    }

    #[test]
    fn remove_after_n_keeps_lower_keys() {
        let mut b = backend();
        for k in [332u64, 333, 334] {
            b.insert_impl(k, 701, 88, b"d").unwrap();
        }
        assert_eq!(b.max_key_impl().unwrap(), Some(334));
        b.remove_after_n_impl(333).unwrap();
        assert!(b.exists_impl(332).unwrap());
        assert!(!b.exists_impl(333).unwrap());
        assert!(!b.exists_impl(334).unwrap());
        assert_eq!(b.max_key_impl().unwrap(), Some(332));
    }

    #[test]
    fn navigation_prev_next() {
        let mut b = backend();
        b.insert_impl(332, 702, 88, b"d").unwrap();
        let prev = b.get_prev_impl(333).unwrap().unwrap();
        assert_eq!((prev.id, prev.term, prev.cmd), (332, 702, 88));
        let next = b.get_next_impl(331).unwrap().unwrap();
        assert_eq!((next.id, next.term, next.cmd), (332, 702, 88));
    }

    #[test]
    fn navigation_on_u64_boundary() {
        let mut b = backend();
        b.insert_impl(10, 0, 0, b"d").unwrap();
        let prev = b.get_prev_impl(u64::MAX).unwrap().unwrap();
        assert_eq!(prev.id, 10);
        assert!(b.get_next_impl(u64::MAX).unwrap().is_none());
    }

    #[test]
    fn insert_duplicate_fails() {
        let mut b = backend();
        b.insert_impl(1, 0, 0, b"a").unwrap();
        assert!(b.insert_impl(1, 0, 0, b"b").is_err());
    }

    #[test]
    fn insert_ex_if_not_exists_condition_failed_on_present() {
        let mut b = backend();
        b.insert_impl(1, 0, 0, b"a").unwrap();
        let err = b
            .insert_ex_impl(1, 0, 0, b"b", InsertCondition::IfNotExists)
            .unwrap_err();
        assert!(matches!(err, KvError::ConditionFailed(1)));
    }

    #[test]
    fn insert_ex_if_exists_condition_failed_on_absent() {
        let mut b = backend();
        let err = b
            .insert_ex_impl(1, 0, 0, b"b", InsertCondition::IfExists)
            .unwrap_err();
        assert!(matches!(err, KvError::ConditionFailed(1)));
    }

    #[test]
    fn insert_ex_always_upserts() {
        let mut b = backend();
        b.insert_impl(1, 0, 0, b"a").unwrap();
        b.insert_ex_impl(1, 9, 9, b"b", InsertCondition::Always)
            .unwrap();
        let rec = b.get_impl(1).unwrap().unwrap();
        assert_eq!(rec.term, 9);
        assert_eq!(rec.data, b"b");
    }

    #[test]
    fn remove_range_treats_end_max_as_unbounded() {
        let mut b = backend();
        for k in [1u64, 2, 3] {
            b.insert_impl(k, 0, 0, b"d").unwrap();
        }
        let deleted = b
            .remove_range_impl(2, u64::MAX, true, true)
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(b.exists_impl(1).unwrap());
    }

    #[test]
    fn count_range_matches_inclusive_bounds() {
        let mut b = backend();
        for k in [1u64, 2, 3, 4] {
            b.insert_impl(k, 0, 0, b"d").unwrap();
        }
        assert_eq!(b.count_range_impl(2, 3).unwrap(), 2);
        b.remove_range_impl(2, 3, true, true).unwrap();
        assert_eq!(b.count_range_impl(2, 3).unwrap(), 0);
    }
}
