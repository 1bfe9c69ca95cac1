//! Lazy expiration side table for [`SqliteBackend`] (spec.md S:4.4, TTL).
//!
//! The `_kvidx_ttl` table is created once as part of the bootstrap migration
//! (`schema_def::ttl_table`), not guarded by a runtime "does it exist yet"
//! flag -- the original's process-static boolean for this is exactly the
//! kind of global mutable state this crate avoids; `CREATE TABLE IF NOT
//! EXISTS` at open time already makes the presence check free.

use rusqlite::{params, OptionalExtension};

use crate::error::{KvError, Result, TtlStatus};
use crate::sqlite::records::key_to_sql;
use crate::sqlite::store::SqliteBackend;

impl SqliteBackend {
    pub(crate) fn set_expire_impl(&mut self, key: u64, ttl_ms: i64, now_ms: i64) -> Result<()> {
        self.set_expire_at_impl(key, now_ms + ttl_ms, now_ms)
    }

    pub(crate) fn set_expire_at_impl(&mut self, key: u64, expires_at_ms: i64, _now_ms: i64) -> Result<()> {
        self.guard(|conn| {
            if !conn
                .prepare_cached("SELECT 1 FROM log WHERE id = ?1")?
                .exists(params![key_to_sql(key)])
                .map_err(KvError::Store)?
            {
                return Err(KvError::NotFound(key));
            }
            conn.prepare_cached(
                "INSERT INTO _kvidx_ttl (id, expires_at) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET expires_at = excluded.expires_at",
            )?
            .execute(params![key_to_sql(key), expires_at_ms])
            .map_err(KvError::Store)?;
            Ok(())
        })
    }

    pub(crate) fn get_ttl_impl(&mut self, key: u64, now_ms: i64) -> Result<TtlStatus> {
        let has_log = self
            .conn
            .prepare_cached("SELECT 1 FROM log WHERE id = ?1")?
            .exists(params![key_to_sql(key)])
            .map_err(KvError::Store)?;
        if !has_log {
            return Ok(TtlStatus::NotFound);
        }

        let expires_at: Option<i64> = self
            .conn
            .prepare_cached("SELECT expires_at FROM _kvidx_ttl WHERE id = ?1")?
            .query_row(params![key_to_sql(key)], |r| r.get(0))
            .optional()
            .map_err(KvError::Store)?;

        Ok(match expires_at {
            None => TtlStatus::None,
            Some(expires_at) => TtlStatus::RemainingMs((expires_at - now_ms).max(0)),
        })
    }

    pub(crate) fn persist_impl(&mut self, key: u64) -> Result<()> {
        self.guard(|conn| {
            if !conn
                .prepare_cached("SELECT 1 FROM log WHERE id = ?1")?
                .exists(params![key_to_sql(key)])
                .map_err(KvError::Store)?
            {
                return Err(KvError::NotFound(key));
            }
            conn.prepare_cached("DELETE FROM _kvidx_ttl WHERE id = ?1")?
                .execute(params![key_to_sql(key)])
                .map_err(KvError::Store)?;
            Ok(())
        })
    }

    /// Removes up to `max_keys` expired entries (`0` means unbounded),
    /// deleting the LOG row and the TTL row for each expired key as one
    /// pair before moving to the next -- the per-key atomicity spec.md S:5
    /// requires, without an implicit outer transaction wrapping the whole
    /// sweep. `callback`, if given, is polled every 100 keys and a `false`
    /// return cancels the scan with [`KvError::Cancelled`].
    pub(crate) fn expire_scan_impl(
        &mut self,
        max_keys: u64,
        now_ms: i64,
        mut callback: Option<&mut crate::backend::ProgressCallback<'_>>,
    ) -> Result<u64> {
        let limit_clause = if max_keys == 0 {
            String::new()
        } else {
            format!(" LIMIT {max_keys}")
        };
        let sql = format!(
            "SELECT id FROM _kvidx_ttl WHERE expires_at <= ?1 ORDER BY expires_at ASC{limit_clause}"
        );
        let expired: Vec<i64> = self.guard(|conn| {
            let ids = conn
                .prepare_cached(&sql)?
                .query_map(params![now_ms], |r| r.get(0))
                .map_err(KvError::Store)?
                .collect::<std::result::Result<Vec<i64>, _>>()
                .map_err(KvError::Store)?;
            Ok(ids)
        })?;

        let total = expired.len() as u64;
        let mut expired_count = 0u64;
        for raw_id in expired {
            self.guard(|conn| {
                conn.prepare_cached("DELETE FROM log WHERE id = ?1")?
                    .execute(params![raw_id])
                    .map_err(KvError::Store)?;
                conn.prepare_cached("DELETE FROM _kvidx_ttl WHERE id = ?1")?
                    .execute(params![raw_id])
                    .map_err(KvError::Store)?;
                Ok(())
            })?;
            expired_count += 1;

            if expired_count % 100 == 0 {
                if let Some(cb) = callback.as_deref_mut() {
                    if !cb(expired_count, total) {
                        return Err(KvError::Cancelled);
                    }
                }
            }
        }
        Ok(expired_count)
    }
}
