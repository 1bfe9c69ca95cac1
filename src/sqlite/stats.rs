//! Store-wide statistics for [`SqliteBackend`] (spec.md S:4.4, statistics).
//!
//! `get_stats` reads SQLite's own bookkeeping pragmas rather than tracking
//! counters by hand, the same approach the teacher's `sqlite/queries.rs`
//! takes for its analogous `vacuum`/size reporting.

use crate::backend::Stats;
use crate::error::{KvError, Result};
use crate::sqlite::store::SqliteBackend;

impl SqliteBackend {
    pub(crate) fn get_key_count_impl(&mut self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM log", [], |r| r.get(0))
            .map_err(KvError::Store)?;
        Ok(count as u64)
    }

    pub(crate) fn get_data_size_impl(&mut self) -> Result<u64> {
        let total: Option<i64> = self
            .conn
            .query_row("SELECT SUM(LENGTH(data)) FROM log", [], |r| r.get(0))
            .map_err(KvError::Store)?;
        Ok(total.unwrap_or(0) as u64)
    }

    pub(crate) fn get_stats_impl(&mut self) -> Result<Stats> {
        let page_count: i64 = self
            .conn
            .query_row("PRAGMA page_count", [], |r| r.get(0))
            .map_err(KvError::Store)?;
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |r| r.get(0))
            .map_err(KvError::Store)?;
        let freelist_count: i64 = self
            .conn
            .query_row("PRAGMA freelist_count", [], |r| r.get(0))
            .map_err(KvError::Store)?;
        let journal_mode: String = self
            .conn
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .map_err(KvError::Store)?;

        let key_count = self.get_key_count_impl()?;
        let data_size = self.get_data_size_impl()?;
        let min_key = self.min_key_impl()?;
        let max_key = self.max_key_impl()?;

        let wal_size_bytes = if journal_mode.eq_ignore_ascii_case("wal") {
            let wal_pages: i64 = self
                .conn
                .query_row("PRAGMA wal_checkpoint", [], |r| r.get(1))
                .unwrap_or(0);
            Some((wal_pages.max(0) as u64) * page_size as u64)
        } else {
            None
        };

        Ok(Stats {
            key_count,
            min_key,
            max_key,
            total_value_bytes: data_size,
            page_count: page_count as u64,
            page_size: page_size as u64,
            freelist_pages: freelist_count as u64,
            file_size_bytes: (page_count * page_size) as u64,
            wal_size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SqliteBackend {
        SqliteBackend::open_in_memory().unwrap()
    }

    #[test]
    fn key_count_and_data_size_track_inserts() {
        let mut b = backend();
        b.insert_impl(1, 0, 0, b"abc").unwrap();
        b.insert_impl(2, 0, 0, b"de").unwrap();
        assert_eq!(b.get_key_count_impl().unwrap(), 2);
        assert_eq!(b.get_data_size_impl().unwrap(), 5);
        assert_eq!(b.min_key_impl().unwrap(), Some(1));
    }

    #[test]
    fn empty_store_reports_zero() {
        let mut b = backend();
        assert_eq!(b.get_key_count_impl().unwrap(), 0);
        assert_eq!(b.get_data_size_impl().unwrap(), 0);
        assert_eq!(b.min_key_impl().unwrap(), None);
    }

    #[test]
    fn get_stats_reports_page_accounting() {
        let mut b = backend();
        b.insert_impl(1, 0, 0, b"abc").unwrap();
        let stats = b.get_stats_impl().unwrap();
        assert_eq!(stats.key_count, 1);
        assert_eq!(stats.total_value_bytes, 3);
        assert_eq!(stats.max_key, Some(1));
        assert_eq!(stats.min_key, Some(1));
        assert!(stats.page_size > 0);
        assert!(stats.file_size_bytes > 0);
        assert_eq!(stats.wal_size_bytes, None);
    }
}
