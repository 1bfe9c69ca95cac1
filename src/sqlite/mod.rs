//! The relational adapter: [`SqliteBackend`] and its `Backend` realisation.

mod atomics;
mod edit;
mod records;
mod schema_def;
mod stats;
mod store;
mod ttl;
mod txn;

pub use records::ValueRef;
pub use store::SqliteBackend;

use chrono::Utc;

use crate::backend::{Backend, InsertCondition, ProgressCallback, Record, Stats};
use crate::config::Config;
use crate::error::{Result, TtlStatus};
use crate::migration::Migration;

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl Backend for SqliteBackend {
    fn close(&mut self) -> Result<()> {
        SqliteBackend::close(self)
    }

    // rusqlite commits any pending WAL frames to the main file on the
    // connection's own schedule; an explicit checkpoint is the adapter's
    // equivalent of the contract's `fsync`.
    fn fsync(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA wal_checkpoint(FULL)")
            .map_err(crate::error::KvError::Store)
    }

    fn update_config(&mut self, config: Config) -> Result<()> {
        SqliteBackend::update_config(self, config)
    }

    fn migrate(&mut self, migrations: &[Migration], target: u32) -> Result<()> {
        SqliteBackend::migrate(self, migrations, target)
    }

    fn begin(&mut self) -> Result<()> {
        self.begin_impl()
    }

    fn commit(&mut self) -> Result<()> {
        self.commit_impl()
    }

    fn abort(&mut self) -> Result<()> {
        self.abort_impl()
    }

    fn get(&mut self, key: u64) -> Result<Option<Record>> {
        self.get_impl(key)
    }

    fn exists(&mut self, key: u64) -> Result<bool> {
        self.exists_impl(key)
    }

    fn exists_dual(&mut self, key: u64, expected_term: u64) -> Result<bool> {
        self.exists_dual_impl(key, expected_term)
    }

    fn get_prev(&mut self, next_key: u64) -> Result<Option<Record>> {
        self.get_prev_impl(next_key)
    }

    fn get_next(&mut self, previous_key: u64) -> Result<Option<Record>> {
        self.get_next_impl(previous_key)
    }

    fn max_key(&mut self) -> Result<Option<u64>> {
        self.max_key_impl()
    }

    fn min_key(&mut self) -> Result<Option<u64>> {
        self.min_key_impl()
    }

    fn insert(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<()> {
        self.insert_impl(key, term, cmd, data)
    }

    fn insert_ex(
        &mut self,
        key: u64,
        term: u64,
        cmd: u64,
        data: &[u8],
        condition: InsertCondition,
    ) -> Result<()> {
        self.insert_ex_impl(key, term, cmd, data, condition)
    }

    fn remove(&mut self, key: u64) -> Result<()> {
        self.remove_impl(key)
    }

    fn remove_after_n(&mut self, key: u64) -> Result<u64> {
        self.remove_after_n_impl(key)
    }

    fn remove_before_n(&mut self, key: u64) -> Result<u64> {
        self.remove_before_n_impl(key)
    }

    fn remove_range(
        &mut self,
        start: u64,
        end: u64,
        start_incl: bool,
        end_incl: bool,
    ) -> Result<u64> {
        self.remove_range_impl(start, end, start_incl, end_incl)
    }

    fn get_and_set(
        &mut self,
        key: u64,
        term: u64,
        cmd: u64,
        data: &[u8],
    ) -> Result<Option<Record>> {
        self.get_and_set_impl(key, term, cmd, data)
    }

    fn get_and_remove(&mut self, key: u64) -> Result<Record> {
        self.get_and_remove_impl(key)
    }

    fn compare_and_swap(&mut self, key: u64, expected: &[u8], new: &[u8]) -> Result<bool> {
        self.compare_and_swap_impl(key, expected, new)
    }

    fn compare_term_and_swap(
        &mut self,
        key: u64,
        expected_term: u64,
        new_term: u64,
        new_cmd: u64,
        new: &[u8],
    ) -> Result<bool> {
        self.compare_term_and_swap_impl(key, expected_term, new_term, new_cmd, new)
    }

    fn append(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<u64> {
        self.append_impl(key, term, cmd, data)
    }

    fn prepend(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<u64> {
        self.prepend_impl(key, term, cmd, data)
    }

    fn get_value_range(&mut self, key: u64, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.get_value_range_impl(key, offset, length)
    }

    fn set_value_range(&mut self, key: u64, offset: u64, data: &[u8]) -> Result<u64> {
        self.set_value_range_impl(key, offset, data)
    }

    fn set_expire(&mut self, key: u64, ttl_ms: i64) -> Result<()> {
        self.set_expire_impl(key, ttl_ms, now_ms())
    }

    fn set_expire_at(&mut self, key: u64, epoch_ms: i64) -> Result<()> {
        self.set_expire_at_impl(key, epoch_ms, now_ms())
    }

    fn get_ttl(&mut self, key: u64) -> Result<TtlStatus> {
        self.get_ttl_impl(key, now_ms())
    }

    fn persist(&mut self, key: u64) -> Result<()> {
        self.persist_impl(key)
    }

    fn expire_scan(
        &mut self,
        max_keys: u64,
        callback: Option<&mut ProgressCallback<'_>>,
    ) -> Result<u64> {
        self.expire_scan_impl(max_keys, now_ms(), callback)
    }

    fn get_key_count(&mut self) -> Result<u64> {
        self.get_key_count_impl()
    }

    fn get_min_key(&mut self) -> Result<Option<u64>> {
        self.min_key_impl()
    }

    fn get_data_size(&mut self) -> Result<u64> {
        self.get_data_size_impl()
    }

    fn get_stats(&mut self) -> Result<Stats> {
        self.get_stats_impl()
    }

    fn count_range(&mut self, start: u64, end: u64) -> Result<u64> {
        self.count_range_impl(start, end)
    }

    fn exists_in_range(&mut self, start: u64, end: u64) -> Result<bool> {
        self.exists_in_range_impl(start, end)
    }

    fn range_records(&mut self, start: u64, end: u64) -> Result<Vec<Record>> {
        self.range_records_impl(start, end)
    }
}
