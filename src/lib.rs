//! `kvidxkit` -- an embedded, single-process key-value index library over a
//! transactional relational store.
//!
//! Each record is addressed by an unsigned 64-bit key and carries a `term`
//! (application-assigned version tag), a `cmd` (opaque type tag), and an
//! opaque byte value. On top of that record model the library offers
//! ordered navigation, range operations, atomic read-modify-write,
//! conditional writes, compare-and-swap, partial value edits, per-key TTL
//! with lazy expiration, transactional batches, and binary/JSON/CSV
//! export-import.
//!
//! [`Store`] is the façade: it holds a boxed [`backend::Backend`]
//! (currently always the relational adapter, [`sqlite::SqliteBackend`]) and
//! forwards every call to it, recording the last error along the way so
//! callers that prefer to poll [`Store::last_error_message`] instead of
//! matching on [`error::KvError`] can do so.

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod migration;
pub mod schema;
pub mod sqlite;

use std::path::Path;

pub use backend::{Backend, InsertCondition, ProgressCallback, Record, Stats};
pub use codec::{ExportOptions, Format};
pub use config::Config;
pub use error::{KvError, Result, TtlStatus};
pub use migration::Migration;
pub use sqlite::SqliteBackend;

use error::{track, LastError};

/// The instance façade: one selected backend plus the per-instance state
/// the backend itself does not track on the caller's behalf (the last
/// error). Every method here is a thin forward onto [`Backend`], recording
/// the outcome before returning it -- see spec.md S:6/S:7.
pub struct Store {
    backend: Box<dyn Backend>,
    last_error: LastError,
}

impl Store {
    /// Opens (or creates) a relational store file with default
    /// configuration. The reserved path `:memory:` selects an ephemeral
    /// store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_backend(Box::new(SqliteBackend::open(path)?)))
    }

    /// Opens an in-memory store (useful for tests and scratch work).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_backend(Box::new(SqliteBackend::open_in_memory()?)))
    }

    /// Opens a store applying the given configuration.
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        Ok(Self::from_backend(Box::new(SqliteBackend::open_with_config(
            path, config,
        )?)))
    }

    /// Wraps an already-constructed backend in a façade. Exists so
    /// alternative backends (out of scope for this crate, but conformant
    /// to [`Backend`]) can be used without going through [`Store::open`].
    pub fn from_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            last_error: LastError::new(),
        }
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        track(&self.last_error, result)
    }

    /// The message of the last error recorded on this instance, if any.
    pub fn last_error_message(&self) -> Option<String> {
        self.last_error.message()
    }

    /// Clears the last recorded error.
    pub fn clear_error(&self) {
        self.last_error.clear();
    }

    // -- lifecycle ------------------------------------------------------------

    pub fn close(&mut self) -> Result<()> {
        let result = self.backend.close();
        self.track(result)
    }

    pub fn fsync(&self) -> Result<()> {
        self.track(self.backend.fsync())
    }

    /// Reapplies engine configuration (journal mode, cache size, ...) on
    /// this already-open instance.
    pub fn update_config(&mut self, config: Config) -> Result<()> {
        let result = self.backend.update_config(config);
        self.track(result)
    }

    /// Applies caller-supplied migrations, in ascending version order, on
    /// top of whatever schema the backend bootstrapped itself with. The
    /// relational adapter consumes schema version 1 for its own LOG/TTL
    /// bootstrap, so caller-supplied migrations should number themselves
    /// starting at 2.
    pub fn migrate(&mut self, migrations: &[Migration], target: u32) -> Result<()> {
        let result = self.backend.migrate(migrations, target);
        self.track(result)
    }

    // -- transactions -----------------------------------------------------------

    pub fn begin(&mut self) -> Result<()> {
        let result = self.backend.begin();
        self.track(result)
    }

    pub fn commit(&mut self) -> Result<()> {
        let result = self.backend.commit();
        self.track(result)
    }

    pub fn abort(&mut self) -> Result<()> {
        let result = self.backend.abort();
        self.track(result)
    }

    // -- point queries ----------------------------------------------------------

    pub fn get(&mut self, key: u64) -> Result<Option<Record>> {
        let result = self.backend.get(key);
        self.track(result)
    }

    pub fn exists(&mut self, key: u64) -> Result<bool> {
        let result = self.backend.exists(key);
        self.track(result)
    }

    pub fn exists_dual(&mut self, key: u64, expected_term: u64) -> Result<bool> {
        let result = self.backend.exists_dual(key, expected_term);
        self.track(result)
    }

    // -- ordered navigation -------------------------------------------------------

    pub fn get_prev(&mut self, next_key: u64) -> Result<Option<Record>> {
        let result = self.backend.get_prev(next_key);
        self.track(result)
    }

    pub fn get_next(&mut self, previous_key: u64) -> Result<Option<Record>> {
        let result = self.backend.get_next(previous_key);
        self.track(result)
    }

    pub fn max_key(&mut self) -> Result<Option<u64>> {
        let result = self.backend.max_key();
        self.track(result)
    }

    pub fn min_key(&mut self) -> Result<Option<u64>> {
        let result = self.backend.min_key();
        self.track(result)
    }

    // -- writes -------------------------------------------------------------------

    pub fn insert(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<()> {
        let result = self.backend.insert(key, term, cmd, data);
        self.track(result)
    }

    pub fn insert_ex(
        &mut self,
        key: u64,
        term: u64,
        cmd: u64,
        data: &[u8],
        condition: InsertCondition,
    ) -> Result<()> {
        let result = self.backend.insert_ex(key, term, cmd, data, condition);
        self.track(result)
    }

    /// Convenience for `insertEx(..., IF_NOT_EXISTS)`.
    pub fn insert_nx(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<()> {
        self.insert_ex(key, term, cmd, data, InsertCondition::IfNotExists)
    }

    /// Convenience for `insertEx(..., IF_EXISTS)`.
    pub fn insert_xx(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<()> {
        self.insert_ex(key, term, cmd, data, InsertCondition::IfExists)
    }

    pub fn remove(&mut self, key: u64) -> Result<()> {
        let result = self.backend.remove(key);
        self.track(result)
    }

    pub fn remove_after_n(&mut self, key: u64) -> Result<u64> {
        let result = self.backend.remove_after_n(key);
        self.track(result)
    }

    pub fn remove_before_n(&mut self, key: u64) -> Result<u64> {
        let result = self.backend.remove_before_n(key);
        self.track(result)
    }

    pub fn remove_range(
        &mut self,
        start: u64,
        end: u64,
        start_incl: bool,
        end_incl: bool,
    ) -> Result<u64> {
        let result = self.backend.remove_range(start, end, start_incl, end_incl);
        self.track(result)
    }

    /// Inserts every entry in `entries` inside a single transaction,
    /// skipping entries `filter` rejects. On the first insert failure the
    /// transaction is aborted and the error propagated; on success the
    /// transaction is committed and the number of entries actually
    /// inserted is returned.
    pub fn insert_batch(
        &mut self,
        entries: &[Record],
        mut filter: Option<&mut dyn FnMut(&Record) -> bool>,
    ) -> Result<u64> {
        self.begin()?;
        let mut inserted = 0u64;
        for record in entries {
            let include = match filter.as_deref_mut() {
                Some(f) => f(record),
                None => true,
            };
            if !include {
                continue;
            }
            if let Err(e) = self.backend.insert(record.id, record.term, record.cmd, &record.data) {
                let _ = self.backend.abort();
                return Err(self.track(Err(e)).unwrap_err());
            }
            inserted += 1;
        }
        self.commit()?;
        Ok(inserted)
    }

    // -- atomics --------------------------------------------------------------------

    pub fn get_and_set(
        &mut self,
        key: u64,
        term: u64,
        cmd: u64,
        data: &[u8],
    ) -> Result<Option<Record>> {
        let result = self.backend.get_and_set(key, term, cmd, data);
        self.track(result)
    }

    pub fn get_and_remove(&mut self, key: u64) -> Result<Record> {
        let result = self.backend.get_and_remove(key);
        self.track(result)
    }

    pub fn compare_and_swap(&mut self, key: u64, expected: &[u8], new: &[u8]) -> Result<bool> {
        let result = self.backend.compare_and_swap(key, expected, new);
        self.track(result)
    }

    pub fn compare_term_and_swap(
        &mut self,
        key: u64,
        expected_term: u64,
        new_term: u64,
        new_cmd: u64,
        new: &[u8],
    ) -> Result<bool> {
        let result = self
            .backend
            .compare_term_and_swap(key, expected_term, new_term, new_cmd, new);
        self.track(result)
    }

    // -- content edits --------------------------------------------------------------

    pub fn append(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<u64> {
        let result = self.backend.append(key, term, cmd, data);
        self.track(result)
    }

    pub fn prepend(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<u64> {
        let result = self.backend.prepend(key, term, cmd, data);
        self.track(result)
    }

    pub fn get_value_range(&mut self, key: u64, offset: u64, length: u64) -> Result<Vec<u8>> {
        let result = self.backend.get_value_range(key, offset, length);
        self.track(result)
    }

    pub fn set_value_range(&mut self, key: u64, offset: u64, data: &[u8]) -> Result<u64> {
        let result = self.backend.set_value_range(key, offset, data);
        self.track(result)
    }

    // -- TTL --------------------------------------------------------------------------

    pub fn set_expire(&mut self, key: u64, ttl_ms: i64) -> Result<()> {
        let result = self.backend.set_expire(key, ttl_ms);
        self.track(result)
    }

    pub fn set_expire_at(&mut self, key: u64, epoch_ms: i64) -> Result<()> {
        let result = self.backend.set_expire_at(key, epoch_ms);
        self.track(result)
    }

    pub fn get_ttl(&mut self, key: u64) -> Result<TtlStatus> {
        let result = self.backend.get_ttl(key);
        self.track(result)
    }

    pub fn persist(&mut self, key: u64) -> Result<()> {
        let result = self.backend.persist(key);
        self.track(result)
    }

    pub fn expire_scan(
        &mut self,
        max_keys: u64,
        callback: Option<&mut ProgressCallback<'_>>,
    ) -> Result<u64> {
        let result = self.backend.expire_scan(max_keys, callback);
        self.track(result)
    }

    // -- statistics -------------------------------------------------------------------

    pub fn get_key_count(&mut self) -> Result<u64> {
        let result = self.backend.get_key_count();
        self.track(result)
    }

    pub fn get_min_key(&mut self) -> Result<Option<u64>> {
        let result = self.backend.get_min_key();
        self.track(result)
    }

    pub fn get_data_size(&mut self) -> Result<u64> {
        let result = self.backend.get_data_size();
        self.track(result)
    }

    pub fn get_stats(&mut self) -> Result<Stats> {
        let result = self.backend.get_stats();
        self.track(result)
    }

    pub fn count_range(&mut self, start: u64, end: u64) -> Result<u64> {
        let result = self.backend.count_range(start, end);
        self.track(result)
    }

    pub fn exists_in_range(&mut self, start: u64, end: u64) -> Result<bool> {
        let result = self.backend.exists_in_range(start, end);
        self.track(result)
    }

    // -- bulk I/O ---------------------------------------------------------------------

    /// Exports `[start, end]` (`end == u64::MAX` is unbounded) in the
    /// requested wire format, polling `callback` every 100 entries and
    /// once more at the end.
    pub fn export(
        &mut self,
        start: u64,
        end: u64,
        format: Format,
        options: ExportOptions,
        callback: Option<&mut ProgressCallback<'_>>,
    ) -> Result<Vec<u8>> {
        let records = match self.backend.range_records(start, end) {
            Ok(r) => r,
            Err(e) => return self.track(Err(e)),
        };
        self.track(codec::encode(&records, format, options, callback))
    }

    /// Imports a previously exported byte stream, auto-detecting its
    /// format. If `clear_first` is set, every existing record is removed
    /// before the import runs. `skip_duplicates` turns a duplicate key
    /// into a no-op instead of aborting the whole import. Only the binary
    /// format can actually be imported; JSON/CSV return
    /// [`KvError::NotSupported`] (spec.md S:4.5).
    pub fn import(
        &mut self,
        bytes: &[u8],
        clear_first: bool,
        skip_duplicates: bool,
        mut callback: Option<&mut ProgressCallback<'_>>,
    ) -> Result<u64> {
        let format = codec::sniff_format(bytes);
        let records = match codec::decode(bytes, format, callback.as_deref_mut()) {
            Ok(r) => r,
            Err(e) => return self.track(Err(e)),
        };

        if clear_first {
            self.remove_range(0, u64::MAX, true, true)?;
        }

        self.begin()?;
        for record in &records {
            if let Err(e) = self.backend.insert_record(record, skip_duplicates) {
                let _ = self.backend.abort();
                return Err(self.track(Err(e)).unwrap_err());
            }
        }
        self.commit()?;
        Ok(records.len() as u64)
    }
}
