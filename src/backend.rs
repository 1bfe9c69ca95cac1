//! The storage backend contract: the capability set every backend must
//! implement (spec.md S:4.3).
//!
//! Modeled as a trait -- the teacher's `Storage`/`Transaction` traits
//! (`beads-storage/src/traits.rs`) are the direct structural ancestor: a
//! `Send`-free, object-safe interface with one method per capability, so an
//! instance can hold `Box<dyn Backend>` and forward calls through it (the
//! "dispatching facade" from spec.md S:1, realised here as `crate::Store`).
//!
//! Only the relational adapter (`crate::sqlite::SqliteBackend`) is actually
//! implemented in this crate; alternative backends (mmap B-tree, LSM) are
//! out of scope per spec.md S:1 -- only their conformance to this trait
//! would matter, not their implementation.

use crate::config::Config;
use crate::error::{KvError, Result, TtlStatus};
use crate::migration::Migration;

/// One stored record: `(id, term, cmd, data)`. The `created` slot from
/// spec.md S:3 is reserved and always 0 on insert in this implementation
/// (see DESIGN.md's note on the open question).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: u64,
    pub term: u64,
    pub cmd: u64,
    pub data: Vec<u8>,
}

/// Precondition for [`Backend::insert_ex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertCondition {
    /// Upsert: insert-or-replace keyed on id.
    Always,
    /// Insert only if no record with this id exists yet.
    IfNotExists,
    /// Update only if a record with this id already exists.
    IfExists,
}

/// Aggregate statistics reported by [`Backend::get_stats`].
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub key_count: u64,
    pub min_key: Option<u64>,
    pub max_key: Option<u64>,
    pub total_value_bytes: u64,
    pub page_count: u64,
    pub page_size: u64,
    pub freelist_pages: u64,
    pub file_size_bytes: u64,
    pub wal_size_bytes: Option<u64>,
}

/// Callback invoked periodically by streaming operations (export,
/// `expire_scan`). Returning `false` cancels the operation with
/// [`KvError::Cancelled`] at the next boundary (every 100 records).
pub type ProgressCallback<'a> = dyn FnMut(u64, u64) -> bool + 'a;

/// The full capability set a backend exposes to the facade.
///
/// Every capability is a pure function of `(instance, inputs)` whose side
/// effects occur only on the owning instance's store. A backend that
/// cannot support a capability returns [`KvError::NotSupported`] without
/// side effect; the default implementations below do exactly that so a
/// partial backend only needs to override what it actually supports.
pub trait Backend {
    // -- lifecycle ------------------------------------------------------
    fn close(&mut self) -> Result<()>;
    fn fsync(&self) -> Result<()> {
        Err(KvError::NotSupported("fsync".into()))
    }
    /// Reapplies engine configuration on an already-open instance (spec.md S:6).
    fn update_config(&mut self, _config: Config) -> Result<()> {
        Err(KvError::NotSupported("update_config".into()))
    }
    /// Applies caller-supplied migrations on top of whatever schema the
    /// backend bootstrapped itself with (spec.md S:4.2).
    fn migrate(&mut self, _migrations: &[Migration], _target: u32) -> Result<()> {
        Err(KvError::NotSupported("migrate".into()))
    }

    // -- transactions -----------------------------------------------------
    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn abort(&mut self) -> Result<()>;

    // -- point queries ----------------------------------------------------
    fn get(&mut self, key: u64) -> Result<Option<Record>>;
    fn exists(&mut self, key: u64) -> Result<bool>;
    fn exists_dual(&mut self, key: u64, expected_term: u64) -> Result<bool>;

    // -- ordered navigation -------------------------------------------------
    fn get_prev(&mut self, next_key: u64) -> Result<Option<Record>>;
    fn get_next(&mut self, previous_key: u64) -> Result<Option<Record>>;
    fn max_key(&mut self) -> Result<Option<u64>>;
    fn min_key(&mut self) -> Result<Option<u64>>;

    // -- writes -------------------------------------------------------------
    fn insert(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<()>;
    fn insert_ex(
        &mut self,
        key: u64,
        term: u64,
        cmd: u64,
        data: &[u8],
        condition: InsertCondition,
    ) -> Result<()>;
    fn remove(&mut self, key: u64) -> Result<()>;
    fn remove_after_n(&mut self, key: u64) -> Result<u64>;
    fn remove_before_n(&mut self, key: u64) -> Result<u64>;
    fn remove_range(
        &mut self,
        start: u64,
        end: u64,
        start_incl: bool,
        end_incl: bool,
    ) -> Result<u64>;

    // -- atomics --------------------------------------------------------------
    fn get_and_set(
        &mut self,
        key: u64,
        term: u64,
        cmd: u64,
        data: &[u8],
    ) -> Result<Option<Record>>;
    fn get_and_remove(&mut self, key: u64) -> Result<Record>;
    fn compare_and_swap(&mut self, key: u64, expected: &[u8], new: &[u8]) -> Result<bool>;
    fn compare_term_and_swap(
        &mut self,
        key: u64,
        expected_term: u64,
        new_term: u64,
        new_cmd: u64,
        new: &[u8],
    ) -> Result<bool>;

    // -- content edits --------------------------------------------------------
    fn append(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<u64>;
    fn prepend(&mut self, key: u64, term: u64, cmd: u64, data: &[u8]) -> Result<u64>;
    fn get_value_range(&mut self, key: u64, offset: u64, length: u64) -> Result<Vec<u8>>;
    fn set_value_range(&mut self, key: u64, offset: u64, data: &[u8]) -> Result<u64>;

    // -- TTL --------------------------------------------------------------------
    fn set_expire(&mut self, key: u64, ttl_ms: i64) -> Result<()>;
    fn set_expire_at(&mut self, key: u64, epoch_ms: i64) -> Result<()>;
    fn get_ttl(&mut self, key: u64) -> Result<TtlStatus>;
    fn persist(&mut self, key: u64) -> Result<()>;
    fn expire_scan(&mut self, max_keys: u64, callback: Option<&mut ProgressCallback<'_>>) -> Result<u64>;

    // -- statistics -------------------------------------------------------------
    fn get_key_count(&mut self) -> Result<u64>;
    fn get_min_key(&mut self) -> Result<Option<u64>>;
    fn get_data_size(&mut self) -> Result<u64>;
    fn get_stats(&mut self) -> Result<Stats>;
    fn count_range(&mut self, start: u64, end: u64) -> Result<u64>;
    fn exists_in_range(&mut self, start: u64, end: u64) -> Result<bool>;

    // -- bulk I/O -------------------------------------------------------------
    /// Materialises every record in `[start, end]` ordered by ascending key,
    /// the data source the codec (`crate::codec`) streams into an export.
    fn range_records(&mut self, start: u64, end: u64) -> Result<Vec<Record>>;
    /// Inserts `record`, used by import to replay a decoded entry.
    /// `skip_duplicates` turns a duplicate key into a no-op instead of a
    /// propagated error; the existence check is made before attempting the
    /// insert so neither path depends on a particular store's error codes.
    fn insert_record(&mut self, record: &Record, skip_duplicates: bool) -> Result<()> {
        if skip_duplicates && self.exists(record.id)? {
            return Ok(());
        }
        self.insert(record.id, record.term, record.cmd, &record.data)
    }
}
