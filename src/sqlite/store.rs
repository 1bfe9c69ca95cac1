//! [`SqliteBackend`] -- the relational adapter's instance state: one store
//! handle, a closed set of hot prepared statements (via rusqlite's built-in
//! statement cache), and a transaction state machine.
//!
//! Grounded in the teacher's `sqlite/store.rs::SqliteStore` (open/
//! open_in_memory/configure_connection/init_schema); generalised from a
//! `Mutex<Connection>` (needed there so `Storage: Send + Sync` could be
//! shared across threads) to a plain owned `Connection` behind `&mut self`,
//! since this contract's concurrency model is explicitly single-threaded
//! per instance (spec.md S:5) -- see DESIGN.md.

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::migration::{self, Migration};
use crate::sqlite::schema_def::bootstrap_migration;

/// Transaction state machine (spec.md S:4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxnState {
    Idle,
    Active,
    Failed,
}

/// SQLite-backed realisation of the storage contract (`crate::backend::Backend`).
pub struct SqliteBackend {
    pub(crate) conn: Connection,
    pub(crate) txn_state: TxnState,
    pub(crate) config: Config,
    /// Scratch buffer the zero-copy read path (`get_ref`/`get_prev_ref`/
    /// `get_next_ref`) writes into; borrowing it ties the returned
    /// `ValueRef`'s lifetime to the `&mut self` used to produce it, so the
    /// borrow checker enforces "invalidated by the next call that advances
    /// any statement" for us (spec.md S:5).
    pub(crate) scratch: Vec<u8>,
}

impl SqliteBackend {
    /// Opens (or creates) a store file with default configuration. The
    /// reserved path `:memory:` selects an ephemeral store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens an in-memory store (useful for tests); always uses the
    /// store's default locking, never the exclusive primitive (spec.md S:6).
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with_config(":memory:", Config::default())
    }

    /// Opens a store applying the given configuration.
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref();
        let is_memory = path.to_str() == Some(":memory:");
        info!(?path, "opening store");

        let flags = if config.read_only {
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            rusqlite::OpenFlags::default()
        };
        let conn = match &config.vfs_name {
            Some(vfs) => Connection::open_with_flags_and_vfs(path, flags, vfs),
            None if is_memory => Connection::open_in_memory(),
            None => Connection::open_with_flags(path, flags),
        }
        .map_err(|e| KvError::Io(format!("failed to open {}: {e}", path.display())))?;

        let mut backend = Self {
            conn,
            txn_state: TxnState::Idle,
            config,
            scratch: Vec::new(),
        };
        backend.configure_connection()?;
        backend.bootstrap_schema()?;
        Ok(backend)
    }

    /// Applies the pragma set from `config`. Called on open, and again by
    /// `update_config` on an already-open instance.
    pub fn update_config(&mut self, config: Config) -> Result<()> {
        self.config = config;
        self.configure_connection()
    }

    fn configure_connection(&self) -> Result<()> {
        self.conn
            .execute_batch(&self.config.pragma_batch())
            .map_err(|e| KvError::Internal(format!("failed to apply pragmas: {e}")))?;
        Ok(())
    }

    /// Creates `LOG`, the TTL side table, and the migration metadata tables
    /// if absent, via the adapter's own internal migration runner.
    fn bootstrap_schema(&mut self) -> Result<()> {
        let migrations = [bootstrap_migration()];
        migration::apply(&mut self.conn, &migrations, 1)?;
        debug!("schema bootstrapped");
        Ok(())
    }

    /// Applies caller-supplied migrations on top of the bootstrap schema.
    pub fn migrate(&mut self, migrations: &[Migration], target: u32) -> Result<()> {
        migration::apply(&mut self.conn, migrations, target)
    }

    /// Finalises the instance. Fails if a transaction is still active; the
    /// caller must commit or abort first.
    pub fn close(&mut self) -> Result<()> {
        if self.txn_state != TxnState::Idle {
            return Err(KvError::Internal(
                "cannot close with uncommitted transaction".into(),
            ));
        }
        Ok(())
    }

    /// Marks the transaction as poisoned if it is currently active. Every
    /// mutating operation on this backend routes its fallible body through
    /// this helper so an error during an explicit transaction transitions
    /// `Active -> Failed` per the state machine (spec.md S:4.5), without
    /// auto-aborting -- the caller still must choose commit or abort.
    pub(crate) fn guard<T>(&mut self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let result = f(&mut self.conn);
        if result.is_err() && self.txn_state == TxnState::Active {
            self.txn_state = TxnState::Failed;
        }
        result
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("txn_state", &self.txn_state)
            .finish_non_exhaustive()
    }
}
