//! Deferred-transaction control for [`SqliteBackend`].
//!
//! Locks are acquired lazily by SQLite itself on the first statement that
//! touches storage after `BEGIN DEFERRED`; this module only tracks the
//! instance-level state machine from spec.md S:4.5 and issues the raw
//! `BEGIN`/`COMMIT`/`ROLLBACK` statements. Nested transactions are rejected:
//! a second `begin` while `Active` or `Failed` fails.

use crate::error::{KvError, Result};
use crate::sqlite::store::{SqliteBackend, TxnState};

impl SqliteBackend {
    pub(crate) fn begin_impl(&mut self) -> Result<()> {
        if self.txn_state != TxnState::Idle {
            return Err(KvError::Internal(
                "transaction already active (nested transactions are not supported)".into(),
            ));
        }
        self.conn
            .execute_batch("BEGIN DEFERRED")
            .map_err(KvError::Store)?;
        self.txn_state = TxnState::Active;
        Ok(())
    }

    pub(crate) fn commit_impl(&mut self) -> Result<()> {
        match self.txn_state {
            TxnState::Idle => Err(KvError::Internal("no active transaction to commit".into())),
            TxnState::Failed => Err(KvError::Internal(
                "transaction is poisoned; commit refused".into(),
            )),
            TxnState::Active => {
                self.conn.execute_batch("COMMIT").map_err(|e| {
                    self.txn_state = TxnState::Failed;
                    KvError::Store(e)
                })?;
                self.txn_state = TxnState::Idle;
                Ok(())
            }
        }
    }

    pub(crate) fn abort_impl(&mut self) -> Result<()> {
        match self.txn_state {
            TxnState::Idle => Ok(()),
            TxnState::Active | TxnState::Failed => {
                self.conn.execute_batch("ROLLBACK").map_err(KvError::Store)?;
                self.txn_state = TxnState::Idle;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::store::SqliteBackend;

    #[test]
    fn second_begin_fails() {
        let mut b = SqliteBackend::open_in_memory().unwrap();
        b.begin_impl().unwrap();
        assert!(b.begin_impl().is_err());
        b.abort_impl().unwrap();
    }

    #[test]
    fn commit_without_begin_fails() {
        let mut b = SqliteBackend::open_in_memory().unwrap();
        assert!(b.commit_impl().is_err());
    }

    #[test]
    fn abort_rolls_back() {
        let mut b = SqliteBackend::open_in_memory().unwrap();
        b.begin_impl().unwrap();
        b.conn.execute("INSERT INTO log (id, term, cmd, data) VALUES (1, 0, 0, x'00')", []).unwrap();
        b.abort_impl().unwrap();
        let count: i64 = b.conn.query_row("SELECT COUNT(*) FROM log", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn failed_state_refuses_commit_but_allows_abort() {
        let mut b = SqliteBackend::open_in_memory().unwrap();
        b.begin_impl().unwrap();
        b.txn_state = crate::sqlite::store::TxnState::Failed;
        assert!(b.commit_impl().is_err());
        assert_eq!(b.txn_state, crate::sqlite::store::TxnState::Failed);
        b.abort_impl().unwrap();
        assert_eq!(b.txn_state, crate::sqlite::store::TxnState::Idle);
    }
}
