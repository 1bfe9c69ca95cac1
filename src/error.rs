//! Error taxonomy for the storage engine.

use std::sync::Mutex;

/// Errors that can occur during a storage operation.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// NULL/empty required argument, malformed configuration, or an SDL
    /// validation failure.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested key is absent where existence is required.
    #[error("key not found: {0}")]
    NotFound(u64),

    /// A conditional write's precondition was not met (IF_NOT_EXISTS on a
    /// present key, IF_EXISTS on an absent key). CAS mismatch is NOT this --
    /// it is a successful call that reports `swapped = false`.
    #[error("condition failed for key {0}")]
    ConditionFailed(u64),

    /// The chosen backend does not implement this capability.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// File open/read/write failure during export/import or store open.
    #[error("io error: {0}")]
    Io(String),

    /// Allocation failure producing an owned copy.
    #[error("out of memory")]
    NoMemory,

    /// The store returned an unexpected status, or a transaction-state
    /// violation occurred.
    #[error("internal error: {0}")]
    Internal(String),

    /// A user progress callback returned `false`.
    #[error("operation cancelled")]
    Cancelled,

    /// A raw relational-store error that does not map to a more specific
    /// variant above.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// JSON encoding/decoding failed (export/import codec).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KvError>;

/// Sentinel results for [`crate::backend::Backend::get_ttl`] that are not
/// errors: the TTL facility has no opinion, or the key itself is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlStatus {
    /// `expires_at - now_ms`, clamped to 0 if already in the past.
    RemainingMs(i64),
    /// LOG has the key but no TTL row exists for it.
    None,
    /// LOG has no record with this id.
    NotFound,
}

impl KvError {
    /// Creates a [`KvError::NotFound`] for the given key.
    pub fn not_found(key: u64) -> Self {
        Self::NotFound(key)
    }

    /// Creates a [`KvError::InvalidArgument`] with the given message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns `true` if this is a [`KvError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if this is a [`KvError::ConditionFailed`].
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, Self::ConditionFailed(_))
    }
}

/// Per-instance record of the last error, mirroring the `getLastError` /
/// `getLastErrorMessage` / `clearError` surface from the external interface.
///
/// Every operation that returns an error also records it here before
/// returning, so a caller using the boolean-success style of the original
/// contract can still inspect what went wrong.
#[derive(Debug, Default)]
pub struct LastError {
    inner: Mutex<Option<String>>,
}

impl LastError {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Records an error's display message as the last error.
    pub fn record(&self, err: &KvError) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(err.to_string());
        }
    }

    /// Returns the last recorded error message, if any.
    pub fn message(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|g| g.clone())
    }

    /// Clears the last recorded error.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = None;
        }
    }
}

/// Runs `op`, recording any error into `last_error` before propagating it.
///
/// Centralises the "every operation sets the instance's last-error fields on
/// failure" propagation policy (see the error handling design) so call sites
/// don't have to repeat `.inspect_err(...)` everywhere.
pub(crate) fn track<T>(last_error: &LastError, op: Result<T>) -> Result<T> {
    if let Err(ref e) = op {
        last_error.record(e);
    }
    op
}
