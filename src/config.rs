//! Engine configuration: pragmas and knobs applied when a [`crate::Store`]
//! is opened or reconfigured.

/// SQLite journal mode, mirrored one-to-one onto `PRAGMA journal_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    #[default]
    Wal,
    Off,
}

impl JournalMode {
    pub(crate) fn as_pragma(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Persist => "PERSIST",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
            Self::Off => "OFF",
        }
    }
}

/// SQLite synchronous mode, mirrored onto `PRAGMA synchronous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    Off,
    #[default]
    Normal,
    Full,
    Extra,
}

impl SyncMode {
    pub(crate) fn as_pragma(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
            Self::Extra => "EXTRA",
        }
    }
}

/// Configuration applied to a store on open (`Store::open_with_config`) or
/// reapplied on an already-open instance (`Store::update_config`).
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_size_bytes: i64,
    pub vfs_name: Option<String>,
    pub journal_mode: JournalMode,
    pub sync_mode: SyncMode,
    pub enable_recursive_triggers: bool,
    pub enable_foreign_keys: bool,
    pub read_only: bool,
    pub busy_timeout_ms: u32,
    pub mmap_size_bytes: i64,
    pub page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_size_bytes: 32 * 1024 * 1024,
            vfs_name: None,
            journal_mode: JournalMode::Wal,
            sync_mode: SyncMode::Normal,
            enable_recursive_triggers: true,
            enable_foreign_keys: false,
            read_only: false,
            busy_timeout_ms: 5_000,
            mmap_size_bytes: 0,
            page_size: 0,
        }
    }
}

impl Config {
    /// Builds the `PRAGMA` batch implied by this configuration.
    ///
    /// `cache_size_bytes` is negative-encoded per SQLite convention
    /// (a negative `PRAGMA cache_size` value means kibibytes, not pages).
    pub(crate) fn pragma_batch(&self) -> String {
        let cache_size_kib = -(self.cache_size_bytes.max(0) / 1024).max(1);
        let mut batch = format!(
            "PRAGMA journal_mode = {};\n\
             PRAGMA synchronous = {};\n\
             PRAGMA cache_size = {};\n\
             PRAGMA recursive_triggers = {};\n\
             PRAGMA foreign_keys = {};\n\
             PRAGMA busy_timeout = {};\n",
            self.journal_mode.as_pragma(),
            self.sync_mode.as_pragma(),
            cache_size_kib,
            self.enable_recursive_triggers as i32,
            self.enable_foreign_keys as i32,
            self.busy_timeout_ms,
        );
        if self.mmap_size_bytes > 0 {
            batch.push_str(&format!("PRAGMA mmap_size = {};\n", self.mmap_size_bytes));
        }
        if self.page_size > 0 {
            batch.push_str(&format!("PRAGMA page_size = {};\n", self.page_size));
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.cache_size_bytes, 32 * 1024 * 1024);
        assert_eq!(cfg.journal_mode, JournalMode::Wal);
        assert_eq!(cfg.sync_mode, SyncMode::Normal);
        assert!(cfg.enable_recursive_triggers);
        assert!(!cfg.enable_foreign_keys);
        assert_eq!(cfg.busy_timeout_ms, 5_000);
    }

    #[test]
    fn pragma_batch_encodes_cache_size_in_negative_kib() {
        let cfg = Config::default();
        let batch = cfg.pragma_batch();
        assert!(batch.contains("PRAGMA cache_size = -32768"));
        assert!(batch.contains("PRAGMA journal_mode = WAL"));
    }
}
