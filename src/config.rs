//! Tunables for a [`crate::store::LogStore`].

use std::path::PathBuf;

/// On-disk format version. Bumped whenever the framing or entry schema changes.
pub const VERSION: u32 = 1;

/// Default number of addresses backed by a single segment file.
pub const DEFAULT_RECORDS_PER_LOG_FILE: u64 = 10_000;

/// Configuration for opening a [`crate::store::LogStore`].
///
/// Mirrors the teacher's "tunable as a constructor argument with a sensible
/// default" shape (see e.g. `FrameCountSwapStrategy::new`).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub log_dir: PathBuf,
    pub records_per_log_file: u64,
    pub trim_threshold: u64,
    pub no_verify: bool,
}

impl StoreConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let records_per_log_file = DEFAULT_RECORDS_PER_LOG_FILE;
        Self {
            log_dir: log_dir.into(),
            records_per_log_file,
            trim_threshold: records_per_log_file / 4,
            no_verify: false,
        }
    }

    pub fn records_per_log_file(mut self, n: u64) -> Self {
        self.records_per_log_file = n;
        self
    }

    pub fn trim_threshold(mut self, n: u64) -> Self {
        self.trim_threshold = n;
        self
    }

    pub fn no_verify(mut self, no_verify: bool) -> Self {
        self.no_verify = no_verify;
        self
    }
}
