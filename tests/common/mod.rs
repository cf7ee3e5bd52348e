//! Shared integration-test harness, the same shape as
//! `examples/tursodatabase-libsql/libsql-wal/tests/misc.rs`'s `TestEnv`: a temp directory plus a thin wrapper
//! that opens a store against it.

use logstore::{LogStore, StoreConfig};
use tempfile::TempDir;

pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn open(&self) -> LogStore {
        LogStore::open(StoreConfig::new(self.dir.path())).unwrap()
    }

    pub fn open_with(&self, config: impl FnOnce(StoreConfig) -> StoreConfig) -> LogStore {
        LogStore::open(config(StoreConfig::new(self.dir.path()))).unwrap()
    }

    pub fn segment_path(&self, segment: u64) -> std::path::PathBuf {
        self.dir.path().join(format!("{segment}.log"))
    }
}
