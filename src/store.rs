//! `LogStore` (spec.md §4.D): the public append/read/trim/sync/compact/close
//! surface, routing addresses to segments through the [`SegmentCache`].
//!
//! Grounded on the overall shape of `examples/tursodatabase-libsql/libsql-wal/src/shared_wal.rs` (one facade type
//! routing to per-segment state) and `examples/tursodatabase-libsql/libsql-wal/src/registry.rs`'s open-on-demand
//! dispatch, rewritten for synchronous per-address routing.

use std::sync::Arc;

use tracing::instrument;

use crate::address::LogAddress;
use crate::cache::SegmentCache;
use crate::config::StoreConfig;
use crate::entry::LogData;
use crate::error::Result;
use crate::recovery;
use crate::segment::SegmentHandle;

pub struct LogStore {
    config: StoreConfig,
    cache: SegmentCache,
}

impl LogStore {
    /// Opens (creating the directory if needed) the store rooted at
    /// `config.log_dir`, eagerly verifying every existing segment's header
    /// (spec.md §4.F phase 1). Segment bodies are recovered lazily, on first
    /// access, through the [`SegmentCache`].
    #[instrument(skip_all, fields(log_dir = %config.log_dir.display()))]
    pub fn open(config: StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.log_dir)?;
        recovery::verify_all_headers(&config.log_dir, config.no_verify)?;
        tracing::debug!("log store opened");
        Ok(Self {
            config,
            cache: SegmentCache::new(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn segment_for(&self, address: LogAddress) -> Result<Arc<SegmentHandle>> {
        let path = address.segment_path(&self.config.log_dir, self.config.records_per_log_file);
        self.cache.get_or_open(path, self.config.no_verify)
    }

    /// Writes `data` at `address`. Fails with [`crate::error::LogStoreError::Overwrite`]
    /// if the address was already written or confirmed-trimmed. Not guaranteed
    /// durable until [`LogStore::sync`].
    #[instrument(skip(self, data), fields(address = address.address))]
    pub fn append(&self, address: LogAddress, mut data: LogData) -> Result<()> {
        data.global_address = address.address;
        let segment = self.segment_for(address)?;
        segment.append(&data)?;
        tracing::debug!("appended");
        Ok(())
    }

    /// Reads the entry at `address`. Fails with
    /// [`crate::error::LogStoreError::Trimmed`] if the address is pending trim
    /// (even before compaction); returns `None` if the address is unknown.
    #[instrument(skip(self), fields(address = address.address))]
    pub fn read(&self, address: LogAddress) -> Result<Option<LogData>> {
        let segment = self.segment_for(address)?;
        segment.read(address.address)
    }

    /// Address/trim counts for the segment backing `address`, opening it (and
    /// replaying its index) if this is the first access.
    #[instrument(skip(self), fields(address = address.address))]
    pub fn segment_stats(&self, address: LogAddress) -> Result<crate::segment::SegmentStats> {
        let segment = self.segment_for(address)?;
        Ok(segment.stats())
    }

    /// Records a trim intent. A no-op if the address is unknown or already
    /// pending — spec.md's open question on trim-before-write, preserved exactly:
    /// a client that trims ahead of a writer never records the intent.
    #[instrument(skip(self), fields(address = address.address))]
    pub fn trim(&self, address: LogAddress) -> Result<()> {
        let segment = self.segment_for(address)?;
        if !segment.is_known(address.address) || segment.is_pending_trim(address.address) {
            return Ok(());
        }
        segment.record_pending_trim(address.address)?;
        tracing::debug!("trim recorded");
        Ok(())
    }

    /// Fsyncs every channel written since the last call.
    #[instrument(skip(self))]
    pub fn sync(&self) -> Result<()> {
        for segment in self.cache.iter() {
            if segment.is_dirty() {
                segment.sync()?;
            }
        }
        Ok(())
    }

    /// Runs a compaction pass over every cached segment that crosses the trim
    /// threshold (spec.md §4.E). Returns the number of segments compacted.
    #[instrument(skip(self))]
    pub fn compact(&self) -> Result<usize> {
        crate::compactor::compact_all(&self.cache, &self.config)
    }

    /// Reserved for caches; the store itself has nothing to release.
    pub fn release(&self, _address: LogAddress, _data: LogData) {}

    /// Force-flushes and closes every open segment, dropping the cache.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        self.cache.close_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &std::path::Path) -> LogStore {
        LogStore::open(StoreConfig::new(dir)).unwrap()
    }

    #[test]
    fn put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        store
            .append(LogAddress::new(0), LogData::data(0, &b"e0"[..]))
            .unwrap();
        store
            .append(LogAddress::new(10), LogData::data(10, &b"e1"[..]))
            .unwrap();
        store.sync().unwrap();
        assert_eq!(
            store.read(LogAddress::new(0)).unwrap().unwrap().data.as_ref(),
            b"e0"
        );
        assert_eq!(
            store.read(LogAddress::new(10)).unwrap().unwrap().data.as_ref(),
            b"e1"
        );
    }

    #[test]
    fn overwrite_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        store
            .append(LogAddress::new(5), LogData::data(5, &b"a"[..]))
            .unwrap();
        let err = store
            .append(LogAddress::new(5), LogData::data(5, &b"b"[..]))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::LogStoreError::Overwrite(5)
        ));
    }

    #[test]
    fn read_of_unknown_address_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        assert_eq!(store.read(LogAddress::new(42)).unwrap(), None);
    }

    #[test]
    fn trim_before_write_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        // trimming an address no one has written yet must not record intent
        store.trim(LogAddress::new(7)).unwrap();
        store
            .append(LogAddress::new(7), LogData::data(7, &b"late"[..]))
            .unwrap();
        assert_eq!(
            store.read(LogAddress::new(7)).unwrap().unwrap().data.as_ref(),
            b"late"
        );
    }

    #[test]
    fn trim_then_read_is_trimmed_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        store
            .append(LogAddress::new(1), LogData::data(1, &b"a"[..]))
            .unwrap();
        store.trim(LogAddress::new(1)).unwrap();
        let err = store.read(LogAddress::new(1)).unwrap_err();
        assert!(matches!(err, crate::error::LogStoreError::Trimmed(1)));
    }

    #[test]
    fn segment_routing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(StoreConfig::new(dir.path()).records_per_log_file(10_000)).unwrap();
        store
            .append(LogAddress::new(9_999), LogData::data(9_999, &b"a"[..]))
            .unwrap();
        store
            .append(LogAddress::new(10_000), LogData::data(10_000, &b"b"[..]))
            .unwrap();
        assert!(dir.path().join("0.log").exists());
        assert!(dir.path().join("1.log").exists());
    }

    #[test]
    fn crash_durability_only_synced_writes_survive() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open(dir.path());
            store
                .append(LogAddress::new(0), LogData::data(0, &b"e"[..]))
                .unwrap();
            store.sync().unwrap();
            store
                .append(LogAddress::new(1), LogData::data(1, &b"f"[..]))
                .unwrap();
            // no sync(): address 1 is not guaranteed to survive a crash, but since
            // we do not actually crash the process here, the in-process read still
            // observes it (spec.md §5: append -> read from the same caller is
            // visible without an intervening sync).
            assert!(store.read(LogAddress::new(1)).unwrap().is_some());
        }
        let store = open(dir.path());
        assert!(store.read(LogAddress::new(0)).unwrap().is_some());
    }
}
