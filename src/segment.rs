//! `SegmentHandle` (spec.md §4.B): the file triple backing one segment, its
//! in-memory address index, and the lock serializing appends.
//!
//! Generalizes `examples/tursodatabase-libsql/libsql-wal/src/log.rs`'s `Log<F>` (one data file guarded by a
//! `parking_lot::Mutex`, index rebuilt on open) to the spec's three sibling files
//! per segment (data + confirmed-trim + pending-trim).

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::address::{pending_path, trimmed_path};
use crate::config::VERSION;
use crate::entry::{AddressMetaData, LogData, LogHeader};
use crate::error::{LogStoreError, Result};
use crate::file::FileExt;
use crate::{codec, recovery};

/// Which of a segment's three files a write landed in. Each `SegmentHandle` tracks
/// its own dirty set; `LogStore::sync` unions them by walking the cache, which is
/// the process-wide "channels to sync" set spec.md §5 calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Channel {
    Data,
    Trimmed,
    Pending,
}

/// Address/trim counts for one segment, as reported by [`SegmentHandle::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentStats {
    pub known: usize,
    pub trimmed: usize,
    pub pending: usize,
}

pub struct SegmentHandle {
    path: PathBuf,
    data_file: File,
    trimmed_file: File,
    pending_file: File,
    no_verify: bool,

    /// Current write offset into `data_file`. Serializes appends: the per-segment
    /// "lock" spec.md §4.B and §5 describe.
    write_pos: Mutex<u64>,

    known_addresses: RwLock<HashMap<u64, AddressMetaData>>,
    trimmed_addresses: RwLock<HashSet<u64>>,
    pending_trims: RwLock<HashSet<u64>>,

    dirty: Mutex<HashSet<Channel>>,
}

impl SegmentHandle {
    /// Opens (creating if needed) the three files backing `path`'s segment, writes
    /// the header if this is a new segment, and replays the data file and trim
    /// sidecars to rebuild the in-memory index (spec.md §4.F "on first access").
    pub fn open(path: PathBuf, no_verify: bool) -> Result<Self> {
        let is_new = !path.exists();

        let mut data_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        if is_new {
            let header = LogHeader {
                version: VERSION,
                verify_checksum: !no_verify,
            };
            let framed = codec::encode_header(&header)?;
            data_file.write_all_at(&framed, 0)?;
        } else {
            recovery::verify_header(&mut data_file, no_verify, &path)?;
        }

        // Sidecars are opened in append mode: the OS guarantees each write lands
        // atomically at the current end of file, so no offset bookkeeping is
        // needed the way the data file requires for `AddressMetaData::offset`.
        let trimmed_file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(trimmed_path(&path))?;
        let pending_file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(pending_path(&path))?;

        let (known_addresses, write_pos) = recovery::read_address_space(&data_file, !no_verify, &path)?;
        let trimmed_addresses = recovery::load_trim_addresses(&trimmed_file)?;
        let pending_trims = recovery::load_trim_addresses(&pending_file)?;

        Ok(Self {
            path,
            data_file,
            trimmed_file,
            pending_file,
            no_verify,
            write_pos: Mutex::new(write_pos),
            known_addresses: RwLock::new(known_addresses),
            trimmed_addresses: RwLock::new(trimmed_addresses),
            pending_trims: RwLock::new(pending_trims),
            dirty: Mutex::new(HashSet::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_known(&self, address: u64) -> bool {
        self.known_addresses.read().contains_key(&address)
    }

    pub fn is_trimmed(&self, address: u64) -> bool {
        self.trimmed_addresses.read().contains(&address)
    }

    pub fn is_pending_trim(&self, address: u64) -> bool {
        self.pending_trims.read().contains(&address)
    }

    pub fn known_and_trimmed_count(&self) -> usize {
        self.known_addresses.read().len() + self.trimmed_addresses.read().len()
    }

    pub fn pending_not_yet_trimmed_count(&self) -> usize {
        let trimmed = self.trimmed_addresses.read();
        self.pending_trims
            .read()
            .iter()
            .filter(|a| !trimmed.contains(a))
            .count()
    }

    pub fn pending_trims(&self) -> HashSet<u64> {
        self.pending_trims.read().clone()
    }

    /// Address/trim counts for this segment, the numbers `logctl stat` reports.
    pub fn stats(&self) -> SegmentStats {
        SegmentStats {
            known: self.known_addresses.read().len(),
            trimmed: self.trimmed_addresses.read().len(),
            pending: self.pending_trims.read().len(),
        }
    }

    /// Appends `entry`, failing with [`LogStoreError::Overwrite`] if its address is
    /// already known or confirmed-trimmed (spec.md §4.D, write-once invariant).
    ///
    /// The overwrite check, the write, and the `known_addresses` insert all happen
    /// under `write_pos` — the single per-segment lock spec.md §4.B/§5 call for —
    /// so two concurrent appends to the same address can't both pass the check
    /// before either is indexed.
    pub fn append(&self, entry: &LogData) -> Result<AddressMetaData> {
        let address = entry.global_address;
        let encoded = codec::encode_entry(entry)?;

        let mut pos = self.write_pos.lock();
        if self.is_known(address) || self.is_trimmed(address) {
            return Err(LogStoreError::Overwrite(address));
        }

        let offset = *pos;
        self.data_file.write_all_at(&encoded.framed, offset)?;
        *pos = offset + encoded.framed.len() as u64;
        self.dirty.lock().insert(Channel::Data);

        let meta = AddressMetaData {
            checksum: encoded.checksum,
            length: encoded.length,
            offset: offset + 2 + codec::METADATA_SIZE as u64,
        };
        self.known_addresses.write().insert(address, meta);
        Ok(meta)
    }

    /// Positioned read of an already-indexed entry. No lock is required: the byte
    /// range an `AddressMetaData` points at is immutable until compaction evicts
    /// this handle (spec.md §5).
    pub fn read(&self, address: u64) -> Result<Option<LogData>> {
        if self.is_pending_trim(address) {
            return Err(LogStoreError::Trimmed(address));
        }
        let meta = match self.known_addresses.read().get(&address).copied() {
            Some(meta) => meta,
            None => return Ok(None),
        };
        let mut buf = vec![0u8; meta.length.max(0) as usize];
        self.data_file.read_exact_at(&mut buf, meta.offset)?;
        let entry = codec::decode_payload(&buf, &self.path)?;
        Ok(Some(entry))
    }

    /// Records a pending-trim intent. The caller (`LogStore::trim`) has already
    /// decided this isn't a no-op.
    pub fn record_pending_trim(&self, address: u64) -> Result<()> {
        let framed = encode_trim_entry(address)?;
        append_sidecar(&self.pending_file, &framed)?;
        self.pending_trims.write().insert(address);
        self.dirty.lock().insert(Channel::Pending);
        Ok(())
    }

    /// Records a confirmed trim (compaction promoting a pending trim).
    pub fn record_trimmed(&self, address: u64) -> Result<()> {
        let framed = encode_trim_entry(address)?;
        append_sidecar(&self.trimmed_file, &framed)?;
        self.trimmed_addresses.write().insert(address);
        self.dirty.lock().insert(Channel::Trimmed);
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.lock().is_empty()
    }

    /// Fsyncs every channel written since the last call, then clears the dirty set.
    pub fn sync(&self) -> Result<()> {
        let channels: Vec<Channel> = self.dirty.lock().drain().collect();
        for channel in channels {
            match channel {
                Channel::Data => self.data_file.sync_all()?,
                Channel::Trimmed => self.trimmed_file.sync_all()?,
                Channel::Pending => self.pending_file.sync_all()?,
            }
        }
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        self.sync()?;
        self.data_file.sync_all()?;
        self.trimmed_file.sync_all()?;
        self.pending_file.sync_all()?;
        Ok(())
    }
}

/// Length-delimited `TrimEntry` framing for the `.trimmed`/`.pending` sidecars
/// (spec.md §6: "written with a length prefix").
pub(crate) fn length_delimit(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

pub(crate) fn encode_trim_entry(address: u64) -> Result<Vec<u8>> {
    let trim = crate::entry::TrimEntry::new(address);
    let payload = bincode::serialize(&trim).map_err(|e| LogStoreError::Codec(e.to_string()))?;
    Ok(length_delimit(&payload))
}

fn append_sidecar(file: &File, framed: &[u8]) -> Result<()> {
    use std::io::Write;
    let mut writer = file;
    writer.write_all(framed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.log");
        let seg = SegmentHandle::open(path, false).unwrap();
        let entry = LogData::data(0, &b"hi"[..]);
        seg.append(&entry).unwrap();
        seg.sync().unwrap();
        assert_eq!(seg.read(0).unwrap(), Some(entry));
    }

    #[test]
    fn overwrite_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.log");
        let seg = SegmentHandle::open(path, false).unwrap();
        seg.append(&LogData::data(5, &b"a"[..])).unwrap();
        let err = seg.append(&LogData::data(5, &b"b"[..])).unwrap_err();
        assert!(matches!(err, LogStoreError::Overwrite(5)));
    }

    #[test]
    fn trim_then_read_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.log");
        let seg = SegmentHandle::open(path, false).unwrap();
        seg.append(&LogData::data(5, &b"a"[..])).unwrap();
        seg.record_pending_trim(5).unwrap();
        let err = seg.read(5).unwrap_err();
        assert!(matches!(err, LogStoreError::Trimmed(5)));
    }

    #[test]
    fn reopen_recovers_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.log");
        {
            let seg = SegmentHandle::open(path.clone(), false).unwrap();
            seg.append(&LogData::data(0, &b"a"[..])).unwrap();
            seg.append(&LogData::data(1, &b"bb"[..])).unwrap();
            seg.sync().unwrap();
        }
        let seg = SegmentHandle::open(path, false).unwrap();
        assert!(seg.is_known(0));
        assert!(seg.is_known(1));
        assert_eq!(seg.read(0).unwrap().unwrap().data.as_ref(), b"a");
    }
}
