//! Global addresses and the segment-routing function.
//!
//! Generalizes `examples/tursodatabase-libsql/libsql-wal/src/registry.rs`'s namespace-scoped directory layout
//! (`logDir/<namespace>/...`) to the spec's optional per-stream segment family
//! (`logDir/<stream>-<segment>.log`).

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// A caller-assigned 64-bit global address, optionally scoped to a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogAddress {
    pub address: u64,
    pub stream: Option<Uuid>,
}

impl LogAddress {
    pub fn new(address: u64) -> Self {
        Self {
            address,
            stream: None,
        }
    }

    pub fn in_stream(address: u64, stream: Uuid) -> Self {
        Self {
            address,
            stream: Some(stream),
        }
    }

    pub fn segment_number(&self, records_per_log_file: u64) -> u64 {
        self.address / records_per_log_file
    }

    /// Path of the data file backing this address's segment.
    pub fn segment_path(&self, log_dir: &Path, records_per_log_file: u64) -> PathBuf {
        let segment = self.segment_number(records_per_log_file);
        match self.stream {
            Some(stream) => log_dir.join(format!("{stream}-{segment}.log")),
            None => log_dir.join(format!("{segment}.log")),
        }
    }
}

/// Sibling trim files for a segment's data file path.
pub fn trimmed_path(segment_path: &Path) -> PathBuf {
    let mut s = segment_path.as_os_str().to_owned();
    s.push(".trimmed");
    PathBuf::from(s)
}

pub fn pending_path(segment_path: &Path) -> PathBuf {
    let mut s = segment_path.as_os_str().to_owned();
    s.push(".pending");
    PathBuf::from(s)
}

/// Path used for a compacted rewrite before the atomic rename (§4.E step 3/6).
pub fn copy_path(segment_path: &Path) -> PathBuf {
    let mut s = segment_path.as_os_str().to_owned();
    s.push(".copy");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_routing() {
        let dir = Path::new("/tmp/log");
        let a = LogAddress::new(9999);
        let b = LogAddress::new(10_000);
        assert_eq!(a.segment_path(dir, 10_000), dir.join("0.log"));
        assert_eq!(b.segment_path(dir, 10_000), dir.join("1.log"));
    }

    #[test]
    fn stream_scoped_path() {
        let dir = Path::new("/tmp/log");
        let stream = Uuid::nil();
        let a = LogAddress::in_stream(0, stream);
        assert_eq!(
            a.segment_path(dir, 10_000),
            dir.join(format!("{stream}-0.log"))
        );
    }
}
