//! Recovery (spec.md §4.F): startup header verification across every segment, and
//! on-open replay of a single segment's address index and trim sidecars.
//!
//! Grounded on `examples/tursodatabase-libsql/libsql-wal/src/registry.rs`'s `WalkDir`-based segment enumeration on
//! first open and `examples/tursodatabase-libsql/libsql-wal/src/log.rs`'s header-checksum-then-replay sequence.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::codec::{self, DecodeOutcome};
use crate::config::VERSION;
use crate::entry::{AddressMetaData, LogHeader, TrimEntry};
use crate::error::{LogStoreError, Result};

/// Reads and validates the header of an already-open data file. The header is
/// always fully present (written once at creation), so unlike entry recovery, a
/// malformed or missing header is fatal rather than a clean end-of-segment.
pub fn verify_header(data_file: &mut File, no_verify: bool, path: &Path) -> Result<LogHeader> {
    let mut reader = BufReader::new(data_file.try_clone()?);
    reader.seek(SeekFrom::Start(0))?;
    // The header's own checksum is always checked: it is how we know whether to
    // trust `verify_checksum` at all.
    let header = codec::decode_header(&mut reader, true, path)?;

    if header.version != VERSION {
        return Err(LogStoreError::VersionMismatch {
            path: path.to_path_buf(),
            found: header.version,
            expected: VERSION,
        });
    }
    if header.verify_checksum == no_verify {
        return Err(LogStoreError::NoChecksum {
            path: path.to_path_buf(),
        });
    }
    Ok(header)
}

/// Replays a segment's data file past the header, rebuilding the address index.
/// Returns the index and the write offset recovery should resume appending from —
/// the start of whatever torn tail terminated the scan, if any. The file is
/// truncated to that offset so a crash-torn record can never be observed again.
pub fn read_address_space(
    data_file: &File,
    verify: bool,
    path: &Path,
) -> Result<(HashMap<u64, AddressMetaData>, u64)> {
    let mut reader = BufReader::new(data_file.try_clone()?);
    reader.seek(SeekFrom::Start(0))?;
    codec::decode_header(&mut reader, true, path)?;

    let mut known = HashMap::new();
    loop {
        let offset_before = reader.stream_position()?;
        match codec::decode_entry(&mut reader, offset_before, verify, path)? {
            DecodeOutcome::Entry { entry, meta } => {
                known.insert(entry.global_address, meta);
            }
            DecodeOutcome::EndOfSegment => {
                if offset_before < data_file.metadata()?.len() {
                    data_file.set_len(offset_before)?;
                }
                return Ok((known, offset_before));
            }
        }
    }
}

/// Drains a length-delimited `TrimEntry` stream (the `.trimmed`/`.pending`
/// sidecars) into a set of addresses.
pub fn load_trim_addresses(file: &File) -> Result<HashSet<u64>> {
    let mut reader = BufReader::new(file.try_clone()?);
    reader.seek(SeekFrom::Start(0))?;
    let mut addresses = HashSet::new();
    loop {
        let mut len_buf = [0u8; 4];
        if !try_read_exact(&mut reader, &mut len_buf)? {
            break;
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        if !try_read_exact(&mut reader, &mut payload)? {
            break;
        }
        let Ok(trim) = bincode::deserialize::<TrimEntry>(&payload) else {
            break;
        };
        addresses.insert(trim.address);
    }
    Ok(addresses)
}

fn try_read_exact(reader: &mut impl std::io::Read, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => return Ok(false),
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Store-construction-time verification (spec.md §4.F phase 1): every `*.log`
/// file's header is checked eagerly so a version mismatch or checksum-mode
/// disagreement fails startup instead of surfacing lazily on first access.
pub fn verify_all_headers(log_dir: &Path, no_verify: bool) -> Result<()> {
    if !log_dir.exists() {
        return Ok(());
    }
    for entry in walkdir::WalkDir::new(log_dir)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = entry.map_err(|e| {
            LogStoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;
        let path = entry.path();
        let is_data_file = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(".log"))
            .unwrap_or(false);
        if !is_data_file {
            continue;
        }
        let mut file = File::open(path)?;
        verify_header(&mut file, no_verify, path)?;
    }
    Ok(())
}
