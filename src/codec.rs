//! Record framing (spec.md §4.A): a two-byte delimiter, a fixed-size metadata
//! envelope, and a `bincode`-encoded payload.
//!
//! ```text
//! [u16 DELIMITER = 0x4C45] [Metadata envelope] [LogEntry bytes]
//! ```
//!
//! The envelope is the only part of the frame that is fixed-size; it is encoded
//! with `zerocopy` the way `examples/tursodatabase-libsql/libsql-wal/src/segment/mod.rs` encodes `SegmentHeader`.
//! The entry/header bodies are variable-length and go through `serde`+`bincode`.

use std::io::Read;
use std::mem::size_of;
use std::path::Path;

use zerocopy::byteorder::big_endian::I32;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::entry::{AddressMetaData, LogData, LogHeader};
use crate::error::{LogStoreError, Result};

/// Marks the start of a framed [`LogData`] record. Absence (a zero or garbage
/// value) signals a truncated tail, not corruption — see [`decode_entry`].
pub const DELIMITER: u16 = 0x4C45;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, FromZeroes, AsBytes)]
pub struct Metadata {
    checksum: I32,
    length: I32,
}

pub const METADATA_SIZE: usize = size_of::<Metadata>();

impl Metadata {
    fn new(checksum: i32, length: i32) -> Self {
        Self {
            checksum: checksum.into(),
            length: length.into(),
        }
    }

    pub fn checksum(&self) -> i32 {
        self.checksum.get()
    }

    pub fn length(&self) -> i32 {
        self.length.get()
    }
}

/// CRC-32C over a payload, as a signed 32-bit value.
pub fn checksum_bytes(bytes: &[u8]) -> i32 {
    crc32c::crc32c(bytes) as i32
}

/// CRC-32C over the 8 big-endian bytes of an address, used for [`crate::entry::TrimEntry`].
pub fn checksum_address(address: u64) -> i32 {
    crc32c::crc32c(&address.to_be_bytes()) as i32
}

fn to_codec_err(e: bincode::Error) -> LogStoreError {
    LogStoreError::Codec(e.to_string())
}

/// The framed bytes for one entry, plus the fields an `AddressMetaData` needs —
/// callers that already frame the entry to write it should not re-serialize it to
/// learn its checksum/length.
pub struct EncodedEntry {
    pub framed: Vec<u8>,
    pub checksum: i32,
    pub length: i32,
}

/// Serialize `entry`, compute its checksum, and frame it with the delimiter and
/// metadata envelope.
pub fn encode_entry(entry: &LogData) -> Result<EncodedEntry> {
    let payload = bincode::serialize(entry).map_err(to_codec_err)?;
    let checksum = checksum_bytes(&payload);
    let length = payload.len() as i32;
    let mut framed = Vec::with_capacity(2 + METADATA_SIZE + payload.len());
    framed.extend_from_slice(&DELIMITER.to_be_bytes());
    push_framed(&mut framed, &payload);
    Ok(EncodedEntry {
        framed,
        checksum,
        length,
    })
}

/// Serialize `header` with the metadata envelope, but no delimiter — the header is
/// always the first record in a segment.
pub fn encode_header(header: &LogHeader) -> Result<Vec<u8>> {
    let payload = bincode::serialize(header).map_err(to_codec_err)?;
    let mut out = Vec::with_capacity(METADATA_SIZE + payload.len());
    push_framed(&mut out, &payload);
    Ok(out)
}

fn push_framed(out: &mut Vec<u8>, payload: &[u8]) {
    let metadata = Metadata::new(checksum_bytes(payload), payload.len() as i32);
    out.extend_from_slice(metadata.as_bytes());
    out.extend_from_slice(payload);
}

/// Reads `buf.len()` bytes, treating any EOF (immediate or mid-read) as a clean
/// truncation rather than an error — a crash can leave a delimiter, an envelope, or
/// a payload partially written, and all three are "torn tail", not corruption
/// (spec.md §8 invariant 6).
fn try_read_exact(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<bool> {
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

pub enum DecodeOutcome {
    Entry { entry: LogData, meta: AddressMetaData },
    EndOfSegment,
}

/// Decode one framed entry starting at `offset_before` in `reader`. Returns
/// [`DecodeOutcome::EndOfSegment`] on a missing/garbage delimiter or any torn
/// framing stage; returns [`LogStoreError::DataCorruption`] only once a complete
/// frame was read and its checksum or payload failed to validate.
pub fn decode_entry(
    reader: &mut impl Read,
    offset_before: u64,
    verify: bool,
    path: &Path,
) -> Result<DecodeOutcome> {
    let mut delim_buf = [0u8; 2];
    if !try_read_exact(reader, &mut delim_buf)? {
        return Ok(DecodeOutcome::EndOfSegment);
    }
    if u16::from_be_bytes(delim_buf) != DELIMITER {
        return Ok(DecodeOutcome::EndOfSegment);
    }

    let mut meta_buf = [0u8; METADATA_SIZE];
    if !try_read_exact(reader, &mut meta_buf)? {
        return Ok(DecodeOutcome::EndOfSegment);
    }
    let metadata =
        Metadata::read_from(&meta_buf[..]).expect("metadata buffer is exactly METADATA_SIZE");

    let length = metadata.length().max(0) as usize;
    let mut payload = vec![0u8; length];
    if !try_read_exact(reader, &mut payload)? {
        return Ok(DecodeOutcome::EndOfSegment);
    }

    if verify {
        let computed = checksum_bytes(&payload);
        if computed != metadata.checksum() {
            return Err(LogStoreError::corruption(
                path,
                format!(
                    "checksum mismatch at offset {offset_before}: expected {}, got {computed}",
                    metadata.checksum()
                ),
            ));
        }
    }

    let entry: LogData = bincode::deserialize(&payload)
        .map_err(|e| LogStoreError::corruption(path, format!("malformed entry: {e}")))?;

    let offset = offset_before + 2 + METADATA_SIZE as u64;
    let meta = AddressMetaData {
        checksum: metadata.checksum(),
        length: metadata.length(),
        offset,
    };
    Ok(DecodeOutcome::Entry { entry, meta })
}

/// Decode the header record. Unlike entries, a segment's header is written exactly
/// once and must always be fully present; any truncation here is a hard I/O error,
/// not a recovery-time end-of-segment signal.
pub fn decode_header(reader: &mut impl Read, verify: bool, path: &Path) -> Result<LogHeader> {
    let mut meta_buf = [0u8; METADATA_SIZE];
    reader.read_exact(&mut meta_buf)?;
    let metadata =
        Metadata::read_from(&meta_buf[..]).expect("metadata buffer is exactly METADATA_SIZE");

    let mut payload = vec![0u8; metadata.length().max(0) as usize];
    reader.read_exact(&mut payload)?;

    if verify {
        let computed = checksum_bytes(&payload);
        if computed != metadata.checksum() {
            return Err(LogStoreError::corruption(path, "header checksum mismatch"));
        }
    }

    bincode::deserialize(&payload)
        .map_err(|e| LogStoreError::corruption(path, format!("malformed header: {e}")))
}

/// Decode an entry payload already read by offset/length from the in-memory index.
/// The checksum was validated once, either at append or at recovery; re-reading an
/// indexed, immutable byte range does not re-verify it.
pub fn decode_payload(bytes: &[u8], path: &Path) -> Result<LogData> {
    bincode::deserialize(bytes)
        .map_err(|e| LogStoreError::corruption(path, format!("malformed entry: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trip_entry() {
        let entry = LogData::data(42, &b"hello"[..]);
        let framed = encode_entry(&entry).unwrap().framed;
        let mut cursor = Cursor::new(&framed[..]);
        match decode_entry(&mut cursor, 0, true, Path::new("test")).unwrap() {
            DecodeOutcome::Entry { entry: decoded, meta } => {
                assert_eq!(decoded, entry);
                assert_eq!(meta.offset, 2 + METADATA_SIZE as u64);
            }
            DecodeOutcome::EndOfSegment => panic!("expected entry"),
        }
    }

    #[test]
    fn flipped_byte_is_corruption() {
        let entry = LogData::data(1, &b"payload"[..]);
        let mut framed = encode_entry(&entry).unwrap().framed;
        let last = framed.len() - 1;
        framed[last] ^= 0xFF;
        let mut cursor = Cursor::new(&framed[..]);
        let err = decode_entry(&mut cursor, 0, true, Path::new("test")).unwrap_err();
        assert!(matches!(err, LogStoreError::DataCorruption { .. }));
    }

    #[test]
    fn no_verify_ignores_flipped_byte() {
        let entry = LogData::data(1, &b"payload"[..]);
        let mut framed = encode_entry(&entry).unwrap().framed;
        let last = framed.len() - 1;
        framed[last] ^= 0xFF;
        let mut cursor = Cursor::new(&framed[..]);
        let outcome = decode_entry(&mut cursor, 0, false, Path::new("test")).unwrap();
        assert!(matches!(outcome, DecodeOutcome::Entry { .. }));
    }

    #[test]
    fn truncated_tail_is_end_of_segment() {
        let entry = LogData::data(1, &b"payload"[..]);
        let framed = encode_entry(&entry).unwrap().framed;
        let torn = &framed[..framed.len() - 3];
        let mut cursor = Cursor::new(torn);
        let outcome = decode_entry(&mut cursor, 0, true, Path::new("test")).unwrap();
        assert!(matches!(outcome, DecodeOutcome::EndOfSegment));
    }

    #[test]
    fn zero_tail_is_end_of_segment() {
        let zeros = vec![0u8; 64];
        let mut cursor = Cursor::new(&zeros[..]);
        let outcome = decode_entry(&mut cursor, 0, true, Path::new("test")).unwrap();
        assert!(matches!(outcome, DecodeOutcome::EndOfSegment));
    }

    #[test]
    fn trim_entry_checksum_round_trips() {
        let t = crate::entry::TrimEntry::new(4096);
        assert!(t.verify());
    }
}
