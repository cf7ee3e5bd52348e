//! The data model carried in every framed record (spec.md §3).
//!
//! Fixed-size framing types (`Metadata`, `LogHeader`) live in [`crate::codec`] as
//! `zerocopy` structs; the variable-length payload types here are
//! `serde`+`bincode`-encoded, the way `examples/other_examples`'s WAL-shaped stores
//! (e.g. the `ray-rs` replication log and the `fjall-rs` value-log manifest) encode
//! their variable records.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminates the kind of payload carried by a [`LogData`] record.
///
/// `RankOnly` and `Hole` are the two sentinel kinds a client may write instead of a
/// real payload: a bare Paxos ballot record, and a hole-fill that permanently seals
/// an address no data will ever occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Data,
    Empty,
    Hole,
    RankOnly,
}

/// One log entry: a caller-assigned global address, an opaque payload, and the
/// bookkeeping a shared-log client needs to reconstruct stream order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogData {
    pub global_address: u64,
    pub data_type: DataType,
    pub data: Bytes,
    pub rank: u64,
    pub commit: bool,
    pub streams: Vec<Uuid>,
    pub logical_addresses: HashMap<Uuid, u64>,
    pub backpointers: HashMap<Uuid, u64>,
}

impl LogData {
    pub fn data(global_address: u64, data: impl Into<Bytes>) -> Self {
        Self {
            global_address,
            data_type: DataType::Data,
            data: data.into(),
            rank: 0,
            commit: true,
            streams: Vec::new(),
            logical_addresses: HashMap::new(),
            backpointers: HashMap::new(),
        }
    }

    /// A hole-fill record: seals `global_address` without ever carrying real data.
    pub fn hole(global_address: u64) -> Self {
        Self {
            global_address,
            data_type: DataType::Hole,
            data: Bytes::new(),
            rank: 0,
            commit: true,
            streams: Vec::new(),
            logical_addresses: HashMap::new(),
            backpointers: HashMap::new(),
        }
    }
}

/// Written once at segment creation, verified on every open (spec.md §3/§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogHeader {
    pub version: u32,
    pub verify_checksum: bool,
}

/// A recorded trim intent or confirmation, appended to a segment's `.pending` or
/// `.trimmed` sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimEntry {
    pub checksum: i32,
    pub address: u64,
}

impl TrimEntry {
    pub fn new(address: u64) -> Self {
        Self {
            checksum: crate::codec::checksum_address(address),
            address,
        }
    }

    pub fn verify(&self) -> bool {
        crate::codec::checksum_address(self.address) == self.checksum
    }
}

/// In-memory index value: where an already-written entry lives on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressMetaData {
    pub checksum: i32,
    pub length: i32,
    /// Byte offset of the first byte of the entry payload (after the delimiter and
    /// metadata envelope).
    pub offset: u64,
}
