//! Records: an entry plus the header that commits it to the ledger.

use super::{compute_entry_hash, Entry, EntryType};
use crate::types::{EntryHash, Hash, RecordHash};
use serde::{Deserialize, Serialize};

const RECORD_DOMAIN: &[u8] = b"acp:record:v1";

/// Commit metadata for an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordHeader {
    /// Store-wide monotonic sequence number
    pub seq: u64,
    /// Identity hash of the committing caller
    #[serde(with = "crate::types::hex_hash")]
    pub author: Hash,
    pub timestamp_micros: i64,
    pub entry_type: EntryType,
    #[serde(with = "crate::types::hex_hash")]
    pub entry_hash: EntryHash,
}

impl RecordHeader {
    /// Hash of the header; this is the record's identity
    pub fn hash(&self) -> RecordHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(RECORD_DOMAIN);
        hasher.update(&self.seq.to_le_bytes());
        hasher.update(&self.author);
        hasher.update(&self.timestamp_micros.to_le_bytes());
        hasher.update(self.entry_type.as_str().as_bytes());
        hasher.update(&self.entry_hash);
        *hasher.finalize().as_bytes()
    }
}

/// Entry as persisted in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub header: RecordHeader,
    pub entry: Entry,
}

impl Record {
    /// Build a record for `entry`, computing its entry hash
    pub fn new(seq: u64, author: Hash, timestamp_micros: i64, entry: Entry) -> Self {
        let header = RecordHeader {
            seq,
            author,
            timestamp_micros,
            entry_type: entry.entry_type(),
            entry_hash: compute_entry_hash(&entry),
        };
        Self { header, entry }
    }

    pub fn hash(&self) -> RecordHash {
        self.header.hash()
    }
}
