//! sled-backed entry store.

use super::EntryStore;
use crate::entry::Record;
use crate::error::StorageError;
use crate::types::RecordHash;
use tracing::debug;

const RECORDS_TREE: &str = "records";

/// Entry store persisted in a sled tree, keyed by record hash
#[derive(Clone)]
pub struct SledEntryStore {
    db: sled::Db,
    records: sled::Tree,
}

impl SledEntryStore {
    /// Open the store inside an existing database
    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            db: db.clone(),
            records: db.open_tree(RECORDS_TREE)?,
        })
    }

    /// Iterate every stored record, in key order
    pub fn records(&self) -> impl Iterator<Item = Result<Record, StorageError>> + '_ {
        self.records.iter().values().map(|value| {
            let bytes = value?;
            Ok(serde_json::from_slice(&bytes)?)
        })
    }
}

impl EntryStore for SledEntryStore {
    fn get(&self, hash: &RecordHash) -> Result<Option<Record>, StorageError> {
        match self.records.get(hash)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, record: &Record) -> Result<RecordHash, StorageError> {
        let hash = record.hash();
        let bytes = serde_json::to_vec(record)?;
        // Set if absent: content addressing makes an existing value identical
        match self
            .records
            .compare_and_swap(hash, None as Option<&[u8]>, Some(bytes))?
        {
            Ok(()) => {
                debug!(record = %hex::encode(hash), seq = record.header.seq, "Stored record");
            }
            Err(_) => {
                debug!(record = %hex::encode(hash), "Record already present");
            }
        }
        Ok(hash)
    }

    fn contains(&self, hash: &RecordHash) -> Result<bool, StorageError> {
        Ok(self.records.contains_key(hash)?)
    }

    fn next_seq(&self) -> Result<u64, StorageError> {
        Ok(self.db.generate_id()?)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
