//! Entry Store
//!
//! Append-only, content-addressed storage of records. A record is written once under
//! its header hash and never modified afterwards.

pub mod persistence;

use crate::entry::Record;
use crate::error::StorageError;
use crate::types::RecordHash;

pub use persistence::SledEntryStore;

/// Entry store interface
pub trait EntryStore: Send + Sync {
    fn get(&self, hash: &RecordHash) -> Result<Option<Record>, StorageError>;

    /// Persist a record under its hash. Writing the same record twice is a no-op.
    fn put(&self, record: &Record) -> Result<RecordHash, StorageError>;

    fn contains(&self, hash: &RecordHash) -> Result<bool, StorageError>;

    /// Next value of the store-wide record sequence
    fn next_seq(&self) -> Result<u64, StorageError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
