//! Revision Heads
//!
//! Provides O(1) access to the latest revision of a job. Revisions themselves live in
//! the entry store; this index only holds the pointer `job_id -> head record hash`,
//! which advances by compare-and-swap and never moves backwards.

use crate::error::StorageError;
use crate::types::RecordHash;
use tracing::debug;

const HEADS_TREE: &str = "heads";

/// Head index: job_id -> RecordHash
#[derive(Clone)]
pub struct RevisionIndex {
    tree: sled::Tree,
}

impl RevisionIndex {
    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            tree: db.open_tree(HEADS_TREE)?,
        })
    }

    pub fn get_head(&self, job_id: &str) -> Result<Option<RecordHash>, StorageError> {
        match self.tree.get(job_id.as_bytes())? {
            Some(bytes) => {
                let head = RecordHash::try_from(&bytes[..]).map_err(|_| {
                    StorageError::Serialization(format!("corrupt head for job {}", job_id))
                })?;
                Ok(Some(head))
            }
            None => Ok(None),
        }
    }

    /// Point a new job at its first revision. Fails if the job id is taken.
    pub fn init_head(&self, job_id: &str, head: &RecordHash) -> Result<(), StorageError> {
        match self
            .tree
            .compare_and_swap(job_id.as_bytes(), None as Option<&[u8]>, Some(&head[..]))?
        {
            Ok(()) => {
                debug!(job_id, head = %hex::encode(head), "Initialized revision head");
                Ok(())
            }
            Err(_) => Err(StorageError::Conflict(format!(
                "job {} already has a revision head",
                job_id
            ))),
        }
    }

    /// Move the head from `expected` to `next`.
    ///
    /// Fails with `Conflict` if another writer advanced the head first.
    pub fn advance_head(
        &self,
        job_id: &str,
        expected: &RecordHash,
        next: &RecordHash,
    ) -> Result<(), StorageError> {
        match self
            .tree
            .compare_and_swap(job_id.as_bytes(), Some(&expected[..]), Some(&next[..]))?
        {
            Ok(()) => {
                debug!(
                    job_id,
                    from = %hex::encode(expected),
                    to = %hex::encode(next),
                    "Advanced revision head"
                );
                Ok(())
            }
            Err(_) => Err(StorageError::Conflict(format!(
                "revision head for job {} moved concurrently",
                job_id
            ))),
        }
    }

    /// Drop a head that still points at `expected`; used to undo a reservation
    pub fn release_head(&self, job_id: &str, expected: &RecordHash) -> Result<bool, StorageError> {
        let released = self
            .tree
            .compare_and_swap(job_id.as_bytes(), Some(&expected[..]), None as Option<&[u8]>)?
            .is_ok();
        if released {
            debug!(job_id, head = %hex::encode(expected), "Released revision head");
        }
        Ok(released)
    }

    pub fn contains(&self, job_id: &str) -> Result<bool, StorageError> {
        Ok(self.tree.contains_key(job_id.as_bytes())?)
    }

    /// Get all job IDs that have heads
    pub fn job_ids(&self) -> Result<Vec<String>, StorageError> {
        self.tree
            .iter()
            .keys()
            .map(|key| {
                let key = key?;
                String::from_utf8(key.to_vec())
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
