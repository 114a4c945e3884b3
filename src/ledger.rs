//! Ledger
//!
//! Local replica of the agent ledger: entry store, link index and revision heads over
//! one sled database. Every write goes through validation first; nothing is persisted
//! for a rejected entry.

use crate::entry::{Entry, JobEntry, Record};
use crate::error::{ApiError, StorageError};
use crate::heads::RevisionIndex;
use crate::links::{LinkIndex, LinkType};
use crate::store::{EntryStore, SledEntryStore};
use crate::types::{Hash, RecordHash};
use crate::validation::{validate_entry, validate_link, validate_record, validate_revision};
use std::path::Path;
use tracing::{debug, info};

pub struct Ledger {
    db: sled::Db,
    store: SledEntryStore,
    links: LinkIndex,
    heads: RevisionIndex,
}

impl Ledger {
    /// Open (or create) a ledger at `path`
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = sled::open(path).map_err(|e| match e {
            sled::Error::Io(io) => StorageError::InvalidPath(format!("{}: {}", path.display(), io)),
            other => StorageError::Sled(other),
        })?;
        info!(path = %path.display(), "Opened ledger");
        Self::from_db(db)
    }

    /// In-memory ledger, discarded on drop
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            store: SledEntryStore::from_db(&db)?,
            links: LinkIndex::from_db(&db)?,
            heads: RevisionIndex::from_db(&db)?,
            db,
        })
    }

    pub fn store(&self) -> &SledEntryStore {
        &self.store
    }

    pub fn links(&self) -> &LinkIndex {
        &self.links
    }

    pub fn heads(&self) -> &RevisionIndex {
        &self.heads
    }

    pub fn get_record(&self, hash: &RecordHash) -> Result<Option<Record>, ApiError> {
        Ok(self.store.get(hash)?)
    }

    /// Load a record or fail with `NotFound`
    pub fn require_record(&self, hash: &RecordHash) -> Result<Record, ApiError> {
        self.get_record(hash)?
            .ok_or_else(|| ApiError::NotFound(format!("record {}", hex::encode(hash))))
    }

    /// Validate an entry authored by `author` and wrap it in a record, without writing
    fn prepare(&self, author: &Hash, entry: Entry) -> Result<Record, ApiError> {
        validate_entry(&entry).into_result()?;

        let seq = self.store.next_seq()?;
        let record = Record::new(seq, *author, chrono::Utc::now().timestamp_micros(), entry);
        validate_record(&record).into_result()?;
        Ok(record)
    }

    fn persist(&self, record: &Record) -> Result<RecordHash, ApiError> {
        let hash = self.store.put(record)?;
        debug!(
            record = %hex::encode(hash),
            entry_type = record.header.entry_type.as_str(),
            seq = record.header.seq,
            "Committed record"
        );
        Ok(hash)
    }

    /// Validate and persist an entry authored by `author`
    fn commit(&self, author: &Hash, entry: Entry) -> Result<(RecordHash, Record), ApiError> {
        let record = self.prepare(author, entry)?;
        let hash = self.persist(&record)?;
        Ok((hash, record))
    }

    /// Commit an agent (or any non-job) entry
    pub fn commit_entry(&self, author: &Hash, entry: Entry) -> Result<RecordHash, ApiError> {
        if let Entry::Job(_) = entry {
            return Err(ApiError::ValidationError(
                "job entries must be committed through create_job or append_revision".to_string(),
            ));
        }
        Ok(self.commit(author, entry)?.0)
    }

    /// Commit the initial revision of a job and point its head at it.
    ///
    /// The head is reserved before the record is written, so a creator that loses a
    /// race on the same `jobId` leaves nothing behind.
    pub fn create_job(&self, author: &Hash, job: JobEntry) -> Result<RecordHash, ApiError> {
        if !job.is_initial_revision() {
            return Err(ApiError::ValidationError(
                "new jobs cannot reference a previous revision".to_string(),
            ));
        }
        let job_id = job.job_id.clone();
        let duplicate = || ApiError::ValidationError(format!("jobId '{}' already exists", job_id));
        if self.heads.contains(&job_id)? {
            return Err(duplicate());
        }

        let record = self.prepare(author, Entry::Job(job))?;
        let hash = record.hash();
        self.heads.init_head(&job_id, &hash).map_err(|e| match e {
            StorageError::Conflict(_) => duplicate(),
            other => ApiError::from(other),
        })?;

        match self.persist(&record) {
            Ok(hash) => Ok(hash),
            Err(e) => {
                self.heads.release_head(&job_id, &hash)?;
                Err(e)
            }
        }
    }

    /// Current head of a job: its record hash and entry
    pub fn job_head(&self, job_id: &str) -> Result<(RecordHash, JobEntry), ApiError> {
        let head = self
            .heads
            .get_head(job_id)?
            .ok_or_else(|| ApiError::NotFound(format!("job {}", job_id)))?;
        let record = self.require_record(&head)?;
        match record.entry {
            Entry::Job(job) => Ok((head, job)),
            Entry::Agent(_) => Err(ApiError::StorageError(StorageError::Serialization(format!(
                "head of job {} is not a job record",
                job_id
            )))),
        }
    }

    /// Append a revision on top of the current head.
    ///
    /// The revision must name the current head as its predecessor. If another writer
    /// advances the head between validation and the pointer swap, the loser fails with
    /// `InvalidTransition` against the phase it now observes; the orphaned record stays
    /// in the store, unreachable from the head.
    pub fn append_revision(&self, author: &Hash, next: JobEntry) -> Result<RecordHash, ApiError> {
        let (head_hash, head) = self.job_head(&next.job_id)?;
        let to = next.phase;
        if next.previous_revision != Some(head_hash) {
            return Err(ApiError::InvalidTransition {
                job_id: next.job_id,
                from: head.phase,
                to,
            });
        }
        validate_revision(&head, &head_hash, &next).into_result()?;

        let job_id = next.job_id.clone();
        let (hash, _) = self.commit(author, Entry::Job(next))?;
        match self.heads.advance_head(&job_id, &head_hash, &hash) {
            Ok(()) => Ok(hash),
            Err(StorageError::Conflict(_)) => {
                let (_, observed) = self.job_head(&job_id)?;
                Err(ApiError::InvalidTransition {
                    job_id,
                    from: observed.phase,
                    to,
                })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Every revision of a job, oldest first
    pub fn job_history(&self, job_id: &str) -> Result<Vec<JobEntry>, ApiError> {
        let (_, head) = self.job_head(job_id)?;
        let mut revisions = vec![head];
        while let Some(cursor) = revisions.last().and_then(|job| job.previous_revision) {
            let record = self.require_record(&cursor)?;
            match record.entry {
                Entry::Job(job) => revisions.push(job),
                Entry::Agent(_) => {
                    return Err(ApiError::NotFound(format!(
                        "revision {} of job {}",
                        hex::encode(cursor),
                        job_id
                    )))
                }
            }
        }
        revisions.reverse();
        Ok(revisions)
    }

    /// Link `target` from `base` after checking the target's type fits the link
    pub fn link(
        &self,
        base: &Hash,
        link_type: LinkType,
        target: &RecordHash,
    ) -> Result<bool, ApiError> {
        let record = self.require_record(target)?;
        validate_link(link_type, &record).into_result()?;
        Ok(self.links.add_link(base, link_type, target)?)
    }

    pub fn get_links(&self, base: &Hash, link_type: LinkType) -> Result<Vec<Hash>, ApiError> {
        Ok(self.links.get_links(base, link_type)?)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}
