//! Link Index
//!
//! Named, directional associations `(base hash, link type) -> [target hash]`.
//! Links are never removed; each list keeps insertion order and holds a target at
//! most once, so discovery only ever sees a list grow.

use crate::entry::anchor_hash;
use crate::error::StorageError;
use crate::types::Hash;
use serde::{Deserialize, Serialize};
use tracing::debug;

const LINKS_TREE: &str = "links";

/// Anchor path under which every registered agent is linked
pub const ALL_AGENTS_ANCHOR: &str = "all_agents";

/// Hash of the "all agents" anchor
pub fn all_agents_anchor() -> Hash {
    anchor_hash(ALL_AGENTS_ANCHOR)
}

/// Link type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// all-agents anchor -> agent record
    AllAgents,
    /// caller identity -> agent records it registered
    AgentToProfile,
    /// caller identity -> initial revision of each job it created
    AgentToJobs,
}

impl LinkType {
    fn tag(&self) -> u8 {
        match self {
            LinkType::AllAgents => 1,
            LinkType::AgentToProfile => 2,
            LinkType::AgentToJobs => 3,
        }
    }
}

fn link_key(base: &Hash, link_type: LinkType) -> [u8; 33] {
    let mut key = [0u8; 33];
    key[..32].copy_from_slice(base);
    key[32] = link_type.tag();
    key
}

/// Link index persisted in a sled tree
#[derive(Clone)]
pub struct LinkIndex {
    tree: sled::Tree,
}

impl LinkIndex {
    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            tree: db.open_tree(LINKS_TREE)?,
        })
    }

    /// Append `target` to the list at `(base, link_type)`.
    ///
    /// Returns `false` when the target was already linked. The append is a
    /// compare-and-swap loop, so concurrent writers never lose each other's links.
    /// Each append rewrites the whole list, so a busy base such as the all-agents
    /// anchor costs O(n) per link.
    pub fn add_link(
        &self,
        base: &Hash,
        link_type: LinkType,
        target: &Hash,
    ) -> Result<bool, StorageError> {
        let key = link_key(base, link_type);
        loop {
            let current = self.tree.get(key)?;
            let mut targets: Vec<Hash> = match &current {
                Some(bytes) => bincode::deserialize(bytes)?,
                None => Vec::new(),
            };
            if targets.contains(target) {
                return Ok(false);
            }
            targets.push(*target);
            let encoded = bincode::serialize(&targets)?;

            match self.tree.compare_and_swap(key, current, Some(encoded))? {
                Ok(()) => {
                    debug!(
                        base = %hex::encode(base),
                        link_type = ?link_type,
                        target = %hex::encode(target),
                        count = targets.len(),
                        "Added link"
                    );
                    return Ok(true);
                }
                Err(_) => continue,
            }
        }
    }

    /// Targets linked from `(base, link_type)`, in insertion order
    pub fn get_links(&self, base: &Hash, link_type: LinkType) -> Result<Vec<Hash>, StorageError> {
        match self.tree.get(link_key(base, link_type))? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn count_links(&self, base: &Hash, link_type: LinkType) -> Result<usize, StorageError> {
        Ok(self.get_links(base, link_type)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn index() -> LinkIndex {
        let db = sled::Config::new().temporary(true).open().unwrap();
        LinkIndex::from_db(&db).unwrap()
    }

    #[test]
    fn links_keep_insertion_order() {
        let links = index();
        let base = all_agents_anchor();
        for i in [3u8, 1, 2] {
            assert!(links.add_link(&base, LinkType::AllAgents, &[i; 32]).unwrap());
        }
        assert_eq!(
            links.get_links(&base, LinkType::AllAgents).unwrap(),
            vec![[3u8; 32], [1u8; 32], [2u8; 32]]
        );
    }

    #[test]
    fn duplicate_targets_are_ignored() {
        let links = index();
        let base = [9u8; 32];
        assert!(links.add_link(&base, LinkType::AgentToJobs, &[1; 32]).unwrap());
        assert!(!links.add_link(&base, LinkType::AgentToJobs, &[1; 32]).unwrap());
        assert_eq!(links.count_links(&base, LinkType::AgentToJobs).unwrap(), 1);
    }

    #[test]
    fn link_types_are_separate_lists() {
        let links = index();
        let base = [9u8; 32];
        links.add_link(&base, LinkType::AgentToJobs, &[1; 32]).unwrap();
        links.add_link(&base, LinkType::AgentToProfile, &[2; 32]).unwrap();
        assert_eq!(links.get_links(&base, LinkType::AgentToJobs).unwrap(), vec![[1; 32]]);
        assert_eq!(links.get_links(&base, LinkType::AgentToProfile).unwrap(), vec![[2; 32]]);
        assert!(links.get_links(&[0; 32], LinkType::AllAgents).unwrap().is_empty());
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let links = Arc::new(index());
        let base = all_agents_anchor();
        let handles: Vec<_> = (0..8u8)
            .map(|t| {
                let links = Arc::clone(&links);
                thread::spawn(move || {
                    for i in 0..10u8 {
                        let mut target = [0u8; 32];
                        target[0] = t;
                        target[1] = i;
                        links.add_link(&base, LinkType::AllAgents, &target).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(links.count_links(&base, LinkType::AllAgents).unwrap(), 80);
    }
}
