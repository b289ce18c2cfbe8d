//! Consistent-hash ring
//!
//! Node endpoints and key strings are hashed the same way: SHA-256,
//! first 8 bytes read as a big-endian u64. One point per node, no
//! virtual replicas. A key belongs to the first node clockwise from it.

use crate::key::ContentKey;
use sha2::{Digest, Sha256};
use std::fmt;

/// Position of a string on the ring
pub fn hash_key(s: &str) -> u64 {
    let digest = Sha256::digest(s.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// One node's point on the ring
#[derive(Clone, PartialEq, Eq)]
pub struct RingEntry {
    pub hash: u64,
    pub endpoint: String,
}

impl RingEntry {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            hash: hash_key(&endpoint),
            endpoint,
        }
    }
}

impl fmt::Debug for RingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.endpoint, hex::encode(self.hash.to_be_bytes()))
    }
}

/// Immutable, ascending-sorted ring. Membership changes build a new one.
#[derive(Debug, Clone, Default)]
pub struct HashRing {
    entries: Vec<RingEntry>,
}

impl HashRing {
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_entries(endpoints.into_iter().map(RingEntry::new).collect())
    }

    /// Build from explicit entries; duplicate endpoints keep one point
    pub fn from_entries(mut entries: Vec<RingEntry>) -> Self {
        entries.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        entries.dedup_by(|a, b| a.endpoint == b.endpoint);
        // ties on hash fall back to endpoint order so lookups stay deterministic
        entries.sort_by(|a, b| (a.hash, &a.endpoint).cmp(&(b.hash, &b.endpoint)));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RingEntry] {
        &self.entries
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.entries.iter().any(|e| e.endpoint == endpoint)
    }

    /// Endpoint owning the key, `None` on an empty ring
    pub fn owner(&self, key: &ContentKey) -> Option<&str> {
        self.owner_of_hash(hash_key(&key.to_string()))
    }

    /// First entry with hash >= `hash`, wrapping to the smallest
    pub fn owner_of_hash(&self, hash: u64) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = self.entries.partition_point(|e| e.hash < hash);
        let idx = if idx == self.entries.len() { 0 } else { idx };
        Some(&self.entries[idx].endpoint)
    }
}
