//! File migration after a ring change
//!
//! A move is read from the old owner, write to the new owner, then delete
//! from the old owner. It is not transactional: the delete only happens
//! after a successful write, so a failure leaves at worst a stale copy
//! that routing no longer points at.

use super::Snapshot;
use crate::client::StorageClient;
use crate::error::StoreResult;
use crate::key::ContentKey;
use std::fmt;

/// Per-call tally of what a migration did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStats {
    /// Inventory entries examined
    pub scanned: u32,
    /// Files now stored on their new owner
    pub moved: u32,
    /// Moved, but the old copy could not be deleted
    pub stale_copies: u32,
    /// Already on the right node
    pub in_place: u32,
    /// Not a valid key, or no node left to own it
    pub skipped: u32,
    /// Read or write failed; the file stays where it was
    pub failed: u32,
}

impl MigrationStats {
    pub fn merge(&mut self, other: MigrationStats) {
        self.scanned += other.scanned;
        self.moved += other.moved;
        self.stale_copies += other.stale_copies;
        self.in_place += other.in_place;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl fmt::Display for MigrationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned={} moved={} stale_copies={} in_place={} skipped={} failed={}",
            self.scanned, self.moved, self.stale_copies, self.in_place, self.skipped, self.failed
        )
    }
}

/// Whether the old copy went away after a successful move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    MovedLeavingCopy,
}

/// Copy one file to its new owner, then drop it from the old one
pub fn move_file(
    key: &ContentKey,
    from: &StorageClient,
    to: &StorageClient,
) -> StoreResult<MoveOutcome> {
    let data = from.read_file(key)?;
    let len = data.len();
    to.write_file(key, data)?;

    match from.delete_file(key) {
        Ok(()) => {
            log::debug!("Moved {} ({} bytes) {} -> {}", key, len, from.endpoint(), to.endpoint());
            Ok(MoveOutcome::Moved)
        }
        Err(e) => {
            log::warn!(
                "Moved {} to {} but could not delete it from {}: {}",
                key,
                to.endpoint(),
                from.endpoint(),
                e
            );
            Ok(MoveOutcome::MovedLeavingCopy)
        }
    }
}

/// Move every file in `files` (an inventory of `source`) whose owner under
/// the snapshot ring is some other node.
///
/// Per-file failures are logged and skipped.
pub(crate) fn migrate_inventory(
    source: &StorageClient,
    files: &[String],
    snapshot: &Snapshot,
) -> MigrationStats {
    let mut stats = MigrationStats::default();

    for path in files {
        stats.scanned += 1;

        let key = match ContentKey::parse(path) {
            Ok(key) => key,
            Err(e) => {
                log::warn!("Skipping {:?} on {}: {}", path, source.endpoint(), e);
                stats.skipped += 1;
                continue;
            }
        };

        let target = match snapshot.ring.owner(&key) {
            Some(target) => target,
            None => {
                log::warn!("No node left to own {}; it stays on {}", key, source.endpoint());
                stats.skipped += 1;
                continue;
            }
        };
        if target == source.endpoint() {
            stats.in_place += 1;
            continue;
        }

        let Some(target_client) = snapshot.clients.get(target) else {
            log::warn!("Owner {} of {} has no connection", target, key);
            stats.failed += 1;
            continue;
        };

        match move_file(&key, source, target_client) {
            Ok(outcome) => {
                stats.moved += 1;
                if outcome == MoveOutcome::MovedLeavingCopy {
                    stats.stale_copies += 1;
                }
            }
            Err(e) => {
                log::warn!(
                    "Failed to move {} from {} to {}: {}",
                    key,
                    source.endpoint(),
                    target,
                    e
                );
                stats.failed += 1;
            }
        }
    }

    stats
}
