//! AddNode / RemoveNode
//!
//! Both run under the membership mutex for their whole duration. The
//! topology lock is only taken for the in-memory steps (insert member,
//! rebuild ring, drop member), so Write/Read keep flowing while files move.
//! During that window a key whose owner just changed may read as NotFound
//! until its file arrives.
//!
//! An inventory is only taken after the new ring is in place and the
//! node's write gate has gone idle, so every acknowledged write is either
//! in the inventory or already on its new owner.

use super::migrate::{migrate_inventory, MigrationStats};
use super::{ContentRouter, Member, NodeState};
use crate::client::StorageClient;
use crate::error::{StoreError, StoreResult};
use std::sync::{Arc, PoisonError};

impl ContentRouter {
    /// Connect a node, put it on the ring and move over the files it now owns.
    ///
    /// Returns the number of files moved. Adding a node that is already live
    /// re-runs the scan against the unchanged ring, which moves any file an
    /// earlier migration left on the wrong node.
    pub fn add_node(&self, endpoint: &str) -> StoreResult<u32> {
        let _membership = self.membership.lock().unwrap_or_else(PoisonError::into_inner);
        log::info!("AddNode {}", endpoint);

        let already_live = self.node_state(endpoint) == Some(NodeState::Live);
        if already_live {
            log::info!("{} is already live; rescanning placement", endpoint);
        } else {
            let client = StorageClient::connect(endpoint, self.options.clone())?;
            let mut topology = self.write_topology();
            topology
                .members
                .insert(endpoint.to_string(), Member::live(Arc::new(client)));
            topology.rebuild_ring();
        }

        let snapshot = self.snapshot();
        let mut total = MigrationStats::default();
        let mut sources: Vec<_> = snapshot.clients.iter().collect();
        sources.sort_by(|a, b| a.0.cmp(b.0));

        for (source, client) in sources {
            if let Some(gate) = snapshot.gates.get(source) {
                gate.wait_idle();
            }
            let files = match client.list_files() {
                Ok(files) => files,
                Err(e) => {
                    log::warn!("Cannot list files on {}; leaving them in place: {}", source, e);
                    continue;
                }
            };
            log::debug!("{} holds {} file(s)", source, files.len());
            total.merge(migrate_inventory(client, &files, &snapshot));
        }

        log::info!("AddNode {} done at epoch {}: {}", endpoint, snapshot.epoch, total);
        Ok(total.moved)
    }

    /// Take a node off the ring, move its files to their new owners and
    /// disconnect it.
    ///
    /// Returns the number of files moved. Files with no remaining owner
    /// (the last node was removed) stay behind and are not counted.
    pub fn remove_node(&self, endpoint: &str) -> StoreResult<u32> {
        let _membership = self.membership.lock().unwrap_or_else(PoisonError::into_inner);
        log::info!("RemoveNode {}", endpoint);

        let (client, gate) = self
            .read_topology()
            .members
            .get(endpoint)
            .map(|m| (Arc::clone(&m.client), Arc::clone(&m.gate)))
            .ok_or_else(|| StoreError::NodeNotFound(endpoint.to_string()))?;

        // the ring must exclude the node before any write or target is routed
        self.set_state(endpoint, NodeState::Draining);
        gate.wait_idle();

        // inventory while still connected; writes now go to the new owners
        let files = match client.list_files() {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Cannot list files on {}; it stays live: {}", endpoint, e);
                self.set_state(endpoint, NodeState::Live);
                return Err(e);
            }
        };
        log::debug!("{} holds {} file(s)", endpoint, files.len());

        let snapshot = self.snapshot();
        let stats = migrate_inventory(&client, &files, &snapshot);

        self.write_topology().members.remove(endpoint);
        client.close();

        log::info!("RemoveNode {} done at epoch {}: {}", endpoint, snapshot.epoch, stats);
        Ok(stats.moved)
    }

    fn set_state(&self, endpoint: &str, state: NodeState) {
        let mut topology = self.write_topology();
        if let Some(member) = topology.members.get_mut(endpoint) {
            member.state = state;
        }
        topology.rebuild_ring();
    }
}
