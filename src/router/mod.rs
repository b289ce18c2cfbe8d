//! Content router
//!
//! Holds the live node connections and the hash ring derived from them,
//! and routes each Write/Read to the one node that owns the key.
//!
//! Locking:
//! - `topology` (RwLock) guards the member table and ring. It is held only
//!   to look up or swap in-memory state, never across a network call.
//! - `membership` (Mutex) serializes AddNode/RemoveNode end to end, so two
//!   membership changes never migrate against each other's rings.
//! - Each member's `WriteGate` is held shared by a router Write for the
//!   length of its RPC. A membership change swaps the ring, then waits on
//!   the gate of every node it is about to inventory, so a write routed
//!   under the old ring has landed before the listing is taken.

pub mod admin;
pub mod membership;
pub mod migrate;
pub mod ring;

pub use admin::AdminService;
pub use ring::{hash_key, HashRing, RingEntry};

use crate::client::{ClientOptions, StorageClient};
use crate::error::{StoreError, StoreResult};
use crate::key::ContentKey;
use crate::server::RpcServer;
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Lifecycle of a connected node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// On the ring, receives traffic
    Live,
    /// Off the ring, still connected while its files are moved away
    Draining,
}

/// Lets a membership change wait out writes already routed to a node
#[derive(Default)]
pub(crate) struct WriteGate(RwLock<()>);

impl WriteGate {
    fn enter(&self) -> RwLockReadGuard<'_, ()> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until no write entered before this call is still running
    pub(crate) fn wait_idle(&self) {
        drop(self.0.write().unwrap_or_else(PoisonError::into_inner));
    }
}

struct Member {
    client: Arc<StorageClient>,
    gate: Arc<WriteGate>,
    state: NodeState,
}

impl Member {
    fn live(client: Arc<StorageClient>) -> Self {
        Self {
            client,
            gate: Arc::default(),
            state: NodeState::Live,
        }
    }
}

#[derive(Default)]
struct Topology {
    members: HashMap<String, Member>,
    ring: Arc<HashRing>,
    epoch: u64,
}

impl Topology {
    /// Rebuild the ring from live members and swap it in whole
    fn rebuild_ring(&mut self) {
        let live = self
            .members
            .iter()
            .filter(|(_, m)| m.state == NodeState::Live)
            .map(|(endpoint, _)| endpoint.as_str());
        self.ring = Arc::new(HashRing::new(live));
        self.epoch += 1;
        log::info!(
            "Ring epoch {}: {} node(s) {:?}",
            self.epoch,
            self.ring.len(),
            self.ring.entries()
        );
    }

    fn clients(&self) -> HashMap<String, Arc<StorageClient>> {
        self.members
            .iter()
            .map(|(endpoint, m)| (endpoint.clone(), Arc::clone(&m.client)))
            .collect()
    }

    fn route(&self, key: &ContentKey) -> StoreResult<(Arc<StorageClient>, Arc<WriteGate>)> {
        let endpoint = self
            .ring
            .owner(key)
            .ok_or_else(|| StoreError::Unavailable("no storage nodes available".to_string()))?;
        self.members
            .get(endpoint)
            .map(|m| (Arc::clone(&m.client), Arc::clone(&m.gate)))
            .ok_or_else(|| StoreError::Unavailable(format!("{} has no connection", endpoint)))
    }

    fn gates(&self) -> HashMap<String, Arc<WriteGate>> {
        self.members
            .iter()
            .map(|(endpoint, m)| (endpoint.clone(), Arc::clone(&m.gate)))
            .collect()
    }
}

/// Ring and node connections as seen at one instant
pub(crate) struct Snapshot {
    pub ring: Arc<HashRing>,
    pub clients: HashMap<String, Arc<StorageClient>>,
    pub gates: HashMap<String, Arc<WriteGate>>,
    pub epoch: u64,
}

/// Routes content operations across the storage nodes
pub struct ContentRouter {
    topology: RwLock<Topology>,
    membership: Mutex<()>,
    options: ClientOptions,
}

impl ContentRouter {
    /// Router with no nodes; every Write/Read fails `Unavailable` until one is added
    pub fn new(options: ClientOptions) -> Self {
        Self {
            topology: RwLock::new(Topology::default()),
            membership: Mutex::new(()),
            options,
        }
    }

    /// Connect to the configured nodes and build the initial ring
    pub fn connect<I, S>(nodes: I, options: ClientOptions) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let router = Self::new(options);

        let mut connected: HashMap<String, Arc<StorageClient>> = HashMap::new();
        for endpoint in nodes {
            let endpoint = endpoint.into();
            if connected.contains_key(&endpoint) {
                continue;
            }
            let client = StorageClient::connect(endpoint.as_str(), router.options.clone())?;
            connected.insert(endpoint, Arc::new(client));
        }

        {
            let mut topology = router.write_topology();
            for (endpoint, client) in connected {
                topology.members.insert(endpoint, Member::live(client));
            }
            topology.rebuild_ring();
        }
        Ok(router)
    }

    /// Serve the admin protocol on a background thread
    pub fn start_admin<A: ToSocketAddrs>(self: &Arc<Self>, addr: A) -> io::Result<SocketAddr> {
        let service = Arc::new(AdminService::new(Arc::clone(self)));
        let (local, _) = RpcServer::bind("admin", addr, service)?.spawn()?;
        Ok(local)
    }

    /// Write a blob to the node that owns its key
    pub fn write(&self, key: &ContentKey, data: &[u8]) -> StoreResult<()> {
        let topology = self.read_topology();
        let (client, gate) = topology.route(key)?;
        // entered before the ring can be swapped away from this owner
        let _entered = gate.enter();
        drop(topology);
        log::debug!("Writing {} to {} ({} bytes)", key, client.endpoint(), data.len());
        client.write_file(key, data.to_vec())
    }

    /// Read a blob from the node that owns its key
    pub fn read(&self, key: &ContentKey) -> StoreResult<Vec<u8>> {
        let client = self.pick_node(key)?;
        log::debug!("Reading {} from {}", key, client.endpoint());
        client.read_file(key)
    }

    /// Resolve the owner of a key; the lock is released before any I/O
    pub fn pick_node(&self, key: &ContentKey) -> StoreResult<Arc<StorageClient>> {
        self.read_topology().route(key).map(|(client, _)| client)
    }

    /// Endpoint that currently owns a key
    pub fn owner_of(&self, key: &ContentKey) -> Option<String> {
        self.read_topology().ring.owner(key).map(str::to_string)
    }

    /// Live node endpoints, sorted
    pub fn list_nodes(&self) -> Vec<String> {
        let topology = self.read_topology();
        let mut nodes: Vec<String> = topology
            .members
            .iter()
            .filter(|(_, m)| m.state == NodeState::Live)
            .map(|(endpoint, _)| endpoint.clone())
            .collect();
        nodes.sort();
        nodes
    }

    pub fn node_state(&self, endpoint: &str) -> Option<NodeState> {
        self.read_topology().members.get(endpoint).map(|m| m.state)
    }

    /// Ring generation; bumped on every rebuild
    pub fn epoch(&self) -> u64 {
        self.read_topology().epoch
    }

    /// Current ring, shared
    pub fn ring(&self) -> Arc<HashRing> {
        Arc::clone(&self.read_topology().ring)
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let topology = self.read_topology();
        Snapshot {
            ring: Arc::clone(&topology.ring),
            clients: topology.clients(),
            gates: topology.gates(),
            epoch: topology.epoch,
        }
    }

    fn read_topology(&self) -> RwLockReadGuard<'_, Topology> {
        self.topology.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_topology(&self) -> RwLockWriteGuard<'_, Topology> {
        self.topology.write().unwrap_or_else(PoisonError::into_inner)
    }
}
