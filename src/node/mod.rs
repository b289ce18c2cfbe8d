//! Storage node daemon
//!
//! Owns one local file tree and exposes it over the storage protocol.

pub mod service;
pub mod store;

pub use service::StorageService;
pub use store::NodeStore;

use crate::server::RpcServer;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Storage node configuration
#[derive(Debug, Clone)]
pub struct NodeServerConfig {
    pub bind_addr: String,
    pub storage_root: PathBuf,
}

impl Default for NodeServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "localhost:8090".to_string(),
            storage_root: PathBuf::from("/var/lib/vidstore/node"),
        }
    }
}

/// A bound storage node, ready to serve
pub struct NodeServer {
    server: RpcServer<StorageService>,
}

impl NodeServer {
    /// Open the storage root and bind the listening socket
    pub fn bind(config: &NodeServerConfig) -> io::Result<Self> {
        let store = NodeStore::new(&config.storage_root)?;
        log::info!("Storage root: {}", store.root().display());

        let service = Arc::new(StorageService::new(store));
        let server = RpcServer::bind("storage node", config.bind_addr.as_str(), service)?;
        Ok(Self { server })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.server.local_addr()
    }

    /// Serve on the current thread
    pub fn run(&self) -> io::Result<()> {
        self.server.run()
    }

    /// Serve on a background thread
    pub fn spawn(self) -> io::Result<(SocketAddr, JoinHandle<()>)> {
        self.server.spawn()
    }
}
