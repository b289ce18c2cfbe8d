//! Clients for the storage and admin protocols

pub mod admin;
pub mod connection;
pub mod rpc;
pub mod storage;

pub use admin::AdminClient;
pub use connection::Connection;
pub use rpc::RpcClient;
pub use storage::StorageClient;

use std::time::Duration;

/// Socket settings applied to every dialled connection
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    /// Per-call read/write deadline; `None` waits forever
    pub io_timeout: Option<Duration>,
    /// Idle connections kept per endpoint
    pub max_idle: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            io_timeout: Some(Duration::from_secs(30)),
            max_idle: 4,
        }
    }
}
