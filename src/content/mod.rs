//! Write/Read façade for the front-end
//!
//! The front-end stores and fetches blobs through `ContentStore` only. The
//! backend behind it is picked once from configuration: a single local
//! directory, or the consistent-hash router over storage nodes.

use crate::client::ClientOptions;
use crate::config::{BackendType, ContentConfig, ConfigError};
use crate::error::{StoreError, StoreResult};
use crate::key::ContentKey;
use crate::node::NodeStore;
use crate::router::ContentRouter;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

/// Blob storage capability handed to the front-end
pub trait ContentStore: Send + Sync {
    fn write(&self, group_id: &str, filename: &str, data: &[u8]) -> StoreResult<()>;

    fn read(&self, group_id: &str, filename: &str) -> StoreResult<Vec<u8>>;
}

impl ContentStore for NodeStore {
    fn write(&self, group_id: &str, filename: &str, data: &[u8]) -> StoreResult<()> {
        NodeStore::write(self, &ContentKey::new(group_id, filename)?, data)
    }

    fn read(&self, group_id: &str, filename: &str) -> StoreResult<Vec<u8>> {
        NodeStore::read(self, &ContentKey::new(group_id, filename)?)
    }
}

impl ContentStore for ContentRouter {
    fn write(&self, group_id: &str, filename: &str, data: &[u8]) -> StoreResult<()> {
        ContentRouter::write(self, &ContentKey::new(group_id, filename)?, data)
    }

    fn read(&self, group_id: &str, filename: &str) -> StoreResult<Vec<u8>> {
        ContentRouter::read(self, &ContentKey::new(group_id, filename)?)
    }
}

/// Errors building a backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to start admin listener: {0}")]
    Admin(#[from] std::io::Error),
}

/// The configured backend
pub enum ContentBackend {
    Local(NodeStore),
    Network {
        router: Arc<ContentRouter>,
        admin_addr: SocketAddr,
    },
}

impl ContentBackend {
    /// Build the backend named by `[content]`.
    ///
    /// For the network backend this connects every configured node, builds
    /// the ring and starts the admin listener.
    pub fn from_config(config: &ContentConfig, options: ClientOptions) -> Result<Self, BackendError> {
        match config.backend {
            BackendType::Local => {
                let local = config.local.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("local backend requires [content.local]".to_string())
                })?;
                log::info!("Content backend: local directory {}", local.path.display());
                Ok(ContentBackend::Local(
                    NodeStore::new(&local.path).map_err(StoreError::from)?,
                ))
            }
            BackendType::Network => {
                let network = config.network.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("network backend requires [content.network]".to_string())
                })?;
                log::info!(
                    "Content backend: {} storage node(s), admin on {}",
                    network.nodes.len(),
                    network.admin_bind
                );
                let router = Arc::new(ContentRouter::connect(&network.nodes, options)?);
                let admin_addr = router.start_admin(network.admin_bind.as_str())?;
                Ok(ContentBackend::Network { router, admin_addr })
            }
        }
    }

    /// Router behind the network backend
    pub fn router(&self) -> Option<&Arc<ContentRouter>> {
        match self {
            ContentBackend::Local(_) => None,
            ContentBackend::Network { router, .. } => Some(router),
        }
    }

    /// Bound admin address of the network backend
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        match self {
            ContentBackend::Local(_) => None,
            ContentBackend::Network { admin_addr, .. } => Some(*admin_addr),
        }
    }
}

impl ContentStore for ContentBackend {
    fn write(&self, group_id: &str, filename: &str, data: &[u8]) -> StoreResult<()> {
        match self {
            ContentBackend::Local(store) => ContentStore::write(store, group_id, filename, data),
            ContentBackend::Network { router, .. } => {
                ContentStore::write(router.as_ref(), group_id, filename, data)
            }
        }
    }

    fn read(&self, group_id: &str, filename: &str) -> StoreResult<Vec<u8>> {
        match self {
            ContentBackend::Local(store) => ContentStore::read(store, group_id, filename),
            ContentBackend::Network { router, .. } => {
                ContentStore::read(router.as_ref(), group_id, filename)
            }
        }
    }
}
