//! Distributed storage for video segment files
//!
//! Independent storage nodes each hold a local file tree. A content router
//! maps every `(group_id, name)` key to exactly one node with consistent
//! hashing, and an admin plane adds or removes nodes at runtime, moving
//! the files whose owner changed.

pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod key;
pub mod node;
pub mod protocol;
pub mod router;
pub mod server;

pub use config::Config;
pub use content::{ContentBackend, ContentStore};
pub use error::{StoreError, StoreResult};
pub use key::ContentKey;
pub use node::{NodeServer, NodeServerConfig};
pub use router::ContentRouter;
