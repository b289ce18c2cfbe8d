//! Storage protocol handler

use super::store::NodeStore;
use crate::error::{StoreError, StoreResult};
use crate::protocol::{Request, Response};
use crate::server::RequestHandler;

/// Serves WriteFile / ReadFile / DeleteFile / ListFiles against a local store
pub struct StorageService {
    store: NodeStore,
}

impl StorageService {
    pub fn new(store: NodeStore) -> Self {
        Self { store }
    }
}

impl RequestHandler for StorageService {
    fn handle(&self, request: Request) -> StoreResult<Response> {
        match request {
            Request::WriteFile { key, data } => {
                self.store.write(&key, &data)?;
                Ok(Response::Written)
            }
            Request::ReadFile { key } => self.store.read(&key).map(Response::Data),
            Request::DeleteFile { key } => {
                self.store.delete(&key)?;
                Ok(Response::Deleted)
            }
            Request::ListFiles => self.store.list().map(Response::Files),
            Request::Ping => Ok(Response::Pong),
            other => Err(StoreError::Protocol(format!(
                "{:?} is not served by a storage node",
                other.opcode()
            ))),
        }
    }
}
