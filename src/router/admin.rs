//! Admin protocol handler

use super::ContentRouter;
use crate::error::{StoreError, StoreResult};
use crate::protocol::{Request, Response};
use crate::server::RequestHandler;
use std::sync::Arc;

/// Serves ListNodes / AddNode / RemoveNode for one router
pub struct AdminService {
    router: Arc<ContentRouter>,
}

impl AdminService {
    pub fn new(router: Arc<ContentRouter>) -> Self {
        Self { router }
    }
}

impl RequestHandler for AdminService {
    fn handle(&self, request: Request) -> StoreResult<Response> {
        match request {
            Request::ListNodes => Ok(Response::Nodes(self.router.list_nodes())),
            Request::AddNode { endpoint } => self
                .router
                .add_node(&endpoint)
                .map(|migrated| Response::NodeAdded { migrated }),
            Request::RemoveNode { endpoint } => self
                .router
                .remove_node(&endpoint)
                .map(|migrated| Response::NodeRemoved { migrated }),
            Request::Ping => Ok(Response::Pong),
            other => Err(StoreError::Protocol(format!(
                "{:?} is not served by the admin plane",
                other.opcode()
            ))),
        }
    }
}
