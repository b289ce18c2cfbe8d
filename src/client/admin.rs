//! Admin protocol client, used by operators to change the node set

use super::rpc::{unexpected, RpcClient};
use super::ClientOptions;
use crate::error::StoreResult;
use crate::protocol::{Request, Response};

pub struct AdminClient {
    rpc: RpcClient,
}

impl AdminClient {
    /// Client for the router's admin address; dials on first call
    pub fn new(admin_addr: impl Into<String>, options: ClientOptions) -> Self {
        Self {
            rpc: RpcClient::new(admin_addr, options),
        }
    }

    /// Live node endpoints, sorted
    pub fn list_nodes(&self) -> StoreResult<Vec<String>> {
        match self.rpc.call(&Request::ListNodes)? {
            Response::Nodes(nodes) => Ok(nodes),
            other => Err(unexpected(self.rpc.endpoint(), "ListNodes", other)),
        }
    }

    /// Add a node; returns how many files moved onto their new owner
    pub fn add_node(&self, endpoint: &str) -> StoreResult<u32> {
        match self.rpc.call(&Request::AddNode {
            endpoint: endpoint.to_string(),
        })? {
            Response::NodeAdded { migrated } => Ok(migrated),
            other => Err(unexpected(self.rpc.endpoint(), "AddNode", other)),
        }
    }

    /// Remove a node; returns how many of its files were moved off it
    pub fn remove_node(&self, endpoint: &str) -> StoreResult<u32> {
        match self.rpc.call(&Request::RemoveNode {
            endpoint: endpoint.to_string(),
        })? {
            Response::NodeRemoved { migrated } => Ok(migrated),
            other => Err(unexpected(self.rpc.endpoint(), "RemoveNode", other)),
        }
    }
}
