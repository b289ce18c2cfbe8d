//! RPC serving
//!
//! Storage nodes and the router's admin plane share one TCP accept loop;
//! they differ only in the `RequestHandler` they plug in.

pub mod listener;

use crate::error::StoreResult;
use crate::protocol::{Request, Response};

pub use listener::RpcServer;

/// Answers one decoded request
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: Request) -> StoreResult<Response>;
}
