//! Pooled RPC client for one endpoint

use super::connection::Connection;
use super::ClientOptions;
use crate::error::{StoreError, StoreResult};
use crate::protocol::{Request, Response};
use std::sync::{Mutex, PoisonError};

/// Keeps a few idle connections to one endpoint.
///
/// Each call checks out its own connection, so concurrent calls to the
/// same node do not queue behind each other. Calls are never retried.
pub struct RpcClient {
    endpoint: String,
    options: ClientOptions,
    idle: Mutex<Vec<Connection>>,
}

impl RpcClient {
    /// Client that dials lazily on first call
    pub fn new(endpoint: impl Into<String>, options: ClientOptions) -> Self {
        Self {
            endpoint: endpoint.into(),
            options,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Dial now and verify the peer answers a ping
    pub fn connect(endpoint: impl Into<String>, options: ClientOptions) -> StoreResult<Self> {
        let client = Self::new(endpoint, options);
        let connect_failure = |reason: String| StoreError::ConnectFailure {
            endpoint: client.endpoint.clone(),
            reason,
        };

        let mut conn = Connection::open(&client.endpoint, &client.options)
            .map_err(|e| connect_failure(e.to_string()))?;
        match conn.call(&Request::Ping) {
            Ok(Ok(Response::Pong)) => {}
            Ok(Ok(other)) => {
                return Err(connect_failure(format!("unexpected ping reply {:?}", other)))
            }
            Ok(Err(e)) => return Err(connect_failure(e.to_string())),
            Err(e) => return Err(connect_failure(e.to_string())),
        }

        client.checkin(conn);
        Ok(client)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn call(&self, request: &Request) -> StoreResult<Response> {
        let mut conn = self.checkout()?;
        match conn.call(request) {
            Ok(outcome) => {
                self.checkin(conn);
                outcome
            }
            Err(e) => {
                conn.shutdown();
                Err(StoreError::Unavailable(format!("{}: {}", self.endpoint, e)))
            }
        }
    }

    /// Shut down every idle connection; later calls dial afresh
    pub fn close(&self) {
        let idle = std::mem::take(&mut *self.idle.lock().unwrap_or_else(PoisonError::into_inner));
        for conn in &idle {
            conn.shutdown();
        }
        log::debug!("Closed {} idle connection(s) to {}", idle.len(), self.endpoint);
    }

    fn checkout(&self) -> StoreResult<Connection> {
        let pooled = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        match pooled {
            Some(conn) => Ok(conn),
            None => Connection::open(&self.endpoint, &self.options)
                .map_err(|e| StoreError::Unavailable(format!("{}: {}", self.endpoint, e))),
        }
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.options.max_idle {
            idle.push(conn);
        } else {
            conn.shutdown();
        }
    }
}

/// Error for a reply whose shape does not match the request
pub(crate) fn unexpected(endpoint: &str, request: &str, response: Response) -> StoreError {
    StoreError::Protocol(format!(
        "{} answered {} with {:?}",
        endpoint, request, response.opcode()
    ))
}
