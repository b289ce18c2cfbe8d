//! Storage protocol client

use super::rpc::{unexpected, RpcClient};
use super::ClientOptions;
use crate::error::{StoreError, StoreResult};
use crate::key::ContentKey;
use crate::protocol::{Request, Response, MAX_FRAME_LEN};

/// Typed client for one storage node
pub struct StorageClient {
    rpc: RpcClient,
}

impl StorageClient {
    /// Dial the node and check it answers; failure is `ConnectFailure`
    pub fn connect(endpoint: impl Into<String>, options: ClientOptions) -> StoreResult<Self> {
        let rpc = RpcClient::connect(endpoint, options)?;
        log::info!("Connected to storage node {}", rpc.endpoint());
        Ok(Self { rpc })
    }

    pub fn endpoint(&self) -> &str {
        self.rpc.endpoint()
    }

    /// Store a blob. One that cannot fit in a frame is refused before
    /// anything is sent.
    pub fn write_file(&self, key: &ContentKey, data: Vec<u8>) -> StoreResult<()> {
        // three u32 length prefixes: group id, name, data
        let frame_len = 12 + key.group_id().len() + key.name().len() + data.len();
        if frame_len > MAX_FRAME_LEN {
            return Err(StoreError::Protocol(format!(
                "{} is {} bytes; a frame holds at most {}",
                key,
                data.len(),
                MAX_FRAME_LEN
            )));
        }

        match self.rpc.call(&Request::WriteFile {
            key: key.clone(),
            data,
        })? {
            Response::Written => Ok(()),
            other => Err(unexpected(self.endpoint(), "WriteFile", other)),
        }
    }

    pub fn read_file(&self, key: &ContentKey) -> StoreResult<Vec<u8>> {
        match self.rpc.call(&Request::ReadFile { key: key.clone() })? {
            Response::Data(data) => Ok(data),
            other => Err(unexpected(self.endpoint(), "ReadFile", other)),
        }
    }

    pub fn delete_file(&self, key: &ContentKey) -> StoreResult<()> {
        match self.rpc.call(&Request::DeleteFile { key: key.clone() })? {
            Response::Deleted => Ok(()),
            other => Err(unexpected(self.endpoint(), "DeleteFile", other)),
        }
    }

    /// Full inventory as `group_id/name` strings
    pub fn list_files(&self) -> StoreResult<Vec<String>> {
        match self.rpc.call(&Request::ListFiles)? {
            Response::Files(files) => Ok(files),
            other => Err(unexpected(self.endpoint(), "ListFiles", other)),
        }
    }

    pub fn ping(&self) -> StoreResult<()> {
        match self.rpc.call(&Request::Ping)? {
            Response::Pong => Ok(()),
            other => Err(unexpected(self.endpoint(), "Ping", other)),
        }
    }

    pub fn close(&self) {
        self.rpc.close();
    }
}
