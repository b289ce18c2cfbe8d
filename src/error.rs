//! Error taxonomy shared by storage nodes, the router and the admin plane
//!
//! Every variant has a one-byte wire code so that a node's own error is
//! reported to the router's caller unchanged.

use std::io;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("failed to connect to {endpoint}: {reason}")]
    ConnectFailure { endpoint: String, reason: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Wire codes carried in an error frame
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound = 0x01,
    Unavailable = 0x02,
    Io = 0x03,
    NodeNotFound = 0x04,
    ConnectFailure = 0x05,
    InvalidKey = 0x06,
    Protocol = 0x07,
}

impl TryFrom<u8> for ErrorCode {
    type Error = StoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ErrorCode::NotFound),
            0x02 => Ok(ErrorCode::Unavailable),
            0x03 => Ok(ErrorCode::Io),
            0x04 => Ok(ErrorCode::NodeNotFound),
            0x05 => Ok(ErrorCode::ConnectFailure),
            0x06 => Ok(ErrorCode::InvalidKey),
            0x07 => Ok(ErrorCode::Protocol),
            _ => Err(StoreError::Protocol(format!("unknown error code: {}", value))),
        }
    }
}

impl StoreError {
    /// Wire code plus the two text fields of an error frame
    pub fn to_wire(&self) -> (ErrorCode, String, String) {
        match self {
            StoreError::NotFound(key) => (ErrorCode::NotFound, key.clone(), String::new()),
            StoreError::Unavailable(reason) => {
                (ErrorCode::Unavailable, reason.clone(), String::new())
            }
            StoreError::Io(e) => (ErrorCode::Io, e.to_string(), String::new()),
            StoreError::NodeNotFound(endpoint) => {
                (ErrorCode::NodeNotFound, endpoint.clone(), String::new())
            }
            StoreError::ConnectFailure { endpoint, reason } => {
                (ErrorCode::ConnectFailure, endpoint.clone(), reason.clone())
            }
            StoreError::InvalidKey(reason) => {
                (ErrorCode::InvalidKey, reason.clone(), String::new())
            }
            StoreError::Protocol(reason) => (ErrorCode::Protocol, reason.clone(), String::new()),
        }
    }

    /// Rebuild an error received in an error frame
    pub fn from_wire(code: ErrorCode, detail: String, reason: String) -> Self {
        match code {
            ErrorCode::NotFound => StoreError::NotFound(detail),
            ErrorCode::Unavailable => StoreError::Unavailable(detail),
            ErrorCode::Io => StoreError::Io(io::Error::other(detail)),
            ErrorCode::NodeNotFound => StoreError::NodeNotFound(detail),
            ErrorCode::ConnectFailure => StoreError::ConnectFailure {
                endpoint: detail,
                reason,
            },
            ErrorCode::InvalidKey => StoreError::InvalidKey(detail),
            ErrorCode::Protocol => StoreError::Protocol(detail),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failure_keeps_both_fields() {
        let err = StoreError::ConnectFailure {
            endpoint: "10.0.0.7:8090".to_string(),
            reason: "connection refused".to_string(),
        };
        let (code, detail, reason) = err.to_wire();
        match StoreError::from_wire(code, detail, reason) {
            StoreError::ConnectFailure { endpoint, reason } => {
                assert_eq!(endpoint, "10.0.0.7:8090");
                assert_eq!(reason, "connection refused");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_remote_io_error_stays_io() {
        let err = StoreError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "read-only fs"));
        let (code, detail, reason) = err.to_wire();
        assert_eq!(code, ErrorCode::Io);
        let back = StoreError::from_wire(code, detail, reason);
        assert!(matches!(back, StoreError::Io(_)));
        assert!(back.to_string().contains("read-only fs"));
    }

    #[test]
    fn test_unknown_error_code() {
        assert!(matches!(
            ErrorCode::try_from(0x42),
            Err(StoreError::Protocol(_))
        ));
    }
}
