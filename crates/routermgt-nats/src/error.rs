use std::time::Duration;

use bytes::Bytes;
use routermgt_domain::DomainError;
use thiserror::Error;

use crate::envelope::{ErrorBody, ErrorReply};

/// Failure of a single dispatched request, reported back to the requester
/// as an error reply rather than dropped.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("unknown operation code: {0}")]
    UnknownOperation(i64),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Stable machine-readable classification carried in the error reply
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Decode(_) => "decode",
            DispatchError::UnknownOperation(_) => "unknown_operation",
            DispatchError::InvalidRequest(_) => "invalid_request",
            DispatchError::Backend(_) => "backend",
            DispatchError::Timeout(_) => "timeout",
            DispatchError::Internal(_) => "internal",
        }
    }

    /// Encode as `{"error":{"kind":..,"message":..}}`
    pub fn to_reply(&self) -> Bytes {
        let reply = ErrorReply {
            error: ErrorBody {
                kind: self.kind().to_string(),
                message: self.to_string(),
            },
        };

        serde_json::to_vec(&reply)
            .map(Bytes::from)
            .unwrap_or_default()
    }
}

impl From<DomainError> for DispatchError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidTenant(_) | DomainError::InvalidPageRequest(_) => {
                DispatchError::InvalidRequest(err.to_string())
            }
            DomainError::RepositoryError(e) => DispatchError::Backend(format!("{e:#}")),
        }
    }
}
