use bytes::Bytes;

use crate::envelope::OperationCode;
use crate::error::DispatchError;

/// Request type for dispatching a single NATS request message.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// The subject the request arrived on
    pub subject: String,
    /// The raw envelope bytes
    pub payload: Bytes,
}

impl DispatchRequest {
    pub fn new(subject: impl Into<String>, payload: Bytes) -> Self {
        Self {
            subject: subject.into(),
            payload,
        }
    }
}

/// Classified failure recorded on a response for logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    pub kind: &'static str,
    pub message: String,
}

/// Response type for a dispatched request.
///
/// The payload is always what gets published to the reply subject, whether
/// it is a result or an error reply.
#[derive(Debug, Clone)]
pub struct DispatchResponse {
    pub payload: Bytes,
    pub operation: Option<OperationCode>,
    pub tenant: Option<String>,
    /// Short description of what was asked for, e.g. the serials of a batch
    pub request_summary: Option<String>,
    pub failure: Option<DispatchFailure>,
}

impl DispatchResponse {
    pub fn ok(operation: OperationCode, tenant: impl Into<String>, payload: Bytes) -> Self {
        Self {
            payload,
            operation: Some(operation),
            tenant: Some(tenant.into()),
            request_summary: None,
            failure: None,
        }
    }

    pub fn failed(
        operation: Option<OperationCode>,
        tenant: Option<String>,
        error: DispatchError,
    ) -> Self {
        Self {
            payload: error.to_reply(),
            operation,
            tenant,
            request_summary: None,
            failure: Some(DispatchFailure {
                kind: error.kind(),
                message: error.to_string(),
            }),
        }
    }

    pub fn with_request_summary(mut self, summary: Option<String>) -> Self {
        self.request_summary = summary;
        self
    }

    pub fn is_error(&self) -> bool {
        self.failure.is_some()
    }
}
