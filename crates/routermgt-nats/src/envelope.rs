use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Reply body for a write that completed with nothing rejected
pub const SUCCESS_MARKER: &[u8] = b"success!";

/// Operation selected by the envelope's `mtype` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationCode {
    Get,
    GetPaged,
    Create,
    Delete,
}

impl OperationCode {
    pub fn code(self) -> i64 {
        match self {
            OperationCode::Get => 0,
            OperationCode::GetPaged => 1,
            OperationCode::Create => 2,
            OperationCode::Delete => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationCode::Get => "get",
            OperationCode::GetPaged => "get_paged",
            OperationCode::Create => "create",
            OperationCode::Delete => "delete",
        }
    }
}

impl TryFrom<i64> for OperationCode {
    type Error = DispatchError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(OperationCode::Get),
            1 => Ok(OperationCode::GetPaged),
            2 => Ok(OperationCode::Create),
            3 => Ok(OperationCode::Delete),
            other => Err(DispatchError::UnknownOperation(other)),
        }
    }
}

impl fmt::Display for OperationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request envelope carried on the request subject.
///
/// `Data` holds the operation payload as base64 text; a missing or null
/// `Data` decodes to an empty payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub mtype: i64,
    pub tenant: String,
    #[serde(rename = "Data", default, with = "base64_payload")]
    pub data: Vec<u8>,
}

impl RequestEnvelope {
    /// Build an envelope with `payload` JSON-encoded into `Data`
    pub fn new<T: Serialize>(
        operation: OperationCode,
        tenant: impl Into<String>,
        payload: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            mtype: operation.code(),
            tenant: tenant.into(),
            data: serde_json::to_vec(payload)?,
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DispatchError> {
        serde_json::from_slice(bytes).map_err(|e| DispatchError::Decode(format!("envelope: {e}")))
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Router as it appears on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RouterMessage {
    pub router_id: String,
    pub router_serial: String,
    pub operator_name: String,
    pub iso_country_code: String,
    pub mac: String,
    pub router_model: String,
    pub account_id: String,
    pub agent_last_connection: String,
    pub agent_version: String,
}

/// GetPaged payload. Signed so negative values reach validation instead of
/// failing as malformed JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequestMessage {
    pub limit: i64,
    pub page: i64,
    pub sort: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagedRoutersReply {
    pub last: i64,
    pub routers: Vec<RouterMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

mod base64_payload {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD.decode(encoded).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
