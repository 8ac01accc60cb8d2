//! JSON-RPC message envelope shared by requests, notifications and responses

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_lsp::jsonrpc::{Error as RpcError, Id};

use crate::lsp::error::HandlerError;

const JSONRPC_VERSION: &str = "2.0";

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// What a message is, derived from which of `id` and `method` are present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Notification,
    Response,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// `Some(Value::Null)` is written as `"result": null`, which responses require
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Message {
    pub fn request(id: Id, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id),
            method: Some(method.to_string()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn notification(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: None,
            method: Some(method.to_string()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn response(id: Option<Id>, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id.unwrap_or(Id::Null)),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    pub fn error_response(id: Option<Id>, error: RpcError) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id.unwrap_or(Id::Null)),
            method: None,
            params: None,
            result: None,
            error: Some(error),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match (&self.id, &self.method) {
            (Some(_), Some(_)) => MessageKind::Request,
            (None, Some(_)) => MessageKind::Notification,
            (Some(_), None) => MessageKind::Response,
            (None, None) => MessageKind::Invalid,
        }
    }

    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or_default()
    }

    /// Deserializes `params` into the handler's parameter type.
    /// Missing params are treated as `null`.
    pub fn parse_params<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let params = self.params.clone().unwrap_or(Value::Null);
        serde_json::from_value(params).map_err(|source| HandlerError::InvalidParams {
            method: self.method().to_string(),
            source,
        })
    }
}
