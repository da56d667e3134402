use crate::endpoint::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why an invocation ended in the error state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestError {
    /// The network collaborator answered with its error shape (e.g. HTTP status >= 300).
    Response {
        data: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<Value>,
    },
    /// The transport rejected the call; the message is already normalized.
    Transport { message: String },
    /// The endpoint's success condition refused the payload.
    Rejected { payload: Value },
    /// Anything else that failed inside the trigger.
    Internal { message: String },
}

impl RequestError {
    /// The payload carried by the error, as the raw JSON a caller would inspect.
    pub fn payload(&self) -> Value {
        match self {
            RequestError::Response { data, .. } => data.clone(),
            RequestError::Rejected { payload } => payload.clone(),
            RequestError::Transport { message } | RequestError::Internal { message } => {
                Value::String(message.clone())
            }
        }
    }
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::Response {
                status: Some(status),
                ..
            } => write!(f, "request failed with status {}", status),
            RequestError::Response { data, .. } => write!(f, "request failed: {}", data),
            RequestError::Transport { message } => write!(f, "transport failure: {}", message),
            RequestError::Rejected { .. } => write!(f, "response rejected by success condition"),
            RequestError::Internal { message } => write!(f, "{}", message),
        }
    }
}

/// Bookkeeping about the last trigger, kept for introspection only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestExtra {
    pub endpoint_name: String,
    pub url: String,
    pub method: Method,
    pub body: Option<Value>,
    pub is_fired: bool,
    pub prefer_cache_value: bool,
    pub save_to_cache: bool,
    pub updates: Vec<String>,
}

impl Default for RequestExtra {
    fn default() -> Self {
        Self {
            endpoint_name: String::new(),
            url: String::new(),
            method: Method::Get,
            body: None,
            is_fired: false,
            prefer_cache_value: false,
            save_to_cache: false,
            updates: Vec::new(),
        }
    }
}

/// Observable state of one endpoint invocation scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestState {
    pub is_loading: bool,
    pub data: Option<Value>,
    pub error: Option<RequestError>,
    pub is_success: bool,
    /// Raw (untransformed) payload of the last successful response.
    pub response: Option<Value>,
    pub extra: RequestExtra,
}

impl RequestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Deserialize `data` into a caller type.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.data.clone().map(serde_json::from_value)
    }
}
