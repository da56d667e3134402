//! Network collaborator.
//!
//! A [`Transport`] performs one HTTP exchange. Ordinary HTTP error statuses
//! are returned as [`TransportResponse::Error`]; only failures below HTTP
//! (connection refused, timeout, ...) are returned as [`TransportError`].
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`HttpTransport`] | `reqwest` client with timeout, retries and status validation |
//! | [`FnTransport`] | Closure-backed transport for tests and custom stacks |

mod http;

pub use http::HttpTransport;

use crate::endpoint::Method;
use async_trait::async_trait;
use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// One outgoing request, fully resolved.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// Already omitted for methods that do not carry a body.
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportResponse {
    Success {
        data: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    Error {
        data: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<Value>,
    },
}

impl TransportResponse {
    pub fn success(data: Value) -> Self {
        TransportResponse::Success {
            data,
            status: None,
            duration_ms: None,
        }
    }

    pub fn error(data: Value) -> Self {
        TransportResponse::Error {
            data,
            status: None,
            info: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransportResponse::Success { .. })
    }

    pub fn data(&self) -> &Value {
        match self {
            TransportResponse::Success { data, .. } | TransportResponse::Error { data, .. } => data,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportResponse::Success { status, .. } | TransportResponse::Error { status, .. } => {
                *status
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timeout")]
    Timeout,

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Short message recorded on the request state.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::Timeout => "Request timeout".to_string(),
            TransportError::Http(e) if e.is_timeout() => "Request timeout".to_string(),
            TransportError::Http(e) if e.is_connect() || e.is_request() => {
                "Network error".to_string()
            }
            TransportError::Http(e) => e.to_string(),
            TransportError::Other(msg) => msg.clone(),
        }
    }

    /// Timeouts are final; everything else below HTTP may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout => false,
            TransportError::Http(e) => !e.is_timeout(),
            TransportError::Other(_) => true,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;

    fn name(&self) -> &str {
        "transport"
    }
}

type SendFuture = BoxFuture<'static, Result<TransportResponse, TransportError>>;
type SendFn = dyn Fn(TransportRequest) -> SendFuture + Send + Sync;

/// Adapter turning an async closure into a [`Transport`].
///
/// ```rust
/// use rest_api_kit::transport::{FnTransport, TransportResponse};
/// use serde_json::json;
///
/// let transport = FnTransport::new(|req| async move {
///     Ok(TransportResponse::success(json!({ "url": req.url })))
/// });
/// # let _ = transport;
/// ```
pub struct FnTransport {
    name: String,
    func: Box<SendFn>,
}

impl FnTransport {
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(TransportRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TransportResponse, TransportError>> + Send + 'static,
    {
        Self {
            name: "fn".to_string(),
            func: Box::new(move |req| Box::pin(func(req))),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Transport for FnTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (self.func)(request).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
