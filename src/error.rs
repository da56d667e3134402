use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error
    /// (e.g., "endpoints.getUser.url", "base_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected format, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "endpoint_builder", "store_dispatch")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the crate.
///
/// Only declaration-time mistakes and store misuse are returned as `Err`.
/// Failures of a single endpoint invocation never surface here; they are
/// recorded on that invocation's [`RequestState`](crate::request::RequestState).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Store error: {message}{}", format_context(.context))]
    Store {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Endpoint manifest error: {0}")]
    Manifest(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new store error with structured context
    pub fn store_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Store {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Store { context, .. } => Some(context),
            _ => None,
        }
    }

    /// True for the re-entrant dispatch guard.
    pub fn is_reentrant_dispatch(&self) -> bool {
        matches!(
            self,
            Error::Store { context, .. }
                if context.source.as_deref() == Some("store_dispatch_guard")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_rendered_in_display() {
        let err = Error::configuration_with_context(
            "relative URL without base URL",
            ErrorContext::new()
                .with_field_path("endpoints.getUser.url")
                .with_source("resolve_base_url"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Configuration error: relative URL without base URL"));
        assert!(msg.contains("field: endpoints.getUser.url"));
        assert!(msg.contains("source: resolve_base_url"));
    }

    #[test]
    fn test_context_accessor() {
        let err = Error::validation_with_context("bad", ErrorContext::new().with_details("x"));
        assert_eq!(err.context().and_then(|c| c.details.as_deref()), Some("x"));

        let io: Error = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(io.context().is_none());
    }
}
