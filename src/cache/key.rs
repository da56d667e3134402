//! Cache identifier generation.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};

/// Separator between the base URL and the endpoint name.
///
/// Endpoint names may not contain it, so two distinct names under the same
/// base URL can never produce the same identifier.
pub const CACHE_KEY_SEPARATOR: char = '&';

/// Deterministic identifier under which an endpoint's response is cached.
///
/// Depends only on the base URL and the endpoint name: changing an endpoint's
/// policy, body or parameters never moves its cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// `base_url + "&" + endpoint_name`. A missing base URL is treated as empty.
    pub fn for_endpoint(base_url: Option<&str>, endpoint_name: &str) -> Self {
        Self(format!(
            "{}{}{}",
            base_url.unwrap_or_default(),
            CACHE_KEY_SEPARATOR,
            endpoint_name
        ))
    }

    /// Wrap an already computed identifier (e.g. one read back from persistence).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Check that `name` can be used as an endpoint name.
pub fn validate_endpoint_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation_with_context(
            "endpoint name must not be empty",
            ErrorContext::new()
                .with_field_path("endpoints")
                .with_source("endpoint_name"),
        ));
    }
    if name.contains(CACHE_KEY_SEPARATOR) {
        return Err(Error::validation_with_context(
            format!(
                "endpoint name '{}' contains the reserved character '{}'",
                name, CACHE_KEY_SEPARATOR
            ),
            ErrorContext::new()
                .with_field_path(format!("endpoints.{}", name))
                .with_source("endpoint_name"),
        ));
    }
    Ok(())
}
