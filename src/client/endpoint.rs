//! Registry of declared endpoints.

use crate::cache::{resolve_base_url, CacheKey};
use crate::client::core::RestContext;
use crate::client::execution::RequestExecutor;
use crate::endpoint::{accessor_name, check_update_targets, Endpoint, EndpointPolicy};
use crate::{Error, ErrorContext, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One declared endpoint with its resolved policy and cache identifiers.
pub(crate) struct BoundEndpoint {
    pub name: String,
    pub url: String,
    pub policy: EndpointPolicy,
    pub cache_key: CacheKey,
    /// Cache identifiers cleared after a successful invocation.
    pub update_keys: Vec<CacheKey>,
}

struct Registry {
    ctx: Arc<RestContext>,
    by_name: BTreeMap<String, Arc<BoundEndpoint>>,
    by_accessor: BTreeMap<String, String>,
}

/// Declared endpoints, addressable by name (`getUser`) or accessor (`useGetUser`).
///
/// Each call to [`executor`](Self::executor) or [`accessor`](Self::accessor)
/// yields an independent [`RequestExecutor`] with its own request state, all
/// sharing the same store and transport.
#[derive(Clone)]
pub struct Endpoints {
    inner: Arc<Registry>,
}

impl Endpoints {
    pub(crate) fn build(
        ctx: Arc<RestContext>,
        declarations: Vec<(String, Endpoint)>,
    ) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for (name, endpoint) in &declarations {
            endpoint.validate(name)?;
            if !seen.insert(name.as_str()) {
                return Err(Error::validation_with_context(
                    format!("endpoint '{}' is declared twice", name),
                    ErrorContext::new()
                        .with_field_path(format!("endpoints.{}", name))
                        .with_source("endpoint_registry"),
                ));
            }
            // Relative URLs need a base URL; fail now rather than on first trigger.
            resolve_base_url(endpoint.url(), ctx.base_url.as_deref()).map_err(|e| match e {
                Error::Configuration { message, context } => Error::configuration_with_context(
                    message,
                    context.with_field_path(format!("endpoints.{}.url", name)),
                ),
                other => other,
            })?;
        }
        check_update_targets(declarations.iter().map(|(n, e)| (n.as_str(), e)))?;

        let base_url = ctx.base_url.as_deref();
        let mut by_name = BTreeMap::new();
        let mut by_accessor = BTreeMap::new();
        for (name, endpoint) in declarations {
            let bound = BoundEndpoint {
                cache_key: CacheKey::for_endpoint(base_url, &name),
                update_keys: endpoint
                    .update_targets()
                    .iter()
                    .map(|target| CacheKey::for_endpoint(base_url, target))
                    .collect(),
                policy: endpoint.resolve(&ctx.defaults),
                url: endpoint.url().to_string(),
                name: name.clone(),
            };
            by_accessor.insert(accessor_name(&name), name.clone());
            by_name.insert(name, Arc::new(bound));
        }

        Ok(Self {
            inner: Arc::new(Registry {
                ctx,
                by_name,
                by_accessor,
            }),
        })
    }

    /// New executor for the endpoint called `name`.
    pub fn executor(&self, name: &str) -> Option<RequestExecutor> {
        self.inner
            .by_name
            .get(name)
            .map(|bound| RequestExecutor::new(bound.clone(), self.inner.ctx.clone()))
    }

    /// New executor looked up by accessor name (`useGetUser`).
    pub fn accessor(&self, accessor: &str) -> Option<RequestExecutor> {
        let name = self.inner.by_accessor.get(accessor)?;
        self.executor(name)
    }

    /// Deterministic accessor name of an endpoint name.
    pub fn accessor_name(name: &str) -> String {
        accessor_name(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.inner.by_name.keys().map(String::as_str).collect()
    }

    pub fn accessor_names(&self) -> Vec<&str> {
        self.inner.by_accessor.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.by_name.contains_key(name)
    }

    pub fn cache_key(&self, name: &str) -> Option<&CacheKey> {
        self.inner.by_name.get(name).map(|b| &b.cache_key)
    }

    pub fn policy(&self, name: &str) -> Option<&EndpointPolicy> {
        self.inner.by_name.get(name).map(|b| &b.policy)
    }

    pub fn len(&self) -> usize {
        self.inner.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.by_name.is_empty()
    }
}

impl std::fmt::Debug for Endpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoints")
            .field("names", &self.names())
            .finish()
    }
}
