use crate::cache::is_absolute_url;
use crate::client::core::{RestBase, RestContext};
use crate::client::execution::Sequencer;
use crate::endpoint::{EndpointManifest, PolicyDefaults};
use crate::store::Store;
use crate::transport::{HttpTransport, Transport};
use crate::{Error, ErrorContext, Result};
use reqwest::header::HeaderMap;
use std::sync::Arc;

/// Header-preparation callback, run once per invocation before the request is sent.
pub type PrepareHeaders = Arc<dyn Fn(HeaderMap) -> HeaderMap + Send + Sync>;

/// Builder for [`RestBase`].
///
/// Defaults can be overridden via env:
/// - `REST_KIT_BASE_URL` (no default)
///
/// Without an explicit transport, an [`HttpTransport`] is created (see its
/// own env overrides). Without an explicit store, a fresh [`Store`] is used.
pub struct RestBuilder {
    base_url: Option<String>,
    prepare_headers: Option<PrepareHeaders>,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Store>,
    defaults: PolicyDefaults,
}

impl RestBuilder {
    pub fn new() -> Self {
        Self {
            base_url: std::env::var("REST_KIT_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            prepare_headers: None,
            transport: None,
            store: None,
            defaults: PolicyDefaults::default(),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the header-preparation callback (auth tokens and the like).
    pub fn prepare_headers<F>(mut self, f: F) -> Self
    where
        F: Fn(HeaderMap) -> HeaderMap + Send + Sync + 'static,
    {
        self.prepare_headers = Some(Arc::new(f));
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share an existing store instead of creating one.
    pub fn store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    pub fn defaults(mut self, defaults: PolicyDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Take the base URL and policy defaults of a manifest.
    ///
    /// The manifest base URL replaces the current one only when it is set.
    pub fn manifest(mut self, manifest: &EndpointManifest) -> Result<Self> {
        if let Some(base) = &manifest.base_url {
            self.base_url = Some(base.clone());
        }
        self.defaults = manifest.policy_defaults()?;
        Ok(self)
    }

    pub fn build(self) -> Result<RestBase> {
        if let Some(base) = &self.base_url {
            if !is_absolute_url(base) {
                return Err(Error::configuration_with_context(
                    format!("base URL '{}' is not an absolute URL", base),
                    ErrorContext::new()
                        .with_field_path("base_url")
                        .with_details("expected a scheme such as https://")
                        .with_source("rest_builder"),
                ));
            }
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new()?),
        };

        Ok(RestBase::from_context(RestContext {
            base_url: self.base_url,
            prepare_headers: self.prepare_headers,
            transport,
            store: self.store.unwrap_or_default(),
            defaults: self.defaults,
            sequencer: Sequencer::default(),
        }))
    }
}

impl Default for RestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
