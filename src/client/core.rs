use crate::client::builder::{PrepareHeaders, RestBuilder};
use crate::client::endpoint::Endpoints;
use crate::client::execution::Sequencer;
use crate::endpoint::{Endpoint, PolicyDefaults};
use crate::store::Store;
use crate::transport::Transport;
use crate::Result;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, warn};

/// Library-wide options shared by every executor.
pub(crate) struct RestContext {
    pub base_url: Option<String>,
    pub prepare_headers: Option<PrepareHeaders>,
    pub transport: Arc<dyn Transport>,
    pub store: Store,
    pub defaults: PolicyDefaults,
    pub sequencer: Sequencer,
}

/// Entry point: library-wide options plus the once-only endpoint declaration.
pub struct RestBase {
    ctx: Arc<RestContext>,
    endpoints: OnceCell<Endpoints>,
}

impl RestBase {
    pub fn builder() -> RestBuilder {
        RestBuilder::new()
    }

    pub(crate) fn from_context(ctx: RestContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            endpoints: OnceCell::new(),
        }
    }

    /// Declare the endpoints of the application.
    ///
    /// Declarations are validated (names, URLs, `updates` targets, accessor
    /// collisions) and an [`Endpoints`] registry is returned. Only the first
    /// successful call takes effect: later calls log a warning and return
    /// the registry built by the first one.
    pub fn create_endpoints<I, S>(&self, declarations: I) -> Result<Endpoints>
    where
        I: IntoIterator<Item = (S, Endpoint)>,
        S: Into<String>,
    {
        if let Some(existing) = self.endpoints.get() {
            warn_repeated();
            return Ok(existing.clone());
        }

        let declarations: Vec<(String, Endpoint)> = declarations
            .into_iter()
            .map(|(name, endpoint)| (name.into(), endpoint))
            .collect();
        let built = Endpoints::build(self.ctx.clone(), declarations)?;
        debug!(endpoints = built.len(), "endpoints created");

        match self.endpoints.set(built.clone()) {
            Ok(()) => Ok(built),
            // Lost a race against another thread declaring endpoints.
            Err(rejected) => {
                warn_repeated();
                Ok(self.endpoints.get().cloned().unwrap_or(rejected))
            }
        }
    }

    /// Registry built by [`create_endpoints`](Self::create_endpoints), if any.
    pub fn endpoints(&self) -> Option<&Endpoints> {
        self.endpoints.get()
    }

    pub fn store(&self) -> &Store {
        &self.ctx.store
    }

    pub fn base_url(&self) -> Option<&str> {
        self.ctx.base_url.as_deref()
    }
}

fn warn_repeated() {
    warn!(
        "rest-api-kit: create_endpoints called multiple times. Endpoints should be created once \
         at app initialization. Using previously initialized endpoints."
    );
}
