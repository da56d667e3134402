//! Per-endpoint request execution.
//!
//! One [`RequestExecutor::trigger`] call runs the whole invocation flow:
//! header preparation, URL resolution, optional cache short-circuit, the
//! network call, response check and transform, cache write and dependent
//! cache invalidation. Every outcome ends up in the executor's
//! [`RequestState`]; nothing is returned as an error.
//!
//! Concurrent triggers are not de-duplicated. Each trigger takes a ticket per
//! executor and per cache identifier: a completion that has been overtaken by
//! a newer trigger no longer publishes state, and a completion does not write
//! the cache once a newer trigger has written the same identifier.

use crate::cache::{build_url, resolve_base_url, CacheKey, UrlParams};
use crate::client::core::RestContext;
use crate::client::endpoint::BoundEndpoint;
use crate::request::{reduce, RequestAction, RequestError, RequestExtra, RequestState};
use crate::transport::{TransportRequest, TransportResponse};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Default)]
struct KeyTickets {
    issued: u64,
    written: u64,
}

/// Orders cache writes per cache identifier.
///
/// Tickets are issued in trigger order. A write goes through only when no
/// newer trigger has already written the same identifier, so a slow response
/// never replaces a fresher one, while a newer trigger that fails or never
/// writes leaves older writes alone.
#[derive(Default)]
pub(crate) struct Sequencer {
    keys: Mutex<HashMap<CacheKey, KeyTickets>>,
}

impl Sequencer {
    pub fn issue(&self, key: &CacheKey) -> u64 {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        let tickets = keys.entry(key.clone()).or_default();
        tickets.issued += 1;
        tickets.issued
    }

    /// Run `write` unless a newer ticket already wrote `key`.
    ///
    /// The check and the write happen under one lock so two writers for the
    /// same identifier cannot interleave.
    pub fn write_if_newer(&self, key: &CacheKey, ticket: u64, write: impl FnOnce()) -> bool {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        let tickets = keys.entry(key.clone()).or_default();
        if ticket <= tickets.written {
            return false;
        }
        tickets.written = ticket;
        write();
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    CacheHit,
    Success,
    Rejected,
    Failed,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::CacheHit => "cache_hit",
            Outcome::Success => "success",
            Outcome::Rejected => "rejected",
            Outcome::Failed => "failed",
        }
    }
}

struct ExecutorInner {
    endpoint: Arc<BoundEndpoint>,
    ctx: Arc<RestContext>,
    state: watch::Sender<RequestState>,
    generation: AtomicU64,
}

/// Trigger and observable state of one endpoint.
///
/// Clones share the same state. Independent executors for the same endpoint
/// are obtained from [`Endpoints`](crate::client::Endpoints).
#[derive(Clone)]
pub struct RequestExecutor {
    inner: Arc<ExecutorInner>,
}

impl RequestExecutor {
    pub(crate) fn new(endpoint: Arc<BoundEndpoint>, ctx: Arc<RestContext>) -> Self {
        let (state, _) = watch::channel(RequestState::new());
        Self {
            inner: Arc::new(ExecutorInner {
                endpoint,
                ctx,
                state,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.endpoint.name
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.inner.endpoint.cache_key
    }

    /// Current request state.
    pub fn state(&self) -> RequestState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that wakes on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.inner.state.subscribe()
    }

    /// Run one invocation and return the state it ended in.
    ///
    /// `body` is sent as JSON, or folded into the query string for GET/HEAD
    /// and `body_as_params` endpoints. `params` fill `/:name` placeholders;
    /// the rest are appended as query parameters.
    pub async fn trigger(&self, body: Option<Value>, params: Option<UrlParams>) -> RequestState {
        let inner = &self.inner;
        let ticket = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cache_ticket = inner.ctx.sequencer.issue(&inner.endpoint.cache_key);
        let invocation_id = Uuid::new_v4();
        let started = Instant::now();

        let mut run = Invocation {
            inner,
            ticket,
            cache_ticket,
            state: inner.state.borrow().clone(),
            finished: false,
        };
        let outcome = run.execute(body, params.unwrap_or_default()).await;
        run.finish();

        info!(
            invocation_id = %invocation_id,
            endpoint = inner.endpoint.name.as_str(),
            method = inner.endpoint.policy.method.as_str(),
            url = run.state.extra.url.as_str(),
            duration_ms = started.elapsed().as_millis() as u64,
            outcome = outcome.as_str(),
            stale = !run.is_current(),
            "rest-api-kit request completed"
        );
        std::mem::take(&mut run.state)
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("endpoint", &self.inner.endpoint.name)
            .field("cache_key", &self.inner.endpoint.cache_key)
            .finish()
    }
}

/// State of one in-flight trigger.
///
/// Dropping an unfinished invocation (the trigger future was cancelled)
/// still stops loading.
struct Invocation<'a> {
    inner: &'a ExecutorInner,
    ticket: u64,
    cache_ticket: u64,
    state: RequestState,
    finished: bool,
}

impl Drop for Invocation<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(endpoint = self.inner.endpoint.name.as_str(), "trigger cancelled");
            self.finish();
        }
    }
}

impl Invocation<'_> {
    fn finish(&mut self) {
        self.finished = true;
        self.apply(RequestAction::LoadingStop);
    }

    fn is_current(&self) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == self.ticket
    }

    /// Reduce locally and publish when this is still the latest trigger.
    fn apply(&mut self, action: RequestAction) {
        self.state = reduce(std::mem::take(&mut self.state), action);
        if self.is_current() {
            self.inner.state.send_replace(self.state.clone());
        }
    }

    fn fail(&mut self, error: RequestError) -> Outcome {
        self.apply(RequestAction::DataError(error));
        Outcome::Failed
    }

    async fn execute(&mut self, body: Option<Value>, mut params: UrlParams) -> Outcome {
        let endpoint = self.inner.endpoint.clone();
        let ctx = self.inner.ctx.clone();
        let policy = &endpoint.policy;

        let headers = match self.prepare_headers() {
            Ok(headers) => headers,
            Err(error) => return self.fail(error),
        };

        let resolved = match resolve_base_url(&endpoint.url, ctx.base_url.as_deref()) {
            Ok(url) => url,
            Err(e) => {
                return self.fail(RequestError::Internal {
                    message: e.to_string(),
                })
            }
        };
        if policy.folds_body() {
            if let Some(body) = &body {
                params.extend(&UrlParams::from_json(body));
            }
        }
        let url = build_url(&resolved, &params);

        self.apply(RequestAction::ExtraSave(RequestExtra {
            endpoint_name: endpoint.name.clone(),
            url: url.clone(),
            method: policy.method,
            body: body.clone(),
            is_fired: true,
            prefer_cache_value: policy.prefer_cache_value,
            save_to_cache: policy.save_to_cache,
            updates: policy.updates.clone(),
        }));

        if policy.prefer_cache_value {
            match ctx.store.get(endpoint.cache_key.as_str()) {
                Some(cached) => {
                    debug!(endpoint = endpoint.name.as_str(), "serving cached value");
                    return match self.settle(cached, body.as_ref()) {
                        Outcome::Success => Outcome::CacheHit,
                        other => other,
                    };
                }
                None => debug!(endpoint = endpoint.name.as_str(), "cache miss"),
            }
        }

        self.apply(RequestAction::DataReset);
        self.apply(RequestAction::ErrorReset);
        self.apply(RequestAction::LoadingStart);

        let request = TransportRequest {
            method: policy.method,
            url,
            headers,
            body: if policy.folds_body() { None } else { body.clone() },
        };
        let raw = match ctx.transport.send(request).await {
            Err(e) => {
                return self.fail(RequestError::Transport {
                    message: e.user_message(),
                })
            }
            Ok(TransportResponse::Error { data, status, info }) => {
                return self.fail(RequestError::Response { data, status, info })
            }
            Ok(TransportResponse::Success { data, .. }) => data,
        };

        self.apply(RequestAction::ResponseSave(raw.clone()));
        let outcome = self.settle(raw.clone(), body.as_ref());
        if outcome != Outcome::Success {
            return outcome;
        }

        if policy.save_to_cache {
            let written = ctx.sequencer.write_if_newer(&endpoint.cache_key, self.cache_ticket, || {
                if let Err(e) = ctx.store.save(endpoint.cache_key.as_str(), raw) {
                    warn!(endpoint = endpoint.name.as_str(), error = %e, "cache write failed");
                }
            });
            if !written {
                debug!(
                    endpoint = endpoint.name.as_str(),
                    "discarding stale cache write"
                );
            }
        }

        for key in &endpoint.update_keys {
            debug!(endpoint = endpoint.name.as_str(), invalidated = key.as_str(), "invalidating");
            if let Err(e) = ctx.store.clear(key.as_str()) {
                warn!(endpoint = endpoint.name.as_str(), error = %e, "cache invalidation failed");
            }
        }

        Outcome::Success
    }

    /// Default JSON content type, then policy headers, then the preparation callback.
    fn prepare_headers(&self) -> Result<HeaderMap, RequestError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &self.inner.endpoint.policy.headers {
            headers.insert(name.clone(), value.clone());
        }
        match &self.inner.ctx.prepare_headers {
            Some(prepare) => guarded("prepare_headers", || prepare(headers)),
            None => Ok(headers),
        }
    }

    /// Success check then transform; dispatches the resulting success or error.
    fn settle(&mut self, raw: Value, body: Option<&Value>) -> Outcome {
        let inner = self.inner;
        let policy = &inner.endpoint.policy;
        match guarded("success_condition", || policy.check(&raw)) {
            Err(error) => self.fail(error),
            Ok(false) => {
                self.apply(RequestAction::DataError(RequestError::Rejected { payload: raw }));
                Outcome::Rejected
            }
            Ok(true) => match guarded("transform_response", || policy.transform(raw, body)) {
                Err(error) => self.fail(error),
                Ok(data) => {
                    self.apply(RequestAction::DataSuccess(data));
                    Outcome::Success
                }
            },
        }
    }
}

/// Run a caller-supplied callback, turning a panic into an internal error.
fn guarded<T>(label: &str, f: impl FnOnce() -> T) -> Result<T, RequestError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|_| {
        warn!(callback = label, "callback panicked");
        RequestError::Internal {
            message: format!("{} panicked", label),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequencer_drops_writes_older_than_the_last_write() {
        let seq = Sequencer::default();
        let a = CacheKey::from_raw("base&a");
        let b = CacheKey::from_raw("base&b");

        let first = seq.issue(&a);
        let second = seq.issue(&a);
        let other = seq.issue(&b);
        assert_eq!((first, second, other), (1, 2, 1));

        let mut writes = Vec::new();
        assert!(seq.write_if_newer(&a, second, || writes.push("second")));
        assert!(!seq.write_if_newer(&a, first, || writes.push("first")));
        assert!(seq.write_if_newer(&b, other, || writes.push("other")));
        assert_eq!(writes, vec!["second", "other"]);
    }

    #[test]
    fn test_sequencer_keeps_older_write_when_newer_never_writes() {
        let seq = Sequencer::default();
        let a = CacheKey::from_raw("base&a");

        let first = seq.issue(&a);
        let _second = seq.issue(&a);
        assert!(seq.write_if_newer(&a, first, || {}));
    }

    #[test]
    fn test_guarded_maps_panics() {
        assert_eq!(guarded("ok", || 1).unwrap(), 1);
        let err = guarded("transform_response", || -> i32 { panic!("boom") }).unwrap_err();
        assert_eq!(
            err,
            RequestError::Internal {
                message: "transform_response panicked".into()
            }
        );
    }
}
