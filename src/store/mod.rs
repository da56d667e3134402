//! Shared response cache with subscriptions, middleware and history.
//!
//! # Cache Store
//!
//! [`Store`] is the single source of truth for cached endpoint responses. It
//! is an explicit context object: build one per application, clone the handle
//! (cheap, `Arc`-backed) into every consumer, and call [`Store::teardown`]
//! when the application shuts down.
//!
//! ## Dispatch
//!
//! Every mutation is a [`StoreAction`] passed to [`Store::dispatch`]:
//!
//! 1. the action runs through the [middleware chain](middleware);
//! 2. the reducer commits it to a fresh state snapshot;
//! 3. the action is appended to the bounded [history](history);
//! 4. a [`StoreEvent`] is delivered synchronously, in subscription order,
//!    to every subscriber whose selection changed.
//!
//! Dispatches from different threads are serialized. Dispatching again from
//! the same thread while a dispatch is running (from a middleware or a
//! listener) fails with a store error instead of deadlocking.
//!
//! ```rust
//! use rest_api_kit::store::{Store, StoreEventKind};
//! use serde_json::json;
//! use std::sync::{Arc, Mutex};
//!
//! let store = Store::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! let sub = store.subscribe(move |event| sink.lock().unwrap().push(event.kind));
//!
//! store.save("user", json!({"name": "John"})).unwrap();
//! store.update("user", json!({"age": 31})).unwrap();
//! assert_eq!(store.get("user"), Some(json!({"name": "John", "age": 31})));
//! assert_eq!(*seen.lock().unwrap(), vec![StoreEventKind::Save, StoreEventKind::Update]);
//! sub.unsubscribe();
//! ```

mod action;
pub mod history;
pub mod middleware;
pub mod persistence;
mod selector;

pub use action::{StoreAction, StoreEvent, StoreEventKind, StoreState};
pub use history::{ActionHistory, HistoryRecord};
pub use middleware::{FnMiddleware, Middleware, MiddlewareChain, MiddlewareId, Next};
pub use persistence::{FilePersistence, MemoryPersistence, Persistence};
pub use selector::Selection;

use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::ThreadId;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Default number of history records kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

type Listener = Arc<dyn Fn(&StoreEvent, &StoreState) + Send + Sync>;
type Gate = Box<dyn FnMut(&StoreState) -> bool + Send>;

struct Subscriber {
    id: u64,
    listener: Listener,
    /// Decides whether the subscriber's selection changed; `None` means always notify.
    gate: Option<Mutex<Gate>>,
}

/// Options for [`Store::subscribe_with`].
#[derive(Default)]
pub struct SubscribeOptions {
    immediate: bool,
    gate: Option<Gate>,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a synthetic [`StoreEventKind::Change`] event right away.
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    /// Only notify when the projection changes (compared with `PartialEq`).
    pub fn selector<T, S>(self, selector: S) -> Self
    where
        T: PartialEq + Send + 'static,
        S: Fn(&StoreState) -> T + Send + 'static,
    {
        self.selector_with(selector, |a: &T, b: &T| a == b)
    }

    /// Only notify when `equality` says the projection changed.
    ///
    /// When `equality` reports two projections as equal, the previously
    /// observed projection is kept as the reference for the next comparison.
    pub fn selector_with<T, S, E>(mut self, selector: S, equality: E) -> Self
    where
        T: Send + 'static,
        S: Fn(&StoreState) -> T + Send + 'static,
        E: Fn(&T, &T) -> bool + Send + 'static,
    {
        let mut last: Option<T> = None;
        self.gate = Some(Box::new(move |state: &StoreState| {
            let next = selector(state);
            let changed = match &last {
                Some(prev) => !equality(prev, &next),
                None => true,
            };
            if changed {
                last = Some(next);
            }
            changed
        }));
        self
    }
}

/// Handle to a store subscription.
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to detach the listener.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Subscription {
    store: Weak<StoreInner>,
    id: u64,
}

impl Subscription {
    /// Detach the listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        match self.store.upgrade() {
            Some(inner) => inner.remove_subscriber(self.id),
            None => false,
        }
    }
}

/// Builder for [`Store`].
pub struct StoreBuilder {
    history_capacity: usize,
    persistence: Option<Arc<dyn Persistence>>,
}

impl StoreBuilder {
    /// Defaults can be overridden via env:
    /// - `REST_KIT_HISTORY_CAPACITY` (default 100)
    pub fn new() -> Self {
        let history_capacity = std::env::var("REST_KIT_HISTORY_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_HISTORY_CAPACITY);
        Self {
            history_capacity,
            persistence: None,
        }
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn build(self) -> Store {
        Store {
            inner: Arc::new(StoreInner {
                state: RwLock::new(Arc::new(StoreState::new())),
                subscribers: Mutex::new(Vec::new()),
                middlewares: RwLock::new(MiddlewareChain::new()),
                history: Mutex::new(ActionHistory::new(self.history_capacity)),
                persistence: self.persistence,
                serial: Mutex::new(()),
                dispatcher: Mutex::new(None),
                next_subscriber_id: AtomicU64::new(0),
            }),
        }
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct StoreInner {
    state: RwLock<Arc<StoreState>>,
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    middlewares: RwLock<MiddlewareChain>,
    history: Mutex<ActionHistory>,
    persistence: Option<Arc<dyn Persistence>>,
    /// Serializes dispatches across threads.
    serial: Mutex<()>,
    /// Thread currently inside `dispatch`, for the re-entrancy check.
    dispatcher: Mutex<Option<ThreadId>>,
    next_subscriber_id: AtomicU64,
}

struct DispatchGuard<'a> {
    inner: &'a StoreInner,
    _serial: MutexGuard<'a, ()>,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.inner.dispatcher) = None;
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StoreInner {
    fn enter(&self) -> Result<DispatchGuard<'_>> {
        let me = std::thread::current().id();
        if *lock(&self.dispatcher) == Some(me) {
            return Err(Error::store_with_context(
                "dispatch called while a dispatch is in progress",
                ErrorContext::new()
                    .with_details("a reducer, middleware or listener dispatched synchronously")
                    .with_source("store_dispatch_guard"),
            ));
        }
        let serial = lock(&self.serial);
        *lock(&self.dispatcher) = Some(me);
        Ok(DispatchGuard {
            inner: self,
            _serial: serial,
        })
    }

    fn snapshot(&self) -> Arc<StoreState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn remove_subscriber(&self, id: u64) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let len = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() < len
    }

    fn notify(&self, event: &StoreEvent, state: &StoreState) {
        let subscribers: Vec<Arc<Subscriber>> = lock(&self.subscribers).clone();
        for subscriber in subscribers {
            if let Some(gate) = &subscriber.gate {
                let changed = catch_unwind(AssertUnwindSafe(|| {
                    let mut gate = lock(gate);
                    (*gate)(state)
                }));
                match changed {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(_) => {
                        warn!(subscriber = subscriber.id, "store selector panicked; skipping");
                        continue;
                    }
                }
            }
            deliver(&subscriber, event, state);
        }
    }
}

fn deliver(subscriber: &Subscriber, event: &StoreEvent, state: &StoreState) {
    let listener = subscriber.listener.clone();
    if catch_unwind(AssertUnwindSafe(|| listener(event, state))).is_err() {
        warn!(
            subscriber = subscriber.id,
            event = ?event.kind,
            "store listener panicked; store state preserved"
        );
    }
}

/// Shared, observable key-value cache. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    pub fn new() -> Self {
        StoreBuilder::new().build()
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Apply one action (see the [module docs](self)).
    ///
    /// # Errors
    ///
    /// Returns a store error when called re-entrantly from the thread that is
    /// already dispatching. The action is not applied in that case.
    pub fn dispatch(&self, action: StoreAction) -> Result<()> {
        let _guard = self.inner.enter()?;
        let before = self.inner.snapshot();

        let middlewares = self
            .inner
            .middlewares
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();
        let action = match middleware::run_chain(&middlewares, action, &before) {
            Some(action) => action,
            None => {
                debug!("store action dropped by middleware");
                return Ok(());
            }
        };

        let mut next = (*before).clone();
        action::apply(&mut next, &action);
        let after = Arc::new(next);
        *self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = after.clone();

        let timestamp = now_millis();
        let event = StoreEvent::committed(&action, &before, &after, timestamp);
        lock(&self.inner.history).push(HistoryRecord {
            action,
            timestamp,
            state: after.clone(),
        });

        self.inner.notify(&event, &after);
        Ok(())
    }

    pub fn save(&self, id: impl Into<String>, data: Value) -> Result<()> {
        self.dispatch(StoreAction::save(id, data))
    }

    pub fn update(&self, id: impl Into<String>, data: Value) -> Result<()> {
        self.dispatch(StoreAction::update(id, data))
    }

    pub fn clear(&self, id: impl Into<String>) -> Result<()> {
        self.dispatch(StoreAction::clear(id))
    }

    pub fn clear_all(&self) -> Result<()> {
        self.dispatch(StoreAction::ClearAll)
    }

    pub fn batch(&self, actions: Vec<StoreAction>) -> Result<()> {
        self.dispatch(StoreAction::Batch(actions))
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        self.inner.snapshot().get(id).cloned()
    }

    /// Snapshot of the whole cache; later dispatches do not affect it.
    pub fn get_all(&self) -> Arc<StoreState> {
        self.inner.snapshot()
    }

    pub fn has(&self, id: &str) -> bool {
        self.inner.snapshot().contains_key(id)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.snapshot().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.inner.snapshot().values().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner
            .snapshot()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn size(&self) -> usize {
        self.inner.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.snapshot().is_empty()
    }

    /// Project the current state synchronously.
    pub fn select<T>(&self, selector: impl FnOnce(&StoreState) -> T) -> T {
        selector(&self.inner.snapshot())
    }

    /// Listen to every committed event.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.subscribe_with(listener, SubscribeOptions::new())
    }

    pub fn subscribe_with<F>(&self, listener: F, options: SubscribeOptions) -> Subscription
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.register(
            Arc::new(move |event: &StoreEvent, _state: &StoreState| listener(event)),
            options,
        )
    }

    pub(crate) fn register(&self, listener: Listener, options: SubscribeOptions) -> Subscription {
        self.register_with(options, |_| (listener, ())).0
    }

    /// Attach a subscriber built from the state it starts observing.
    ///
    /// Commits are held off while the subscriber is primed and attached, so
    /// every commit is either part of the starting state or delivered to it.
    pub(crate) fn register_with<R>(
        &self,
        options: SubscribeOptions,
        build: impl FnOnce(&StoreState) -> (Listener, R),
    ) -> (Subscription, R) {
        let SubscribeOptions { immediate, gate } = options;

        // Fails only when this thread is the one dispatching, which already
        // keeps other commits out.
        let guard = self.inner.enter().ok();
        let current = self.inner.snapshot();
        let (listener, extra) = build(current.as_ref());

        // Prime the selection so the first commit is compared against the
        // state at subscribe time.
        let gate = gate.map(|mut gate| {
            let _ = catch_unwind(AssertUnwindSafe(|| gate(current.as_ref())));
            Mutex::new(gate)
        });

        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed) + 1;
        let subscriber = Arc::new(Subscriber { id, listener, gate });
        lock(&self.inner.subscribers).push(subscriber.clone());
        drop(guard);

        if immediate {
            deliver(&subscriber, &StoreEvent::change(now_millis()), &current);
        }

        let subscription = Subscription {
            store: Arc::downgrade(&self.inner),
            id,
        };
        (subscription, extra)
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    /// Drop every listener. Cached values, middleware and history stay.
    pub fn teardown(&self) {
        let dropped = {
            let mut subscribers = lock(&self.inner.subscribers);
            let n = subscribers.len();
            subscribers.clear();
            n
        };
        debug!(listeners = dropped, "store torn down");
    }

    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) -> MiddlewareId {
        self.inner
            .middlewares
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(middleware)
    }

    pub fn add_middleware_fn<F>(&self, name: impl Into<String>, func: F) -> MiddlewareId
    where
        F: Fn(StoreAction, &StoreState, Next<'_>) + Send + Sync + 'static,
    {
        self.add_middleware(Arc::new(FnMiddleware::new(name, func)))
    }

    pub fn remove_middleware(&self, id: MiddlewareId) -> bool {
        self.inner
            .middlewares
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        lock(&self.inner.history).records()
    }

    /// Empty the history without touching cached values.
    pub fn clear_history(&self) {
        lock(&self.inner.history).clear();
    }

    /// Serialize the whole cache under `key` in the persistence backend.
    ///
    /// Returns `false` when no backend is configured or the write failed.
    pub fn save_to_storage(&self, key: &str) -> bool {
        let Some(persistence) = &self.inner.persistence else {
            debug!(key, "no persistence backend configured");
            return false;
        };
        let snapshot = self.inner.snapshot();
        let outcome = serde_json::to_string(snapshot.as_ref())
            .map_err(Error::from)
            .and_then(|json| persistence.set(key, &json));
        match outcome {
            Ok(()) => true,
            Err(e) => {
                warn!(key, backend = persistence.name(), error = %e, "failed to persist store");
                false
            }
        }
    }

    /// Replace the cache with the snapshot stored under `key`.
    ///
    /// The replacement is dispatched as one batch (clear all, then save each
    /// entry), so middleware, history and subscribers see it like any other
    /// commit. Returns `false` when there is no backend, no snapshot, the
    /// snapshot is malformed or the dispatch failed.
    pub fn load_from_storage(&self, key: &str) -> bool {
        let Some(persistence) = &self.inner.persistence else {
            debug!(key, "no persistence backend configured");
            return false;
        };
        let raw = match persistence.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                warn!(
                    key,
                    backend = persistence.name(),
                    error = %e,
                    "failed to read persisted store"
                );
                return false;
            }
        };
        let entries: StoreState = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(key, error = %e, "persisted store is malformed");
                return false;
            }
        };
        let mut actions = Vec::with_capacity(entries.len() + 1);
        actions.push(StoreAction::ClearAll);
        actions.extend(entries.into_iter().map(|(id, data)| StoreAction::Save { id, data }));
        match self.batch(actions) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "failed to restore persisted store");
                false
            }
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("entries", &self.size())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
