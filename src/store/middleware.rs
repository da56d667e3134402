//! Middleware system.
//!
//! Every dispatched action runs through the registered middlewares in
//! registration order before it reaches the store reducer. A middleware hands
//! the action on by calling [`Next::run`], with the original action or a
//! replacement. Returning without calling it drops the action: nothing is
//! committed, recorded or notified.

use super::{StoreAction, StoreState};
use std::sync::Arc;

/// Continuation handed to a [`Middleware`].
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
    state: &'a StoreState,
    out: &'a mut Option<StoreAction>,
}

impl<'a> Next<'a> {
    /// Pass `action` to the rest of the chain (and finally to the reducer).
    pub fn run(self, action: StoreAction) {
        let Next { rest, state, out } = self;
        match rest.split_first() {
            Some((head, tail)) => head.process(
                action,
                state,
                Next {
                    rest: tail,
                    state,
                    out,
                },
            ),
            None => *out = Some(action),
        }
    }
}

pub trait Middleware: Send + Sync {
    fn process(&self, action: StoreAction, state: &StoreState, next: Next<'_>);
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Adapter turning a closure into a [`Middleware`].
pub struct FnMiddleware<F> {
    name: String,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(StoreAction, &StoreState, Next<'_>) + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(StoreAction, &StoreState, Next<'_>) + Send + Sync,
{
    fn process(&self, action: StoreAction, state: &StoreState, next: Next<'_>) {
        (self.func)(action, state, next)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handle returned by registration, used to detach a middleware again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MiddlewareId(u64);

pub struct MiddlewareChain {
    middlewares: Vec<(MiddlewareId, Arc<dyn Middleware>)>,
    next_id: u64,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
            next_id: 0,
        }
    }

    pub fn add(&mut self, m: Arc<dyn Middleware>) -> MiddlewareId {
        self.next_id += 1;
        let id = MiddlewareId(self.next_id);
        self.middlewares.push((id, m));
        id
    }

    pub fn remove(&mut self, id: MiddlewareId) -> bool {
        let len = self.middlewares.len();
        self.middlewares.retain(|(mid, _)| *mid != id);
        self.middlewares.len() < len
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.middlewares
            .iter()
            .map(|(_, m)| m.name().to_string())
            .collect()
    }

    /// Clone the current middleware list so it can run without holding a lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Middleware>> {
        self.middlewares.iter().map(|(_, m)| m.clone()).collect()
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `action` through `middlewares`; `None` means some middleware dropped it.
pub(crate) fn run_chain(
    middlewares: &[Arc<dyn Middleware>],
    action: StoreAction,
    state: &StoreState,
) -> Option<StoreAction> {
    let mut out = None;
    Next {
        rest: middlewares,
        state,
        out: &mut out,
    }
    .run(action);
    out
}
