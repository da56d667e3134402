//! Observable projections of the store.

use super::{Listener, Store, StoreEvent, StoreState, SubscribeOptions, Subscription};
use std::sync::Arc;
use tokio::sync::watch;

/// A value derived from the store that tracks it over time.
///
/// The projection is recomputed on every commit and published only when the
/// equality function reports a change. Dropping the selection unsubscribes.
pub struct Selection<T> {
    rx: watch::Receiver<T>,
    subscription: Subscription,
}

impl<T> Selection<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Current projection.
    pub fn get(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Receiver that wakes whenever the projection changes.
    pub fn changes(&self) -> watch::Receiver<T> {
        self.rx.clone()
    }
}

impl<T> Drop for Selection<T> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

impl Store {
    /// Track `selector(state)`, publishing when it changes by `PartialEq`.
    pub fn selection<T, S>(&self, selector: S) -> Selection<T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        S: Fn(&StoreState) -> T + Send + Sync + 'static,
    {
        self.selection_with(selector, |a: &T, b: &T| a == b)
    }

    /// Track `selector(state)` with a custom equality function.
    pub fn selection_with<T, S, E>(&self, selector: S, equality: E) -> Selection<T>
    where
        T: Clone + Send + Sync + 'static,
        S: Fn(&StoreState) -> T + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let (subscription, rx) = self.register_with(SubscribeOptions::new(), move |state| {
            let (tx, rx) = watch::channel(selector(state));
            let listener: Listener = Arc::new(move |_event: &StoreEvent, state: &StoreState| {
                let next = selector(state);
                tx.send_if_modified(|current| {
                    if equality(current, &next) {
                        false
                    } else {
                        *current = next;
                        true
                    }
                });
            });
            (listener, rx)
        });

        Selection { rx, subscription }
    }
}
