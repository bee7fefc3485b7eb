//! Subscription registry - ordered commit and action observers

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use strata_core::{ActionRecord, MutationRecord, StoreError};
use tracing::error;

/// Commit observer: `(mutation, post-commit state)`
pub type MutationSubscriber = dyn Fn(&MutationRecord, &Value) + Send + Sync;

type ActionHook = Box<dyn Fn(&ActionRecord, &Value) + Send + Sync>;
type ActionErrorHook = Box<dyn Fn(&ActionRecord, &Value, &StoreError) + Send + Sync>;

/// Share a closure as a commit observer.
///
/// Subscribing the same `Arc` twice has no effect, so keep the returned value
/// if you need that guarantee.
pub fn mutation_subscriber<F>(f: F) -> Arc<MutationSubscriber>
where
    F: Fn(&MutationRecord, &Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Action observer with optional phases
#[derive(Default)]
pub struct ActionSubscriber {
    pub(crate) before: Option<ActionHook>,
    pub(crate) after: Option<ActionHook>,
    pub(crate) error: Option<ActionErrorHook>,
}

impl ActionSubscriber {
    pub fn new() -> Self {
        ActionSubscriber::default()
    }

    /// Called before handlers run, with the state at dispatch time
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&ActionRecord, &Value) + Send + Sync + 'static,
    {
        self.before = Some(Box::new(f));
        self
    }

    /// Called once every handler has succeeded
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(&ActionRecord, &Value) + Send + Sync + 'static,
    {
        self.after = Some(Box::new(f));
        self
    }

    /// Called when a handler failed
    pub fn error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ActionRecord, &Value, &StoreError) + Send + Sync + 'static,
    {
        self.error = Some(Box::new(f));
        self
    }
}

/// Options for `subscribe` / `subscribe_action`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Insert at the front instead of the back
    pub prepend: bool,
}

impl SubscribeOptions {
    pub fn prepend() -> Self {
        SubscribeOptions { prepend: true }
    }
}

/// Ordered list of subscribers, unique by identity
pub struct SubscriberList<T: ?Sized> {
    entries: Vec<Arc<T>>,
}

impl<T: ?Sized> SubscriberList<T> {
    pub fn new() -> Self {
        SubscriberList {
            entries: Vec::new(),
        }
    }

    /// Returns false if this exact subscriber is already present
    pub fn add(&mut self, subscriber: Arc<T>, prepend: bool) -> bool {
        if self.position(&subscriber).is_some() {
            return false;
        }
        if prepend {
            self.entries.insert(0, subscriber);
        } else {
            self.entries.push(subscriber);
        }
        true
    }

    pub fn remove(&mut self, subscriber: &Arc<T>) -> bool {
        match self.position(subscriber) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// Shallow copy used for iteration, so subscribers may unsubscribe mid-pass
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, subscriber: &Arc<T>) -> Option<usize> {
        self.entries.iter().position(|e| Arc::ptr_eq(e, subscriber))
    }
}

impl<T: ?Sized> Default for SubscriberList<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) type SharedList<T> = Arc<Mutex<SubscriberList<T>>>;

/// Returned by `subscribe`; removes the subscriber when called
#[must_use = "dropping a Subscription keeps the subscriber registered"]
pub struct Subscription {
    remove: Box<dyn FnOnce() -> bool + Send + Sync>,
}

impl Subscription {
    pub(crate) fn new<T>(list: &SharedList<T>, subscriber: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let list: Weak<Mutex<SubscriberList<T>>> = Arc::downgrade(list);
        Subscription {
            remove: Box::new(move || {
                list.upgrade()
                    .map(|list| list.lock().remove(&subscriber))
                    .unwrap_or(false)
            }),
        }
    }

    /// Remove the subscriber from all future notifications
    pub fn unsubscribe(self) -> bool {
        (self.remove)()
    }
}

/// Run a subscriber callback, reporting instead of propagating a panic
pub(crate) fn guarded(phase: &str, kind: &str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!("error in {} subscribers of \"{}\"", phase, kind);
    }
}
