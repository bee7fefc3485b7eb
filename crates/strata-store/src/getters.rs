//! Getter projection
//!
//! [`Getters`] is a read-only view over the store's registered getters. The
//! root view exposes every qualified name; a namespaced view exposes the
//! getters under one namespace, re-keyed without the prefix. Evaluation goes
//! through the store's memo cache: reading a getter twice without an
//! intervening state change yields the same `Arc`.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::{Map, Value};
use tracing::error;

use crate::WeakStore;

/// Read-only view of getters, optionally scoped to a namespace
#[derive(Clone)]
pub struct Getters {
    store: WeakStore,
    prefix: Arc<str>,
    keys: Arc<IndexSet<String>>,
}

impl Getters {
    pub(crate) fn new(store: WeakStore, prefix: &str, keys: Arc<IndexSet<String>>) -> Self {
        Getters {
            store,
            prefix: Arc::from(prefix),
            keys,
        }
    }

    /// A view with no getters and no store behind it
    pub fn empty() -> Self {
        Getters::new(WeakStore::default(), "", Arc::new(IndexSet::new()))
    }

    /// Namespace this view is scoped to (empty for the root view)
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Evaluate (or reuse the cached result of) a getter
    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        if !self.contains(key) {
            error!("unknown getter: {}{}", self.prefix, key);
            return None;
        }
        let store = self.store.upgrade()?;
        store.evaluate_getter(&format!("{}{}", self.prefix, key))
    }

    /// Owned result of a getter; `Null` when unknown
    pub fn value(&self, key: &str) -> Value {
        self.get(key)
            .map(|value| (*value).clone())
            .unwrap_or(Value::Null)
    }

    /// Evaluate every getter into one object
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .keys()
            .map(|key| (key.to_string(), self.value(key)))
            .collect();
        Value::Object(map)
    }

    /// View of the getters under `namespace`, keyed without the prefix
    pub(crate) fn scoped(&self, namespace: &str) -> Getters {
        let keys: IndexSet<String> = self
            .keys
            .iter()
            .filter_map(|qualified| qualified.strip_prefix(namespace))
            .map(str::to_string)
            .collect();
        Getters {
            store: self.store.clone(),
            prefix: Arc::from(format!("{}{}", self.prefix, namespace).as_str()),
            keys: Arc::new(keys),
        }
    }
}

impl fmt::Debug for Getters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Getters")
            .field("prefix", &self.prefix)
            .field("keys", &self.keys)
            .finish()
    }
}
