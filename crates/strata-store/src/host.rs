//! Host context and store injection
//!
//! [`Host`] is the explicit context a store is created in: it replaces any
//! process-wide framework binding. [`inject`] is the single integration point
//! for consumer trees: a consumer that declares its own store gets it, every
//! other consumer inherits its parent's.

use std::sync::Arc;

use crate::{DevtoolsHook, Store};

/// Environment a store is created in
#[derive(Clone, Default)]
pub struct Host {
    devtools: bool,
    devtools_hook: Option<Arc<dyn DevtoolsHook>>,
}

impl Host {
    pub fn new() -> Self {
        Host::default()
    }

    /// Host with an inspector attached; stores connect to it unless told otherwise
    pub fn with_devtools(hook: Arc<dyn DevtoolsHook>) -> Self {
        Host {
            devtools: true,
            devtools_hook: Some(hook),
        }
    }

    pub fn devtools_enabled(&self) -> bool {
        self.devtools
    }

    pub fn devtools_hook(&self) -> Option<Arc<dyn DevtoolsHook>> {
        self.devtools_hook.clone()
    }
}

/// How a consumer declares its store
#[derive(Clone)]
pub enum StoreSource {
    Instance(Store),
    Factory(Arc<dyn Fn() -> Store + Send + Sync>),
}

impl StoreSource {
    pub fn resolve(&self) -> Store {
        match self {
            StoreSource::Instance(store) => store.clone(),
            StoreSource::Factory(factory) => factory(),
        }
    }
}

/// Store reference for a consumer: its own if declared, else its parent's
pub fn inject(own: Option<&StoreSource>, parent: Option<&Store>) -> Option<Store> {
    match own {
        Some(source) => Some(source.resolve()),
        None => parent.cloned(),
    }
}
