//! Local context factory
//!
//! Every installed module gets a [`LocalContext`]: dispatch, commit, getters
//! and state scoped to its namespace. Local type names are qualified with the
//! namespace unless the call asks for root scope. State and getters are looked
//! up on every access, because the live tree and the projection are replaced
//! wholesale by `replace_state` and by resets.

use std::sync::Arc;

use serde_json::Value;
use strata_core::{
    get_nested, CommitOptions, DispatchOptions, IntoRequest, ModulePath, StoreError, StoreResult,
};
use tracing::error;

use crate::{ActionFuture, Getters, Store, WeakStore};

/// Module-scoped view of the store
#[derive(Clone)]
pub struct LocalContext {
    store: WeakStore,
    namespace: Arc<str>,
    path: ModulePath,
}

impl LocalContext {
    pub(crate) fn new(store: WeakStore, namespace: &str, path: ModulePath) -> Self {
        LocalContext {
            store,
            namespace: Arc::from(namespace),
            path,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    /// The module's state slice, read from the live tree
    pub fn state(&self) -> Value {
        self.store
            .upgrade()
            .and_then(|store| get_nested(&store.state(), &self.path).cloned())
            .unwrap_or(Value::Null)
    }

    /// Getters under this module's namespace, keyed locally
    pub fn getters(&self) -> Getters {
        match self.store.upgrade() {
            Some(store) if self.namespace.is_empty() => store.getters(),
            Some(store) => store.local_getters(&self.namespace),
            None => Getters::empty(),
        }
    }

    pub fn commit(&self, request: impl IntoRequest, payload: Value) -> StoreResult<()> {
        self.commit_with(request, payload, CommitOptions::default())
    }

    pub fn commit_with(
        &self,
        request: impl IntoRequest,
        payload: Value,
        options: CommitOptions,
    ) -> StoreResult<()> {
        let store = self.store.upgrade().ok_or(StoreError::Detached)?;
        if self.namespace.is_empty() {
            return store.commit_with(request, payload, options);
        }

        let mut request = request.into_request(payload)?;
        if !options.root {
            let local = request.kind.clone();
            request = request.qualify(&self.namespace);
            if !store.has_mutation(&request.kind) {
                error!(
                    "unknown local mutation type: {}, global type: {}",
                    local, request.kind
                );
                return Ok(());
            }
        }
        store.commit_with(request, Value::Null, options)
    }

    pub fn dispatch(&self, request: impl IntoRequest, payload: Value) -> Option<ActionFuture> {
        self.dispatch_with(request, payload, DispatchOptions::default())
    }

    pub fn dispatch_with(
        &self,
        request: impl IntoRequest,
        payload: Value,
        options: DispatchOptions,
    ) -> Option<ActionFuture> {
        let store = self.store.upgrade()?;
        if self.namespace.is_empty() {
            return store.dispatch(request, payload);
        }

        let mut request = match request.into_request(payload) {
            Ok(request) => request,
            Err(err) => {
                error!("{}", err);
                return None;
            }
        };
        if !options.root {
            let local = request.kind.clone();
            request = request.qualify(&self.namespace);
            if !store.has_action(&request.kind) {
                error!(
                    "unknown local action type: {}, global type: {}",
                    local, request.kind
                );
                return None;
            }
        }
        store.dispatch(request, Value::Null)
    }
}

/// Context handed to action handlers: the module's local view plus root access
#[derive(Clone)]
pub struct ActionContext {
    local: LocalContext,
    store: Store,
}

impl ActionContext {
    pub(crate) fn new(local: LocalContext, store: Store) -> Self {
        ActionContext { local, store }
    }

    pub fn local(&self) -> &LocalContext {
        &self.local
    }

    pub fn commit(&self, request: impl IntoRequest, payload: Value) -> StoreResult<()> {
        self.local.commit(request, payload)
    }

    pub fn commit_with(
        &self,
        request: impl IntoRequest,
        payload: Value,
        options: CommitOptions,
    ) -> StoreResult<()> {
        self.local.commit_with(request, payload, options)
    }

    pub fn dispatch(&self, request: impl IntoRequest, payload: Value) -> Option<ActionFuture> {
        self.local.dispatch(request, payload)
    }

    pub fn dispatch_with(
        &self,
        request: impl IntoRequest,
        payload: Value,
        options: DispatchOptions,
    ) -> Option<ActionFuture> {
        self.local.dispatch_with(request, payload, options)
    }

    pub fn state(&self) -> Value {
        self.local.state()
    }

    pub fn getters(&self) -> Getters {
        self.local.getters()
    }

    pub fn root_state(&self) -> Arc<Value> {
        self.store.state()
    }

    pub fn root_getters(&self) -> Getters {
        self.store.getters()
    }
}
