//! Module definitions
//!
//! A [`ModuleDef`] is the authoring-time description of a module: its initial
//! state, its getters, mutations and actions, and its nested modules. It is
//! built either with the fluent builder below or from a JSON manifest
//! (see [`crate::manifest`]).
//!
//! Declarations are kept as [`Declared`] values so that a definition loaded
//! from data can carry entries that do not resolve to a handler. The module
//! tree rejects those with a shape error when the module is registered.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::Value;
use strata_core::StoreResult;

use crate::{ActionContext, Getters};

/// Mutation handler: `(local_state, payload)`
pub type MutationFn = Arc<dyn Fn(&mut Value, &Value) + Send + Sync>;

/// Getter: `(local_state, local_getters, root_state, root_getters)`
pub type GetterFn = Arc<dyn Fn(&Value, &Getters, &Value, &Getters) -> Value + Send + Sync>;

/// Pending result of an action
pub type ActionFuture = BoxFuture<'static, StoreResult<Value>>;

/// Action handler: `(context, payload)`
pub type ActionFn = Arc<dyn Fn(ActionContext, Value) -> ActionFuture + Send + Sync>;

/// Zero-argument state factory
pub type StateFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// A declaration as authored: either a handler or something that is not one
#[derive(Clone)]
pub enum Declared<H> {
    Handler(H),
    /// Entry that does not resolve to a handler; carries what was found
    Malformed(String),
}

/// The two declaration forms of an action
#[derive(Clone)]
pub enum ActionDecl {
    /// Plain handler, registered under the module's namespace
    Direct(ActionFn),
    /// Handler with options; `root` registers it unqualified
    WithOptions { handler: ActionFn, root: bool },
}

/// Initial state of a module
#[derive(Clone)]
pub enum StateInit {
    Value(Value),
    /// Invoked once per module construction so store instances do not share state
    Factory(StateFactory),
}

impl StateInit {
    pub fn produce(&self) -> Value {
        match self {
            StateInit::Value(value) => value.clone(),
            StateInit::Factory(factory) => factory(),
        }
    }
}

/// Authoring-time module description
#[derive(Clone, Default)]
pub struct ModuleDef {
    pub state: Option<StateInit>,
    pub namespaced: bool,
    pub getters: Option<IndexMap<String, Declared<GetterFn>>>,
    pub mutations: Option<IndexMap<String, Declared<MutationFn>>>,
    pub actions: Option<IndexMap<String, Declared<ActionDecl>>>,
    pub modules: IndexMap<String, ModuleDef>,
}

impl fmt::Debug for ModuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDef")
            .field("namespaced", &self.namespaced)
            .field("getters", &self.getters.as_ref().map(|m| m.keys().collect::<Vec<_>>()))
            .field("mutations", &self.mutations.as_ref().map(|m| m.keys().collect::<Vec<_>>()))
            .field("actions", &self.actions.as_ref().map(|m| m.keys().collect::<Vec<_>>()))
            .field("modules", &self.modules)
            .finish_non_exhaustive()
    }
}

impl ModuleDef {
    pub fn new() -> Self {
        ModuleDef::default()
    }

    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(StateInit::Value(state));
        self
    }

    pub fn state_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.state = Some(StateInit::Factory(Arc::new(factory)));
        self
    }

    pub fn namespaced(mut self, namespaced: bool) -> Self {
        self.namespaced = namespaced;
        self
    }

    pub fn getter<F>(self, key: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Value, &Getters, &Value, &Getters) -> Value + Send + Sync + 'static,
    {
        self.declare_getter(key, Declared::Handler(Arc::new(getter)))
    }

    pub fn mutation<F>(self, key: impl Into<String>, mutation: F) -> Self
    where
        F: Fn(&mut Value, &Value) + Send + Sync + 'static,
    {
        self.declare_mutation(key, Declared::Handler(Arc::new(mutation)))
    }

    /// Asynchronous action
    pub fn action<F, Fut>(self, key: impl Into<String>, action: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StoreResult<Value>> + Send + 'static,
    {
        self.declare_action(key, Declared::Handler(ActionDecl::Direct(async_handler(action))))
    }

    /// Synchronous action; runs when dispatched and settles immediately
    pub fn action_sync<F>(self, key: impl Into<String>, action: F) -> Self
    where
        F: Fn(ActionContext, Value) -> StoreResult<Value> + Send + Sync + 'static,
    {
        self.declare_action(key, Declared::Handler(ActionDecl::Direct(sync_handler(action))))
    }

    /// Asynchronous action registered under its bare key even in a namespaced module
    pub fn root_action<F, Fut>(self, key: impl Into<String>, action: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StoreResult<Value>> + Send + 'static,
    {
        self.declare_action(
            key,
            Declared::Handler(ActionDecl::WithOptions {
                handler: async_handler(action),
                root: true,
            }),
        )
    }

    pub fn module(mut self, key: impl Into<String>, module: ModuleDef) -> Self {
        self.modules.insert(key.into(), module);
        self
    }

    pub fn declare_getter(mut self, key: impl Into<String>, decl: Declared<GetterFn>) -> Self {
        self.getters.get_or_insert_with(IndexMap::new).insert(key.into(), decl);
        self
    }

    pub fn declare_mutation(mut self, key: impl Into<String>, decl: Declared<MutationFn>) -> Self {
        self.mutations.get_or_insert_with(IndexMap::new).insert(key.into(), decl);
        self
    }

    pub fn declare_action(mut self, key: impl Into<String>, decl: Declared<ActionDecl>) -> Self {
        self.actions.get_or_insert_with(IndexMap::new).insert(key.into(), decl);
        self
    }
}

/// Box an async handler into an [`ActionFn`]
pub fn async_handler<F, Fut>(action: F) -> ActionFn
where
    F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StoreResult<Value>> + Send + 'static,
{
    Arc::new(move |ctx, payload| action(ctx, payload).boxed())
}

/// Wrap a synchronous handler into an [`ActionFn`]; its result becomes an
/// already-settled future
pub fn sync_handler<F>(action: F) -> ActionFn
where
    F: Fn(ActionContext, Value) -> StoreResult<Value> + Send + Sync + 'static,
{
    Arc::new(move |ctx, payload| future::ready(action(ctx, payload)).boxed())
}
