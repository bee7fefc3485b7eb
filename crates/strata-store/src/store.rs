//! Store
//!
//! The [`Store`] owns the module tree, the live state, the handler registry and
//! the subscriber lists. Handlers are installed into a [`Registry`] keyed by
//! fully-qualified type; the registry is swapped atomically on every reset, so
//! a pipeline that already looked up its handlers is never disturbed by a
//! concurrent register or hot update.
//!
//! Lock discipline: user code (handlers, getters, subscribers, watchers) is
//! never called with a store lock held, with the exception of mutation
//! handlers, which run under the state write lock and only see their own
//! arguments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::future::{self, try_join_all};
use futures::task::noop_waker_ref;
use futures::{FutureExt, TryFutureExt};
use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use strata_core::{
    get_nested, get_nested_mut, ActionRecord, CommitOptions, DispatchOptions, IntoRequest,
    ModulePath, MutationRecord, StoreError, StoreResult,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::devtools::{self, DevtoolsEvent, DevtoolsHook};
use crate::subscription::{guarded, SharedList};
use crate::{
    ActionContext, ActionFn, ActionFuture, ActionSubscriber, GetterFn, Getters, Host,
    LocalContext, ModuleDef, ModuleNode, ModuleTree, MutationFn, MutationSubscriber, Observable,
    SubscribeOptions, SubscriberList, Subscription, WatcherId,
};

/// Store plugin: called once with the finished store
pub type Plugin = Arc<dyn Fn(&Store) + Send + Sync>;

type WrappedMutation = Arc<dyn Fn(&mut Value, &Value) + Send + Sync>;
type WrappedAction = Arc<dyn Fn(Value) -> ActionFuture + Send + Sync>;
type WrappedGetter = Arc<dyn Fn(&Store) -> Value + Send + Sync>;

static NULL: Value = Value::Null;

/// Store construction options
#[derive(Clone, Default)]
pub struct StoreOptions {
    pub root: ModuleDef,
    pub strict: bool,
    pub plugins: Vec<Plugin>,
    /// Connect to the host's inspector; defaults to the host setting
    pub devtools: Option<bool>,
    pub host: Option<Arc<Host>>,
}

impl StoreOptions {
    /// Options for `root` with a default host
    pub fn new(root: ModuleDef) -> Self {
        StoreOptions {
            root,
            host: Some(Arc::new(Host::default())),
            ..Default::default()
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn plugin<F>(mut self, plugin: F) -> Self
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn devtools(mut self, enabled: bool) -> Self {
        self.devtools = Some(enabled);
        self
    }

    pub fn host(mut self, host: Host) -> Self {
        self.host = Some(Arc::new(host));
        self
    }
}

/// Options for [`Store::register_module_with`]
#[derive(Clone, Copy, Debug, Default)]
pub struct RegisterOptions {
    /// Keep whatever state already sits at the module's path
    pub preserve_state: bool,
}

/// Options for [`Store::watch_with`]
#[derive(Clone, Copy, Debug, Default)]
pub struct WatchOptions {
    /// Call back once with the current value on registration
    pub immediate: bool,
}

/// Handler tables keyed by fully-qualified type
#[derive(Clone, Default)]
struct Registry {
    mutations: HashMap<String, Vec<WrappedMutation>>,
    actions: HashMap<String, Vec<WrappedAction>>,
    getters: IndexMap<String, WrappedGetter>,
    namespaces: HashMap<String, ModulePath>,
}

struct StoreInner {
    strict: bool,
    committing: Arc<AtomicBool>,
    modules: RwLock<ModuleTree>,
    registry: RwLock<Arc<Registry>>,
    root_getters: RwLock<Getters>,
    local_getters: Mutex<HashMap<String, Getters>>,
    getter_cache: Mutex<HashMap<String, (u64, Arc<Value>)>>,
    subscribers: SharedList<MutationSubscriber>,
    action_subscribers: SharedList<ActionSubscriber>,
    state: Observable,
    devtools: RwLock<Option<Arc<dyn DevtoolsHook>>>,
    host: Arc<Host>,
}

/// Hierarchical state container
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Non-owning store handle held by contexts and getter views
#[derive(Clone, Default)]
pub struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.0.upgrade().map(|inner| Store { inner })
    }
}

/// Returned by [`Store::watch`]
#[must_use = "dropping a WatchHandle keeps the watcher registered"]
pub struct WatchHandle {
    store: WeakStore,
    id: WatcherId,
}

impl WatchHandle {
    /// Stop watching. Returns whether the watcher was still registered.
    pub fn stop(self) -> bool {
        self.store
            .upgrade()
            .map(|store| store.inner.state.unwatch(self.id))
            .unwrap_or(false)
    }
}

/// Restores the committing flag when a guarded section ends, even on unwind
struct CommitGuard<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::SeqCst);
    }
}

impl Store {
    /// Build a store from its options.
    ///
    /// Modules are installed depth-first from the root, then strict mode is
    /// armed, then plugins run in order, then the inspector is connected.
    pub fn new(options: StoreOptions) -> StoreResult<Store> {
        let host = options.host.ok_or_else(|| {
            StoreError::Precondition("a Host must be supplied before creating a store".to_string())
        })?;

        let tree = ModuleTree::new(options.root)?;
        let initial = tree.root().state().clone();

        let store = Store {
            inner: Arc::new(StoreInner {
                strict: options.strict,
                committing: Arc::new(AtomicBool::new(false)),
                modules: RwLock::new(tree),
                registry: RwLock::new(Arc::new(Registry::default())),
                root_getters: RwLock::new(Getters::empty()),
                local_getters: Mutex::new(HashMap::new()),
                getter_cache: Mutex::new(HashMap::new()),
                subscribers: Arc::new(Mutex::new(SubscriberList::new())),
                action_subscribers: Arc::new(Mutex::new(SubscriberList::new())),
                state: Observable::new(initial),
                devtools: RwLock::new(None),
                host: Arc::clone(&host),
            }),
        };

        let mut registry = Registry::default();
        let mut attachments = Vec::new();
        {
            let mut tree = store.inner.modules.write();
            store.install_module(
                &mut registry,
                &mut attachments,
                &ModulePath::root(),
                "",
                tree.root_mut(),
                false,
            );
        }
        store.attach_states(attachments)?;
        store.reset_projection(registry, false)?;

        if options.strict {
            store.enable_strict_mode();
        }

        debug!(
            "store created: {} mutation types, {} action types, {} getters",
            store.registry().mutations.len(),
            store.registry().actions.len(),
            store.getters().len()
        );

        for plugin in &options.plugins {
            plugin(&store);
        }

        if options.devtools.unwrap_or(host.devtools_enabled()) {
            if let Some(hook) = host.devtools_hook() {
                devtools::attach(&store, hook);
            }
        }

        Ok(store)
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore(Arc::downgrade(&self.inner))
    }

    pub fn host(&self) -> &Host {
        &self.inner.host
    }

    /// Current root state
    pub fn state(&self) -> Arc<Value> {
        self.inner.state.snapshot()
    }

    /// Root getter view, keyed by qualified name
    pub fn getters(&self) -> Getters {
        self.inner.root_getters.read().clone()
    }

    pub fn is_strict(&self) -> bool {
        self.inner.strict
    }

    /// Whether a guarded write is in progress
    pub fn is_committing(&self) -> bool {
        self.inner.committing.load(Ordering::SeqCst)
    }

    pub fn commit(&self, request: impl IntoRequest, payload: Value) -> StoreResult<()> {
        self.commit_with(request, payload, CommitOptions::default())
    }

    /// Run every mutation handler registered under the type, in registration
    /// order, inside one guarded write; then notify subscribers with the
    /// post-commit state.
    ///
    /// An unknown type is reported and ignored.
    pub fn commit_with(
        &self,
        request: impl IntoRequest,
        payload: Value,
        options: CommitOptions,
    ) -> StoreResult<()> {
        let request = request.into_request(payload)?;
        let registry = self.registry();
        let Some(handlers) = registry.mutations.get(&request.kind) else {
            error!("{}", StoreError::UnknownMutation(request.kind));
            return Ok(());
        };

        let payload = &request.payload;
        self.with_commit(|| {
            self.inner.state.write(|root| {
                for handler in handlers {
                    handler(root, payload);
                }
            })
        })?;

        let mutation = MutationRecord::from(request);
        let state = self.state();
        let subscribers = self.inner.subscribers.lock().snapshot();
        for subscriber in subscribers {
            guarded("mutation", &mutation.kind, || subscriber(&mutation, &state));
        }

        if options.silent {
            warn!(
                "{}: Silent option has been removed. Use the filter functionality in the devtools",
                mutation.kind
            );
        }
        Ok(())
    }

    /// Run every action handler registered under the type.
    ///
    /// Returns `None` (after reporting) for an unknown type or a malformed
    /// request. Otherwise the returned future resolves to the handler's value,
    /// or to an array of every handler's value when several are registered;
    /// it fails with the first handler failure. Action subscribers' `before`
    /// hooks run before this returns; `after`/`error` hooks run when the
    /// action settles.
    ///
    /// The action does not depend on the returned future being polled: it
    /// runs until its first suspension here, and the rest is spawned onto the
    /// current tokio runtime. Dropping the future never cancels the action.
    pub fn dispatch(&self, request: impl IntoRequest, payload: Value) -> Option<ActionFuture> {
        let request = match request.into_request(payload) {
            Ok(request) => request,
            Err(err) => {
                error!("{}", err);
                return None;
            }
        };

        let registry = self.registry();
        let Some(handlers) = registry.actions.get(&request.kind) else {
            error!("{}", StoreError::UnknownAction(request.kind));
            return None;
        };

        let action = ActionRecord::from(request);
        let state = self.state();
        let subscribers = self.inner.action_subscribers.lock().snapshot();
        for subscriber in &subscribers {
            if let Some(before) = &subscriber.before {
                guarded("before", &action.kind, || before(&action, &state));
            }
        }

        let result = match handlers.as_slice() {
            [handler] => handler(action.payload.clone()),
            handlers => try_join_all(handlers.iter().map(|handler| handler(action.payload.clone())))
                .map_ok(Value::Array)
                .boxed(),
        };

        let kind = action.kind.clone();
        let store = self.downgrade();
        let settlement = async move {
            let outcome = result.await;
            let Some(store) = store.upgrade() else {
                return outcome;
            };

            let state = store.state();
            let subscribers = store.inner.action_subscribers.lock().snapshot();
            match &outcome {
                Ok(_) => {
                    for subscriber in &subscribers {
                        if let Some(after) = &subscriber.after {
                            guarded("after", &action.kind, || after(&action, &state));
                        }
                    }
                }
                Err(err) => {
                    for subscriber in &subscribers {
                        if let Some(on_error) = &subscriber.error {
                            guarded("error", &action.kind, || on_error(&action, &state, err));
                        }
                    }
                }
            }
            outcome
        }
        .boxed();
        Some(settle(settlement, &kind))
    }

    /// Root-scope dispatch; `root` has nothing to escape at this level
    pub fn dispatch_with(
        &self,
        request: impl IntoRequest,
        payload: Value,
        _options: DispatchOptions,
    ) -> Option<ActionFuture> {
        self.dispatch(request, payload)
    }

    /// Dispatch and hand back the tokio task awaiting the outcome
    pub fn dispatch_detached(
        &self,
        request: impl IntoRequest,
        payload: Value,
    ) -> Option<JoinHandle<StoreResult<Value>>> {
        self.dispatch(request, payload).map(tokio::spawn)
    }

    pub fn subscribe(&self, subscriber: Arc<MutationSubscriber>) -> Subscription {
        self.subscribe_with(subscriber, SubscribeOptions::default())
    }

    /// Observe every commit. Subscribing the same subscriber twice is a no-op.
    pub fn subscribe_with(
        &self,
        subscriber: Arc<MutationSubscriber>,
        options: SubscribeOptions,
    ) -> Subscription {
        self.inner
            .subscribers
            .lock()
            .add(Arc::clone(&subscriber), options.prepend);
        Subscription::new(&self.inner.subscribers, subscriber)
    }

    pub fn subscribe_action(&self, subscriber: Arc<ActionSubscriber>) -> Subscription {
        self.subscribe_action_with(subscriber, SubscribeOptions::default())
    }

    pub fn subscribe_action_with(
        &self,
        subscriber: Arc<ActionSubscriber>,
        options: SubscribeOptions,
    ) -> Subscription {
        self.inner
            .action_subscribers
            .lock()
            .add(Arc::clone(&subscriber), options.prepend);
        Subscription::new(&self.inner.action_subscribers, subscriber)
    }

    pub fn watch<S, C>(&self, selector: S, callback: C) -> WatchHandle
    where
        S: Fn(&Value, &Getters) -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        self.watch_with(selector, callback, WatchOptions::default())
    }

    /// Watch a value derived from state and getters.
    ///
    /// The selector is re-run after every state change; the callback receives
    /// `(new, old)` whenever the selected value differs from the last one.
    pub fn watch_with<S, C>(&self, selector: S, callback: C, options: WatchOptions) -> WatchHandle
    where
        S: Fn(&Value, &Getters) -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let initial = selector(&self.state(), &self.getters());
        if options.immediate {
            callback(&initial, &Value::Null);
        }

        let last = Mutex::new(initial);
        let weak = self.downgrade();
        let id = self.inner.state.watch_deep(Arc::new(move |state: &Value| -> StoreResult<()> {
            let Some(store) = weak.upgrade() else {
                return Ok(());
            };
            let next = selector(state, &store.getters());
            let previous = {
                let mut last = last.lock();
                if *last == next {
                    return Ok(());
                }
                std::mem::replace(&mut *last, next.clone())
            };
            callback(&next, &previous);
            Ok(())
        }));

        WatchHandle {
            store: self.downgrade(),
            id,
        }
    }

    /// Swap the whole root state inside a guarded write
    pub fn replace_state(&self, state: Value) -> StoreResult<()> {
        self.with_commit(|| self.inner.state.replace(state))
            .map(|_| ())
    }

    /// Write the state directly, outside any mutation handler.
    ///
    /// Under strict mode this reports [`StoreError::IllegalMutation`]; the
    /// write itself is kept.
    pub fn write_state(&self, f: impl FnOnce(&mut Value)) -> StoreResult<()> {
        self.inner.state.write(f)
    }

    pub fn register_module(&self, path: impl Into<ModulePath>, module: ModuleDef) -> StoreResult<()> {
        self.register_module_with(path, module, RegisterOptions::default())
    }

    /// Add a module (and its nested modules) at runtime.
    ///
    /// Only the new subtree is installed; existing registrations are kept.
    pub fn register_module_with(
        &self,
        path: impl Into<ModulePath>,
        module: ModuleDef,
        options: RegisterOptions,
    ) -> StoreResult<()> {
        let path = path.into();
        if path.is_root() {
            return Err(StoreError::RootModule);
        }

        // state factories may read the store: build before locking the tree
        let node = ModuleTree::build(&path, module, true)?;
        let mut registry = (*self.registry()).clone();
        let mut attachments = Vec::new();
        {
            let mut tree = self.inner.modules.write();
            tree.attach(&path, node)?;
            let namespace = tree.namespace(&path)?;
            let node = tree
                .get_mut(&path)
                .ok_or_else(|| StoreError::Lookup(path.clone()))?;
            self.install_module(
                &mut registry,
                &mut attachments,
                &path,
                &namespace,
                node,
                options.preserve_state,
            );
        }

        self.attach_states(attachments)?;
        self.reset_projection(registry, false)?;
        debug!("registered module \"{}\"", path);
        Ok(())
    }

    /// Remove a dynamically registered module and its state slice.
    ///
    /// Static modules and unknown paths are left alone.
    pub fn unregister_module(&self, path: impl Into<ModulePath>) -> StoreResult<()> {
        let path = path.into();
        if !self.inner.modules.write().unregister(&path) {
            return Ok(());
        }

        self.with_commit(|| {
            self.inner.state.write(|root| {
                let Some(key) = path.last() else {
                    return;
                };
                if let Some(Value::Object(parent)) = get_nested_mut(root, &path.parent()) {
                    parent.remove(key);
                }
            })
        })?;
        self.reset_store(false)?;
        debug!("unregistered module \"{}\"", path);
        Ok(())
    }

    pub fn has_module(&self, path: impl Into<ModulePath>) -> bool {
        self.inner.modules.read().is_registered(&path.into())
    }

    /// Swap in new handlers for existing modules, keeping state
    pub fn hot_update(&self, module: ModuleDef) -> StoreResult<()> {
        self.inner.modules.write().update(module)?;
        self.reset_store(true)?;
        debug!("hot update applied");
        Ok(())
    }

    /// Local context of the namespaced module registered under `namespace`
    pub fn module_context(&self, namespace: &str) -> Option<LocalContext> {
        let mut namespace = namespace.to_string();
        if !namespace.is_empty() && !namespace.ends_with('/') {
            namespace.push('/');
        }

        let tree = self.inner.modules.read();
        if namespace.is_empty() {
            return tree.root().context().cloned();
        }

        let registry = self.registry();
        let Some(path) = registry.namespaces.get(&namespace) else {
            error!("module namespace not found in module_context(): {}", namespace);
            return None;
        };
        tree.get(path).and_then(|node| node.context().cloned())
    }

    /// `commit` bound to this store
    pub fn commit_fn(&self) -> impl Fn(&str, Value) -> StoreResult<()> + Send + Sync + 'static {
        let store = self.clone();
        move |kind, payload| store.commit(kind, payload)
    }

    /// `dispatch` bound to this store
    pub fn dispatch_fn(&self) -> impl Fn(&str, Value) -> Option<ActionFuture> + Send + Sync + 'static {
        let store = self.clone();
        move |kind, payload| store.dispatch(kind, payload)
    }

    pub(crate) fn has_mutation(&self, kind: &str) -> bool {
        self.registry().mutations.contains_key(kind)
    }

    pub(crate) fn has_action(&self, kind: &str) -> bool {
        self.registry().actions.contains_key(kind)
    }

    /// Getter result for the current state version, computed at most once
    pub(crate) fn evaluate_getter(&self, name: &str) -> Option<Arc<Value>> {
        let version = self.inner.state.version();
        if let Some((cached, value)) = self.inner.getter_cache.lock().get(name) {
            if *cached == version {
                return Some(Arc::clone(value));
            }
        }

        let Some(getter) = self.registry().getters.get(name).cloned() else {
            error!("{}", StoreError::UnknownGetter(name.to_string()));
            return None;
        };
        let value = Arc::new(getter(self));
        self.inner
            .getter_cache
            .lock()
            .insert(name.to_string(), (version, Arc::clone(&value)));
        Some(value)
    }

    /// Getter view for a namespace, cached until the next reset
    pub(crate) fn local_getters(&self, namespace: &str) -> Getters {
        if let Some(getters) = self.inner.local_getters.lock().get(namespace) {
            return getters.clone();
        }
        let getters = self.getters().scoped(namespace);
        self.inner
            .local_getters
            .lock()
            .insert(namespace.to_string(), getters.clone());
        getters
    }

    pub(crate) fn set_devtools_hook(&self, hook: Arc<dyn DevtoolsHook>) {
        *self.inner.devtools.write() = Some(hook);
    }

    pub(crate) fn devtools_hook(&self) -> Option<Arc<dyn DevtoolsHook>> {
        self.inner.devtools.read().clone()
    }

    /// Run `f` with the committing flag raised; the previous value is restored after
    pub(crate) fn with_commit<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = self.inner.committing.swap(true, Ordering::SeqCst);
        let _guard = CommitGuard {
            flag: &self.inner.committing,
            previous,
        };
        f()
    }

    fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.inner.registry.read())
    }

    fn enable_strict_mode(&self) {
        let committing = Arc::clone(&self.inner.committing);
        self.inner.state.watch_deep(Arc::new(move |_: &Value| {
            if committing.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(StoreError::IllegalMutation)
            }
        }));
    }

    /// Register a module's handlers (and its descendants') into `registry`.
    ///
    /// State slices to attach are queued in `attachments`, parents first; a hot
    /// install leaves state alone.
    fn install_module(
        &self,
        registry: &mut Registry,
        attachments: &mut Vec<(ModulePath, Value)>,
        path: &ModulePath,
        namespace: &str,
        node: &mut ModuleNode,
        hot: bool,
    ) {
        if node.namespaced() {
            if let Some(existing) = registry.namespaces.get(namespace) {
                if existing != path {
                    error!(
                        "duplicate namespace {} for the namespaced module {}",
                        namespace, path
                    );
                }
            }
            registry
                .namespaces
                .insert(namespace.to_string(), path.clone());
        }

        if !path.is_root() && !hot {
            attachments.push((path.clone(), node.state().clone()));
        }

        let context = LocalContext::new(self.downgrade(), namespace, path.clone());
        node.context = Some(context.clone());

        for (key, mutation) in node.mutations() {
            registry
                .mutations
                .entry(format!("{}{}", namespace, key))
                .or_default()
                .push(wrap_mutation(path, mutation));
        }

        for (key, entry) in node.actions() {
            let kind = if entry.root {
                key.clone()
            } else {
                format!("{}{}", namespace, key)
            };
            registry
                .actions
                .entry(kind)
                .or_default()
                .push(self.wrap_action(&context, &entry.handler));
        }

        for (key, getter) in node.getters() {
            let kind = format!("{}{}", namespace, key);
            if registry.getters.contains_key(&kind) {
                error!("duplicate getter key: {}", kind);
                continue;
            }
            registry
                .getters
                .insert(kind, wrap_getter(path, namespace, getter));
        }

        for (key, child) in node.children_mut() {
            let child_path = path.child(key.as_str());
            let child_namespace = if child.namespaced() {
                format!("{}{}/", namespace, key)
            } else {
                namespace.to_string()
            };
            self.install_module(
                registry,
                attachments,
                &child_path,
                &child_namespace,
                child,
                hot,
            );
        }
    }

    fn wrap_action(&self, context: &LocalContext, handler: &ActionFn) -> WrappedAction {
        let store = self.downgrade();
        let context = context.clone();
        let handler = Arc::clone(handler);
        Arc::new(move |payload: Value| {
            let Some(store) = store.upgrade() else {
                return future::ready(Err(StoreError::Detached)).boxed();
            };
            let hook = store.devtools_hook();
            let result = handler(ActionContext::new(context.clone(), store), payload);
            match hook {
                Some(hook) => result
                    .inspect_err(move |err| {
                        hook.emit(DevtoolsEvent::Error {
                            message: err.to_string(),
                        })
                    })
                    .boxed(),
                None => result,
            }
        })
    }

    /// Insert each queued module state under its parent's slice
    fn attach_states(&self, attachments: Vec<(ModulePath, Value)>) -> StoreResult<()> {
        if attachments.is_empty() {
            return Ok(());
        }

        self.with_commit(|| {
            self.inner.state.write(|root| {
                for (path, state) in attachments {
                    let Some(key) = path.last() else {
                        continue;
                    };
                    match get_nested_mut(root, &path.parent()) {
                        Some(Value::Object(parent)) => {
                            if parent.contains_key(key) {
                                warn!(
                                    "state field \"{}\" was overridden by a module with the same name at \"{}\"",
                                    key, path
                                );
                            }
                            parent.insert(key.to_string(), state);
                        }
                        _ => error!(
                            "cannot attach state of module \"{}\": parent state is not an object",
                            path
                        ),
                    }
                }
            })
        })
    }

    /// Publish a new registry and rebuild the getter views over it
    fn reset_projection(&self, registry: Registry, hot: bool) -> StoreResult<()> {
        let keys: IndexSet<String> = registry.getters.keys().cloned().collect();
        *self.inner.registry.write() = Arc::new(registry);
        *self.inner.root_getters.write() = Getters::new(self.downgrade(), "", Arc::new(keys));
        self.inner.local_getters.lock().clear();
        self.inner.getter_cache.lock().clear();

        if hot {
            // getters may have been swapped: force dependents to re-evaluate
            self.with_commit(|| self.inner.state.touch())?;
        }
        Ok(())
    }

    /// Reinstall every module from the tree into a fresh registry
    fn reset_store(&self, hot: bool) -> StoreResult<()> {
        let mut registry = Registry::default();
        {
            let mut tree = self.inner.modules.write();
            self.install_module(
                &mut registry,
                &mut Vec::new(),
                &ModulePath::root(),
                "",
                tree.root_mut(),
                true,
            );
        }
        self.reset_projection(registry, hot)
    }
}

fn wrap_mutation(path: &ModulePath, handler: &MutationFn) -> WrappedMutation {
    let path = path.clone();
    let handler = Arc::clone(handler);
    Arc::new(move |root: &mut Value, payload: &Value| match get_nested_mut(root, &path) {
        Some(local) => handler(local, payload),
        None => warn!("state of module \"{}\" is missing, mutation skipped", path),
    })
}

fn wrap_getter(path: &ModulePath, namespace: &str, handler: &GetterFn) -> WrappedGetter {
    let path = path.clone();
    let namespace = namespace.to_string();
    let handler = Arc::clone(handler);
    Arc::new(move |store: &Store| {
        let root = store.state();
        let local = get_nested(&root, &path).unwrap_or(&NULL);
        let root_getters = store.getters();
        let local_getters = if namespace.is_empty() {
            root_getters.clone()
        } else {
            store.local_getters(&namespace)
        };
        handler(local, &local_getters, &root, &root_getters)
    })
}

/// Drive a dispatched action independently of its caller.
///
/// Actions that settle on the first poll are returned already resolved.
/// Pending ones are spawned onto the current runtime and the returned future
/// awaits the task. Outside a runtime the remainder stays lazy.
fn settle(mut settlement: ActionFuture, kind: &str) -> ActionFuture {
    let mut cx = Context::from_waker(noop_waker_ref());
    if let Poll::Ready(outcome) = settlement.poll_unpin(&mut cx) {
        return future::ready(outcome).boxed();
    }

    match Handle::try_current() {
        Ok(runtime) => {
            let task = runtime.spawn(settlement);
            async move { task.await.unwrap_or_else(|err| Err(StoreError::action(err))) }.boxed()
        }
        Err(_) => {
            warn!(
                "action {} suspended outside a tokio runtime; it only progresses when awaited",
                kind
            );
            settlement
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mutation_subscriber, ActionDecl, Declared, TravelHandler};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn store(root: ModuleDef) -> Store {
        Store::new(StoreOptions::new(root)).unwrap()
    }

    fn counter() -> ModuleDef {
        ModuleDef::new()
            .state(json!({ "count": 0 }))
            .mutation("increment", |state, payload| {
                let by = payload.as_i64().unwrap_or(1);
                state["count"] = json!(state["count"].as_i64().unwrap() + by);
            })
            .getter("double", |state, _, _, _| {
                json!(state["count"].as_i64().unwrap() * 2)
            })
    }

    #[test]
    fn test_commit_updates_state_and_getters() {
        let store = store(counter());
        store.commit("increment", json!(2)).unwrap();

        assert_eq!(store.state()["count"], json!(2));
        assert_eq!(store.getters().value("double"), json!(4));
    }

    #[test]
    fn test_object_style_commit_passes_whole_object() {
        let store = store(
            ModuleDef::new()
                .state(json!({ "last": null }))
                .mutation("record", |state, payload| state["last"] = payload.clone()),
        );
        store
            .commit(json!({ "type": "record", "amount": 5 }), Value::Null)
            .unwrap();
        assert_eq!(
            store.state()["last"],
            json!({ "type": "record", "amount": 5 })
        );
    }

    #[test]
    fn test_invalid_request_is_rejected() {
        let store = store(counter());
        let err = store.commit(json!(42), Value::Null).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));
    }

    #[test]
    fn test_unknown_mutation_is_ignored() {
        let store = store(counter());
        store.commit("missing", Value::Null).unwrap();
        assert_eq!(store.state()["count"], json!(0));
        assert!(store.dispatch("missing", Value::Null).is_none());
    }

    #[test]
    fn test_sibling_mutations_share_a_type() {
        let reset = |state: &mut Value, _: &Value| state["n"] = json!(0);
        let store = store(
            ModuleDef::new()
                .module("a", ModuleDef::new().state(json!({ "n": 3 })).mutation("reset", reset))
                .module("b", ModuleDef::new().state(json!({ "n": 7 })).mutation("reset", reset)),
        );

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let _sub = store.subscribe(mutation_subscriber(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        store.commit("reset", Value::Null).unwrap();
        assert_eq!(store.state()["a"]["n"], json!(0));
        assert_eq!(store.state()["b"]["n"], json!(0));
        // one commit, one notification
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_strict_mode_flags_unguarded_writes() {
        let store = Store::new(StoreOptions::new(counter()).strict(true)).unwrap();
        assert!(store.is_strict());

        store.commit("increment", Value::Null).unwrap();
        let err = store
            .write_state(|state| state["count"] = json!(100))
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalMutation));
        assert!(!store.is_committing());

        store.replace_state(json!({ "count": 5 })).unwrap();
        assert_eq!(store.state()["count"], json!(5));
    }

    #[test]
    fn test_non_strict_allows_direct_writes() {
        let store = store(counter());
        store.write_state(|state| state["count"] = json!(9)).unwrap();
        assert_eq!(store.getters().value("double"), json!(18));
    }

    #[test]
    fn test_subscriber_sees_post_commit_state_and_unsubscribes() {
        let store = store(counter());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let subscriber = mutation_subscriber(move |mutation: &MutationRecord, state: &Value| {
            log.lock().push((mutation.kind.clone(), state["count"].clone()));
        });

        let sub = store.subscribe(Arc::clone(&subscriber));
        // same identity: no second registration
        let dup = store.subscribe(subscriber);

        store.commit("increment", json!(3)).unwrap();
        assert_eq!(*seen.lock(), vec![("increment".to_string(), json!(3))]);

        assert!(sub.unsubscribe());
        assert!(!dup.unsubscribe());
        store.commit("increment", json!(1)).unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_unsubscribe_during_notification_keeps_current_pass() {
        let store = store(counter());
        let calls = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let first_slot = Arc::clone(&slot);
        let _first = store.subscribe(mutation_subscriber(move |_, _| {
            if let Some(sub) = first_slot.lock().take() {
                sub.unsubscribe();
            }
        }));
        let counted = Arc::clone(&calls);
        let second = store.subscribe(mutation_subscriber(move |_, _| {
            counted.fetch_add(1, Ordering::SeqCst);
        }));
        *slot.lock() = Some(second);

        store.commit("increment", Value::Null).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        store.commit("increment", Value::Null).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_subscriber_does_not_break_commit() {
        let store = store(counter());
        let calls = Arc::new(AtomicUsize::new(0));
        let _bad = store.subscribe(mutation_subscriber(|_, _| panic!("boom")));
        let counted = Arc::clone(&calls);
        let _good = store.subscribe(mutation_subscriber(move |_, _| {
            counted.fetch_add(1, Ordering::SeqCst);
        }));

        store.commit("increment", Value::Null).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.state()["count"], json!(1));
    }

    #[test]
    fn test_duplicate_getter_keeps_first() {
        let store = store(
            ModuleDef::new()
                .module("a", ModuleDef::new().getter("g", |_, _, _, _| json!("a")))
                .module("b", ModuleDef::new().getter("g", |_, _, _, _| json!("b"))),
        );
        assert_eq!(store.getters().len(), 1);
        assert_eq!(store.getters().value("g"), json!("a"));
    }

    #[test]
    fn test_getter_result_is_memoized_per_state() {
        let evaluations = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&evaluations);
        let store = store(counter().getter("tracked", move |state, _, _, _| {
            counted.fetch_add(1, Ordering::SeqCst);
            state["count"].clone()
        }));

        let first = store.getters().get("tracked").unwrap();
        let second = store.getters().get("tracked").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(evaluations.load(Ordering::SeqCst), 1);

        store.commit("increment", Value::Null).unwrap();
        assert_eq!(*store.getters().get("tracked").unwrap(), json!(1));
        assert_eq!(evaluations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_namespaced_getters_see_local_and_root() {
        let store = store(
            ModuleDef::new()
                .state(json!({ "factor": 10 }))
                .getter("factor", |state, _, _, _| state["factor"].clone())
                .module(
                    "cart",
                    ModuleDef::new()
                        .namespaced(true)
                        .state(json!({ "items": [1, 2, 3] }))
                        .getter("count", |state, _, _, _| {
                            json!(state["items"].as_array().unwrap().len())
                        })
                        .getter("scaled", |_, getters, root, root_getters| {
                            let count = getters.value("count").as_i64().unwrap();
                            let factor = root_getters.value("factor").as_i64().unwrap();
                            assert_eq!(root["factor"], json!(10));
                            json!(count * factor)
                        }),
                ),
        );

        assert_eq!(store.getters().value("cart/count"), json!(3));
        assert_eq!(store.getters().value("cart/scaled"), json!(30));
        let local = store.module_context("cart").unwrap().getters();
        assert_eq!(local.keys().collect::<Vec<_>>(), vec!["count", "scaled"]);
    }

    #[tokio::test]
    async fn test_dispatch_runs_action_and_commits() {
        let store = store(counter().action_sync("incrementTwice", |ctx, _| {
            ctx.commit("increment", Value::Null)?;
            ctx.commit("increment", Value::Null)?;
            Ok(ctx.state()["count"].clone())
        }));

        let result = store.dispatch("incrementTwice", Value::Null).unwrap().await;
        assert_eq!(result.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_multiple_action_handlers_are_joined() {
        let store = store(
            ModuleDef::new()
                .module(
                    "a",
                    ModuleDef::new().action("ping", |_, _| async { Ok::<_, StoreError>(json!("a")) }),
                )
                .module(
                    "b",
                    ModuleDef::new().action("ping", |_, _| async { Ok::<_, StoreError>(json!("b")) }),
                ),
        );
        let result = store.dispatch("ping", Value::Null).unwrap().await.unwrap();
        assert_eq!(result, json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_action_subscribers_phases() {
        let store = store(
            counter()
                .action_sync("ok", |_, _| Ok(Value::Null))
                .action_sync("fail", |_, _| Err(StoreError::action("nope"))),
        );

        let log = Arc::new(Mutex::new(Vec::new()));
        let (before, after, failed) = (Arc::clone(&log), Arc::clone(&log), Arc::clone(&log));
        let _sub = store.subscribe_action(Arc::new(
            ActionSubscriber::new()
                .before(move |action, _| before.lock().push(format!("before {}", action.kind)))
                .after(move |action, _| after.lock().push(format!("after {}", action.kind)))
                .error(move |action, _, err| failed.lock().push(format!("error {} {}", action.kind, err))),
        ));

        store.dispatch("ok", Value::Null).unwrap().await.unwrap();
        let err = store.dispatch("fail", Value::Null).unwrap().await.unwrap_err();
        assert!(matches!(err, StoreError::Action(_)));

        assert_eq!(
            *log.lock(),
            vec![
                "before ok".to_string(),
                "after ok".to_string(),
                "before fail".to_string(),
                "error fail action failed: nope".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_local_context_qualifies_and_escapes_namespace() {
        let store = store(
            ModuleDef::new()
                .state(json!({ "total": 0 }))
                .mutation("add", |state, payload| {
                    state["total"] = json!(state["total"].as_i64().unwrap() + payload.as_i64().unwrap());
                })
                .module(
                    "cart",
                    ModuleDef::new()
                        .namespaced(true)
                        .state(json!({ "items": [] }))
                        .mutation("push", |state, payload| {
                            state["items"].as_array_mut().unwrap().push(payload.clone());
                        })
                        .action_sync("checkout", |ctx, payload| {
                            ctx.commit("push", payload.clone())?;
                            ctx.commit_with("add", json!(1), CommitOptions::root())?;
                            // unknown locally: reported, no effect
                            ctx.commit("add", json!(100))?;
                            Ok(Value::Null)
                        }),
                ),
        );

        store.dispatch("cart/checkout", json!("apple")).unwrap().await.unwrap();
        assert_eq!(store.state()["cart"]["items"], json!(["apple"]));
        assert_eq!(store.state()["total"], json!(1));
    }

    #[tokio::test]
    async fn test_root_action_in_namespaced_module() {
        let store = store(
            ModuleDef::new().module(
                "auth",
                ModuleDef::new()
                    .namespaced(true)
                    .state(json!({ "user": null }))
                    .mutation("set", |state, payload| state["user"] = payload.clone())
                    .root_action("login", |ctx, payload| async move {
                        ctx.commit("set", payload)?;
                        Ok::<_, StoreError>(Value::Null)
                    }),
            ),
        );

        assert!(store.dispatch("auth/login", Value::Null).is_none());
        store.dispatch("login", json!("ann")).unwrap().await.unwrap();
        assert_eq!(store.state()["auth"]["user"], json!("ann"));
    }

    #[tokio::test]
    async fn test_dropped_dispatch_still_settles() {
        let store = store(
            counter()
                .action("bump", |ctx, _| async move {
                    tokio::task::yield_now().await;
                    ctx.commit("increment", Value::Null)?;
                    Ok::<_, StoreError>(Value::Null)
                })
                .action_sync("bumpSync", |ctx, _| {
                    ctx.commit("increment", Value::Null)?;
                    Ok(Value::Null)
                })
                .action("failLater", |_, _| async move {
                    tokio::task::yield_now().await;
                    Err::<Value, _>(StoreError::action("late"))
                }),
        );

        let settled = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let (after, on_error) = (Arc::clone(&settled), Arc::clone(&failed));
        let _sub = store.subscribe_action(Arc::new(
            ActionSubscriber::new()
                .after(move |_, _| {
                    after.fetch_add(1, Ordering::SeqCst);
                })
                .error(move |_, _, _| {
                    on_error.fetch_add(1, Ordering::SeqCst);
                }),
        ));

        drop(store.dispatch("bump", Value::Null).unwrap());
        drop(store.dispatch("bumpSync", Value::Null).unwrap());
        drop(store.dispatch("failLater", Value::Null).unwrap());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(store.state()["count"], json!(2));
        assert_eq!(settled.load(Ordering::SeqCst), 2);
        assert_eq!(failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_dispatch_qualifies_and_escapes_namespace() {
        let store = store(
            ModuleDef::new()
                .state(json!({ "n": 0 }))
                .mutation("set", |state, payload| state["n"] = payload.clone())
                .action_sync("top", |ctx, payload| {
                    ctx.commit("set", payload)?;
                    Ok(Value::Null)
                })
                .module(
                    "m",
                    ModuleDef::new()
                        .namespaced(true)
                        .state(json!({ "hits": 0 }))
                        .mutation("hit", |state, _| {
                            state["hits"] = json!(state["hits"].as_i64().unwrap() + 1);
                        })
                        .action_sync("inner", |ctx, _| {
                            ctx.commit("hit", Value::Null)?;
                            Ok(json!("inner"))
                        })
                        .action("outer", |ctx, payload| async move {
                            // unknown locally: "m/top" is not registered
                            assert!(ctx.dispatch("top", payload.clone()).is_none());
                            let inner = match ctx.dispatch("inner", Value::Null) {
                                Some(inner) => inner.await?,
                                None => return Err(StoreError::UnknownAction("m/inner".into())),
                            };
                            if let Some(top) = ctx.dispatch_with("top", payload, DispatchOptions::root()) {
                                top.await?;
                            }
                            Ok::<_, StoreError>(inner)
                        }),
                ),
        );

        let result = store.dispatch("m/outer", json!(7)).unwrap().await.unwrap();
        assert_eq!(result, json!("inner"));
        assert_eq!(store.state()["m"]["hits"], json!(1));
        assert_eq!(store.state()["n"], json!(7));
        assert!(store.dispatch("inner", Value::Null).is_none());
    }

    #[test]
    fn test_register_and_unregister_round_trip() {
        let store = store(counter());
        store
            .register_module(
                "extra",
                ModuleDef::new()
                    .namespaced(true)
                    .state(json!({ "v": 1 }))
                    .mutation("bump", |state, _| state["v"] = json!(2))
                    .getter("v", |state, _, _, _| state["v"].clone()),
            )
            .unwrap();

        assert!(store.has_module("extra"));
        store.commit("extra/bump", Value::Null).unwrap();
        assert_eq!(store.getters().value("extra/v"), json!(2));
        // existing registrations survive
        store.commit("increment", Value::Null).unwrap();
        assert_eq!(store.state()["count"], json!(1));

        store.unregister_module("extra").unwrap();
        assert!(!store.has_module("extra"));
        assert!(store.state().get("extra").is_none());
        assert!(!store.getters().contains("extra/v"));
        store.commit("increment", Value::Null).unwrap();
        assert_eq!(store.state()["count"], json!(2));
    }

    #[test]
    fn test_register_errors() {
        let store = store(counter());
        assert!(matches!(
            store.register_module(ModulePath::root(), ModuleDef::new()),
            Err(StoreError::RootModule)
        ));
        assert!(matches!(
            store.register_module(["missing", "child"], ModuleDef::new()),
            Err(StoreError::Lookup(_))
        ));
        let malformed = ModuleDef::new()
            .declare_mutation("bad", Declared::Malformed("123".to_string()));
        assert!(matches!(
            store.register_module("broken", malformed),
            Err(StoreError::Shape { .. })
        ));
        assert!(!store.has_module("broken"));
    }

    #[test]
    fn test_preserve_state_keeps_existing_slice() {
        let store = store(counter());
        store.replace_state(json!({ "count": 0, "restored": { "v": 42 } })).unwrap();
        store
            .register_module_with(
                "restored",
                ModuleDef::new().state(json!({ "v": 0 })),
                RegisterOptions {
                    preserve_state: true,
                },
            )
            .unwrap();
        assert_eq!(store.state()["restored"]["v"], json!(42));
    }

    #[test]
    fn test_static_module_survives_unregister() {
        let store = store(ModuleDef::new().module("fixed", counter()));
        store.unregister_module("fixed").unwrap();
        assert!(store.has_module("fixed"));
        assert_eq!(store.state()["fixed"]["count"], json!(0));
    }

    #[test]
    fn test_hot_update_swaps_handlers_and_keeps_state() {
        let store = store(counter());
        store.commit("increment", Value::Null).unwrap();

        let doubled = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&doubled);
        let _watch = store.watch(|_, getters| getters.value("double"), move |_, _| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        store
            .hot_update(
                ModuleDef::new()
                    .mutation("increment", |state, _| {
                        state["count"] = json!(state["count"].as_i64().unwrap() + 10);
                    })
                    .getter("double", |state, _, _, _| {
                        json!(state["count"].as_i64().unwrap() * 3)
                    }),
            )
            .unwrap();

        assert_eq!(store.state()["count"], json!(1));
        assert_eq!(store.getters().value("double"), json!(3));
        // getter swap alone re-triggers dependents
        assert_eq!(doubled.load(Ordering::SeqCst), 1);

        store.commit("increment", Value::Null).unwrap();
        assert_eq!(store.state()["count"], json!(11));
    }

    #[test]
    fn test_failed_hot_update_keeps_every_handler() {
        let store = store(counter().module("nested", ModuleDef::new().mutation("noop", |_, _| {})));
        let err = store
            .hot_update(
                ModuleDef::new()
                    .mutation("increment", |state, _| state["count"] = json!(100))
                    .module(
                        "nested",
                        ModuleDef::new().declare_getter("broken", Declared::Malformed("true".into())),
                    ),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Shape { kind: "getters", .. }));

        store.commit("increment", Value::Null).unwrap();
        assert_eq!(store.state()["count"], json!(1));

        // a later full reset installs the same handlers
        store.register_module("extra", ModuleDef::new()).unwrap();
        store.unregister_module("extra").unwrap();
        store.commit("increment", Value::Null).unwrap();
        assert_eq!(store.state()["count"], json!(2));
    }

    #[test]
    fn test_module_state_factory_can_read_the_store() {
        let store = store(counter());
        let weak = store.downgrade();
        store
            .register_module(
                "settings",
                ModuleDef::new().state_factory(move || {
                    let registered = weak
                        .upgrade()
                        .map(|store| store.has_module("settings"))
                        .unwrap_or(true);
                    json!({ "registered_before": registered })
                }),
            )
            .unwrap();
        assert_eq!(store.state()["settings"], json!({ "registered_before": false }));
    }

    #[test]
    fn test_watch_reports_new_and_old() {
        let store = store(counter());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let handle = store.watch_with(
            |state, _| state["count"].clone(),
            move |new, old| log.lock().push((new.clone(), old.clone())),
            WatchOptions { immediate: true },
        );

        store.commit("increment", Value::Null).unwrap();
        assert!(handle.stop());
        store.commit("increment", Value::Null).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![(json!(0), Value::Null), (json!(1), json!(0))]
        );
    }

    #[test]
    fn test_missing_host_is_a_precondition_failure() {
        let options = StoreOptions {
            root: counter(),
            ..Default::default()
        };
        assert!(matches!(
            Store::new(options),
            Err(StoreError::Precondition(_))
        ));
    }

    #[test]
    fn test_plugins_run_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&order), Arc::clone(&order));
        let _store = Store::new(
            StoreOptions::new(counter())
                .plugin(move |store| a.lock().push(store.state()["count"].clone()))
                .plugin(move |_| b.lock().push(json!("second"))),
        )
        .unwrap();
        assert_eq!(*order.lock(), vec![json!(0), json!("second")]);
    }

    #[test]
    fn test_module_state_factory_is_fresh_per_store() {
        let module = ModuleDef::new().state_factory(|| json!({ "items": [] }));
        let root = ModuleDef::new().module("list", module);
        let first = store(root.clone());
        let second = store(root);
        first
            .write_state(|state| state["list"]["items"] = json!([1]))
            .unwrap();
        assert_eq!(second.state()["list"]["items"], json!([]));
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<DevtoolsEvent>>,
        travel: Mutex<Option<TravelHandler>>,
    }

    impl DevtoolsHook for Recorder {
        fn emit(&self, event: DevtoolsEvent) {
            self.events.lock().push(event);
        }

        fn on_travel(&self, handler: TravelHandler) {
            *self.travel.lock() = Some(handler);
        }
    }

    #[tokio::test]
    async fn test_devtools_mirrors_store() {
        let recorder = Arc::new(Recorder::default());
        let store = Store::new(
            StoreOptions::new(
                counter().declare_action(
                    "fail",
                    Declared::Handler(ActionDecl::Direct(crate::sync_handler(|_, _| {
                        Err(StoreError::action("down"))
                    }))),
                ),
            )
            .host(Host::with_devtools(recorder.clone())),
        )
        .unwrap();

        store.commit("increment", Value::Null).unwrap();
        let _ = store.dispatch("fail", Value::Null).unwrap().await;

        let events = recorder.events.lock().clone();
        assert_eq!(events[0], DevtoolsEvent::Init { state: json!({ "count": 0 }) });
        assert!(matches!(&events[1], DevtoolsEvent::Mutation { mutation, .. } if mutation.kind == "increment"));
        assert!(matches!(&events[2], DevtoolsEvent::Action { action, .. } if action.kind == "fail"));
        assert!(matches!(&events[3], DevtoolsEvent::Error { message } if message.contains("down")));

        let travel = recorder.travel.lock().take().unwrap();
        travel(json!({ "count": 40 }));
        assert_eq!(store.state()["count"], json!(40));
    }

    #[test]
    fn test_devtools_can_be_disabled_per_store() {
        let recorder = Arc::new(Recorder::default());
        let _store = Store::new(
            StoreOptions::new(counter())
                .host(Host::with_devtools(recorder.clone()))
                .devtools(false),
        )
        .unwrap();
        assert!(recorder.events.lock().is_empty());
    }
}
