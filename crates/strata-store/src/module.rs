//! Module node - a single node of the module tree

use indexmap::IndexMap;
use serde_json::{json, Value};
use strata_core::{ModulePath, StoreError, StoreResult};

use crate::{ActionDecl, ActionFn, Declared, GetterFn, LocalContext, ModuleDef, MutationFn};

/// An action resolved from its declaration form
#[derive(Clone)]
pub struct ActionEntry {
    pub handler: ActionFn,
    /// Registered under the bare key, ignoring the namespace
    pub root: bool,
}

/// Operation declarations of a node, resolved to handlers.
///
/// A `None` table means the definition did not declare that kind at all,
/// which matters for hot updates: only declared tables are replaced.
#[derive(Clone, Default)]
pub struct Definitions {
    pub namespaced: bool,
    pub getters: Option<IndexMap<String, GetterFn>>,
    pub mutations: Option<IndexMap<String, MutationFn>>,
    pub actions: Option<IndexMap<String, ActionEntry>>,
}

impl Definitions {
    /// Resolve declarations, rejecting anything that is not a handler
    pub fn resolve(path: &ModulePath, def: &ModuleDef) -> StoreResult<Self> {
        let getters = def
            .getters
            .as_ref()
            .map(|decls| resolve_table(path, "getters", "function", decls, Clone::clone))
            .transpose()?;

        let mutations = def
            .mutations
            .as_ref()
            .map(|decls| resolve_table(path, "mutations", "function", decls, Clone::clone))
            .transpose()?;

        let actions = def
            .actions
            .as_ref()
            .map(|decls| {
                resolve_table(
                    path,
                    "actions",
                    "function or object with \"handler\" function",
                    decls,
                    |decl| match decl {
                        ActionDecl::Direct(handler) => ActionEntry {
                            handler: handler.clone(),
                            root: false,
                        },
                        ActionDecl::WithOptions { handler, root } => ActionEntry {
                            handler: handler.clone(),
                            root: *root,
                        },
                    },
                )
            })
            .transpose()?;

        Ok(Definitions {
            namespaced: def.namespaced,
            getters,
            mutations,
            actions,
        })
    }
}

fn resolve_table<H, T>(
    path: &ModulePath,
    kind: &'static str,
    expected: &'static str,
    decls: &IndexMap<String, Declared<H>>,
    resolve: impl Fn(&H) -> T,
) -> StoreResult<IndexMap<String, T>> {
    decls
        .iter()
        .map(|(key, decl)| {
            match decl {
                Declared::Handler(handler) => Ok((key.clone(), resolve(handler))),
                Declared::Malformed(found) => Err(StoreError::Shape {
                    path: path.clone(),
                    kind,
                    key: key.clone(),
                    expected,
                    found: found.clone(),
                }),
            }
        })
        .collect()
}

/// A node of the module tree
pub struct ModuleNode {
    /// Registered dynamically (eligible for unregistration)
    runtime: bool,
    /// Initial state slice, attached into the live tree on install
    state: Value,
    definitions: Definitions,
    children: IndexMap<String, ModuleNode>,
    /// Local view, rebuilt whenever the node is installed
    pub(crate) context: Option<LocalContext>,
}

impl ModuleNode {
    pub fn new(state: Option<Value>, definitions: Definitions, runtime: bool) -> Self {
        ModuleNode {
            runtime,
            state: state.unwrap_or_else(|| json!({})),
            definitions,
            children: IndexMap::new(),
            context: None,
        }
    }

    pub fn is_runtime(&self) -> bool {
        self.runtime
    }

    pub fn namespaced(&self) -> bool {
        self.definitions.namespaced
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Local context built by the last install
    pub fn context(&self) -> Option<&LocalContext> {
        self.context.as_ref()
    }

    pub fn add_child(&mut self, key: impl Into<String>, child: ModuleNode) {
        self.children.insert(key.into(), child);
    }

    pub fn remove_child(&mut self, key: &str) -> Option<ModuleNode> {
        self.children.shift_remove(key)
    }

    pub fn get_child(&self, key: &str) -> Option<&ModuleNode> {
        self.children.get(key)
    }

    pub fn get_child_mut(&mut self, key: &str) -> Option<&mut ModuleNode> {
        self.children.get_mut(key)
    }

    pub fn has_child(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    /// Replace declarations in place; state and children are untouched
    pub fn update(&mut self, next: Definitions) {
        self.definitions.namespaced = next.namespaced;
        if next.actions.is_some() {
            self.definitions.actions = next.actions;
        }
        if next.mutations.is_some() {
            self.definitions.mutations = next.mutations;
        }
        if next.getters.is_some() {
            self.definitions.getters = next.getters;
        }
    }

    pub fn children(&self) -> impl Iterator<Item = (&String, &ModuleNode)> {
        self.children.iter()
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = (&String, &mut ModuleNode)> {
        self.children.iter_mut()
    }

    pub fn getters(&self) -> impl Iterator<Item = (&String, &GetterFn)> {
        self.definitions.getters.iter().flatten()
    }

    pub fn mutations(&self) -> impl Iterator<Item = (&String, &MutationFn)> {
        self.definitions.mutations.iter().flatten()
    }

    pub fn actions(&self) -> impl Iterator<Item = (&String, &ActionEntry)> {
        self.definitions.actions.iter().flatten()
    }
}
