//! Module manifests
//!
//! A manifest describes a module tree as JSON, with handlers referenced by
//! name from a [`HandlerTable`]:
//!
//! ```json
//! {
//!   "namespaced": true,
//!   "state": { "items": [] },
//!   "getters": { "count": "cart.count" },
//!   "mutations": { "push": "cart.push" },
//!   "actions": { "checkout": "cart.checkout", "reset": { "handler": "cart.reset", "root": true } },
//!   "modules": { "history": { "state": [] } }
//! }
//! ```
//!
//! Entries that do not name a known handler are kept as malformed
//! declarations; registering the module then fails with a shape error.

use std::collections::HashMap;

use serde_json::{Map, Value};
use strata_core::{value_kind, ModulePath, StoreError, StoreResult};

use crate::{ActionDecl, ActionFn, Declared, GetterFn, ModuleDef, MutationFn};

/// Named handlers a manifest can refer to
#[derive(Clone, Default)]
pub struct HandlerTable {
    getters: HashMap<String, GetterFn>,
    mutations: HashMap<String, MutationFn>,
    actions: HashMap<String, ActionFn>,
}

impl HandlerTable {
    pub fn new() -> Self {
        HandlerTable::default()
    }

    pub fn getter(mut self, name: impl Into<String>, getter: GetterFn) -> Self {
        self.getters.insert(name.into(), getter);
        self
    }

    pub fn mutation(mut self, name: impl Into<String>, mutation: MutationFn) -> Self {
        self.mutations.insert(name.into(), mutation);
        self
    }

    pub fn action(mut self, name: impl Into<String>, action: ActionFn) -> Self {
        self.actions.insert(name.into(), action);
        self
    }
}

impl ModuleDef {
    /// Build a definition from a JSON manifest
    pub fn from_manifest(manifest: &Value, handlers: &HandlerTable) -> StoreResult<ModuleDef> {
        parse(&ModulePath::root(), manifest, handlers)
    }
}

fn parse(path: &ModulePath, manifest: &Value, handlers: &HandlerTable) -> StoreResult<ModuleDef> {
    let Value::Object(fields) = manifest else {
        return Err(not_an_object(path, "manifest", manifest));
    };

    let mut def = ModuleDef::new();
    if let Some(state) = fields.get("state") {
        def = def.state(state.clone());
    }
    def.namespaced = fields
        .get("namespaced")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if let Some(section) = section(path, fields, "getters")? {
        for (key, entry) in section {
            let decl = lookup(&handlers.getters, entry);
            def = def.declare_getter(key.as_str(), decl);
        }
    }

    if let Some(section) = section(path, fields, "mutations")? {
        for (key, entry) in section {
            let decl = lookup(&handlers.mutations, entry);
            def = def.declare_mutation(key.as_str(), decl);
        }
    }

    if let Some(section) = section(path, fields, "actions")? {
        for (key, entry) in section {
            let decl = action_decl(&handlers.actions, entry);
            def = def.declare_action(key.as_str(), decl);
        }
    }

    if let Some(section) = section(path, fields, "modules")? {
        for (key, child) in section {
            let child = parse(&path.child(key.as_str()), child, handlers)?;
            def = def.module(key.as_str(), child);
        }
    }

    Ok(def)
}

fn section<'a>(
    path: &ModulePath,
    fields: &'a Map<String, Value>,
    name: &str,
) -> StoreResult<Option<&'a Map<String, Value>>> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(section)) => Ok(Some(section)),
        Some(other) => Err(not_an_object(path, name, other)),
    }
}

fn lookup<H: Clone>(table: &HashMap<String, H>, entry: &Value) -> Declared<H> {
    entry
        .as_str()
        .and_then(|name| table.get(name))
        .map(|handler| Declared::Handler(handler.clone()))
        .unwrap_or_else(|| Declared::Malformed(entry.to_string()))
}

fn action_decl(table: &HashMap<String, ActionFn>, entry: &Value) -> Declared<ActionDecl> {
    let handler = match entry {
        Value::Object(options) => options.get("handler"),
        other => Some(other),
    };
    let Some(handler) = handler.and_then(Value::as_str).and_then(|name| table.get(name)) else {
        return Declared::Malformed(entry.to_string());
    };

    match entry.get("root").and_then(Value::as_bool) {
        Some(root) => Declared::Handler(ActionDecl::WithOptions {
            handler: handler.clone(),
            root,
        }),
        None => Declared::Handler(ActionDecl::Direct(handler.clone())),
    }
}

fn not_an_object(path: &ModulePath, key: &str, found: &Value) -> StoreError {
    StoreError::Shape {
        path: path.clone(),
        kind: "module",
        key: key.to_string(),
        expected: "object",
        found: value_kind(found).to_string(),
    }
}
