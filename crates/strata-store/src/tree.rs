//! Module tree - path-addressed registry of module nodes
//!
//! Owns the root [`ModuleNode`]. Every other node is reachable by exactly one
//! path; sibling keys are unique.

use strata_core::{ModulePath, StoreError, StoreResult};
use tracing::warn;

use crate::{Definitions, ModuleDef, ModuleNode};

/// The module tree
pub struct ModuleTree {
    root: ModuleNode,
}

impl ModuleTree {
    /// Build the tree from the root definition; nodes built here are static
    pub fn new(root: ModuleDef) -> StoreResult<Self> {
        let root = build(&ModulePath::root(), root, false)?;
        Ok(ModuleTree { root })
    }

    pub fn root(&self) -> &ModuleNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut ModuleNode {
        &mut self.root
    }

    /// Walk child links from the root
    pub fn get(&self, path: &ModulePath) -> Option<&ModuleNode> {
        path.iter()
            .try_fold(&self.root, |node, key| node.get_child(key))
    }

    pub fn get_mut(&mut self, path: &ModulePath) -> Option<&mut ModuleNode> {
        path.iter()
            .try_fold(&mut self.root, |node, key| node.get_child_mut(key))
    }

    /// Namespace prefix of the module at `path`: `key/` for every namespaced
    /// node along the path, in order
    pub fn namespace(&self, path: &ModulePath) -> StoreResult<String> {
        let mut node = &self.root;
        let mut namespace = String::new();
        for key in path.iter() {
            node = node
                .get_child(key)
                .ok_or_else(|| StoreError::Lookup(path.clone()))?;
            if node.namespaced() {
                namespace.push_str(key);
                namespace.push('/');
            }
        }
        Ok(namespace)
    }

    /// Register a definition (and its nested modules) at `path`.
    ///
    /// The whole subtree is validated before anything is attached, so a shape
    /// error leaves the tree unchanged.
    pub fn register(&mut self, path: &ModulePath, def: ModuleDef, runtime: bool) -> StoreResult<()> {
        let node = ModuleTree::build(path, def, runtime)?;
        self.attach(path, node)
    }

    /// Validate a definition and build its subtree without touching any tree.
    /// State factories run here.
    pub fn build(path: &ModulePath, def: ModuleDef, runtime: bool) -> StoreResult<ModuleNode> {
        build(path, def, runtime)
    }

    /// Attach an already built subtree at `path`
    pub fn attach(&mut self, path: &ModulePath, node: ModuleNode) -> StoreResult<()> {
        let Some(key) = path.last() else {
            self.root = node;
            return Ok(());
        };

        let parent = self
            .get_mut(&path.parent())
            .ok_or_else(|| StoreError::Lookup(path.parent()))?;
        parent.add_child(key, node);
        Ok(())
    }

    /// Merge new declarations into existing nodes in place. State is untouched
    /// and new nested modules are refused.
    ///
    /// Every declaration is resolved before the first node changes, so a
    /// shape error leaves the tree as it was.
    pub fn update(&mut self, def: ModuleDef) -> StoreResult<()> {
        let patch = plan(&ModulePath::root(), &self.root, def)?;
        apply(&mut self.root, patch);
        Ok(())
    }

    /// Detach a dynamically registered module. Returns whether it was removed.
    pub fn unregister(&mut self, path: &ModulePath) -> bool {
        let Some(key) = path.last() else {
            warn!("cannot unregister the root module");
            return false;
        };

        let Some(parent) = self.get_mut(&path.parent()) else {
            warn!("trying to unregister module '{}', which is not registered", key);
            return false;
        };

        match parent.get_child(key) {
            None => {
                warn!("trying to unregister module '{}', which is not registered", key);
                false
            }
            // static modules are never removed
            Some(child) if !child.is_runtime() => false,
            Some(_) => parent.remove_child(key).is_some(),
        }
    }

    pub fn is_registered(&self, path: &ModulePath) -> bool {
        let Some(key) = path.last() else {
            return false;
        };
        self.get(&path.parent())
            .map(|parent| parent.has_child(key))
            .unwrap_or(false)
    }
}

fn build(path: &ModulePath, mut def: ModuleDef, runtime: bool) -> StoreResult<ModuleNode> {
    let definitions = Definitions::resolve(path, &def)?;
    let state = def.state.as_ref().map(|init| init.produce());
    let modules = std::mem::take(&mut def.modules);

    let mut node = ModuleNode::new(state, definitions, runtime);
    for (key, child) in modules {
        let child = build(&path.child(key.as_str()), child, runtime)?;
        node.add_child(key, child);
    }
    Ok(node)
}

/// Resolved declarations for an update, mirroring the existing nodes it touches
struct Patch {
    definitions: Definitions,
    children: Vec<(String, Patch)>,
}

fn plan(path: &ModulePath, target: &ModuleNode, mut def: ModuleDef) -> StoreResult<Patch> {
    let definitions = Definitions::resolve(path, &def)?;

    let mut children = Vec::new();
    for (key, child) in std::mem::take(&mut def.modules) {
        let Some(existing) = target.get_child(&key) else {
            warn!(
                "trying to add a new module '{}' on hot reloading, manual reload is needed",
                key
            );
            break;
        };
        let patch = plan(&path.child(key.as_str()), existing, child)?;
        children.push((key, patch));
    }
    Ok(Patch {
        definitions,
        children,
    })
}

fn apply(target: &mut ModuleNode, patch: Patch) {
    target.update(patch.definitions);
    for (key, child) in patch.children {
        if let Some(existing) = target.get_child_mut(&key) {
            apply(existing, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Declared;
    use serde_json::json;

    fn sample() -> ModuleDef {
        ModuleDef::new()
            .state(json!({ "count": 0 }))
            .module(
                "a",
                ModuleDef::new()
                    .namespaced(true)
                    .module("b", ModuleDef::new().module("c", ModuleDef::new().namespaced(true))),
            )
            .module("d", ModuleDef::new())
    }

    #[test]
    fn test_namespace_skips_plain_modules() {
        let tree = ModuleTree::new(sample()).unwrap();
        assert_eq!(tree.namespace(&ModulePath::root()).unwrap(), "");
        assert_eq!(tree.namespace(&ModulePath::from("a")).unwrap(), "a/");
        assert_eq!(tree.namespace(&ModulePath::from(["a", "b"])).unwrap(), "a/");
        assert_eq!(tree.namespace(&ModulePath::from(["a", "b", "c"])).unwrap(), "a/c/");
        assert_eq!(tree.namespace(&ModulePath::from("d")).unwrap(), "");
        assert!(matches!(
            tree.namespace(&ModulePath::from("x")),
            Err(StoreError::Lookup(_))
        ));
    }

    #[test]
    fn test_get_and_is_registered() {
        let tree = ModuleTree::new(sample()).unwrap();
        assert!(tree.get(&ModulePath::from(["a", "b", "c"])).is_some());
        assert!(tree.get(&ModulePath::from(["a", "x"])).is_none());
        assert!(tree.is_registered(&ModulePath::from(["a", "b"])));
        assert!(!tree.is_registered(&ModulePath::from(["x", "b"])));
        assert!(!tree.is_registered(&ModulePath::root()));
    }

    #[test]
    fn test_static_modules_survive_unregister() {
        let mut tree = ModuleTree::new(sample()).unwrap();
        assert!(!tree.unregister(&ModulePath::from("d")));
        assert!(tree.is_registered(&ModulePath::from("d")));

        tree.register(&ModulePath::from("e"), ModuleDef::new(), true).unwrap();
        assert!(tree.get(&ModulePath::from("e")).unwrap().is_runtime());
        assert!(tree.unregister(&ModulePath::from("e")));
        assert!(!tree.is_registered(&ModulePath::from("e")));

        // missing module: reported, nothing happens
        assert!(!tree.unregister(&ModulePath::from("e")));
    }

    #[test]
    fn test_register_under_missing_parent() {
        let mut tree = ModuleTree::new(sample()).unwrap();
        let err = tree
            .register(&ModulePath::from(["x", "y"]), ModuleDef::new(), true)
            .unwrap_err();
        assert!(matches!(err, StoreError::Lookup(_)));
    }

    #[test]
    fn test_shape_error_leaves_tree_untouched() {
        let mut tree = ModuleTree::new(sample()).unwrap();
        let bad = ModuleDef::new().module(
            "inner",
            ModuleDef::new().declare_getter("broken", Declared::Malformed("\"text\"".into())),
        );
        let err = tree.register(&ModulePath::from("e"), bad, true).unwrap_err();
        assert!(matches!(err, StoreError::Shape { kind: "getters", .. }));
        assert!(err.to_string().contains("in module \"e.inner\""));
        assert!(!tree.is_registered(&ModulePath::from("e")));
    }

    #[test]
    fn test_update_refuses_new_modules() {
        let mut tree = ModuleTree::new(sample()).unwrap();
        let next = ModuleDef::new()
            .mutation("reset", |state, _| state["count"] = json!(0))
            .module("new", ModuleDef::new().mutation("x", |_, _| {}))
            .module("d", ModuleDef::new().mutation("y", |_, _| {}));
        tree.update(next).unwrap();

        assert_eq!(tree.root().mutations().count(), 1);
        assert!(!tree.is_registered(&ModulePath::from("new")));
        // aborted before reaching the sibling that follows the new key
        assert_eq!(tree.get(&ModulePath::from("d")).unwrap().mutations().count(), 0);
        assert_eq!(tree.root().state(), &json!({ "count": 0 }));
    }

    #[test]
    fn test_update_with_shape_error_changes_nothing() {
        let mut tree = ModuleTree::new(sample()).unwrap();
        let next = ModuleDef::new()
            .mutation("reset", |state, _| state["count"] = json!(0))
            .module(
                "a",
                ModuleDef::new()
                    .mutation("x", |_, _| {})
                    .module(
                        "b",
                        ModuleDef::new().declare_mutation("broken", Declared::Malformed("1".into())),
                    ),
            );
        let err = tree.update(next).unwrap_err();
        assert!(err.to_string().contains("in module \"a.b\""));

        assert_eq!(tree.root().mutations().count(), 0);
        let a = tree.get(&ModulePath::from("a")).unwrap();
        assert_eq!(a.mutations().count(), 0);
        assert!(a.namespaced());
    }

    #[test]
    fn test_build_then_attach() {
        let mut tree = ModuleTree::new(sample()).unwrap();
        let node = ModuleTree::build(
            &ModulePath::from(["a", "e"]),
            ModuleDef::new().state_factory(|| json!({ "fresh": true })),
            true,
        )
        .unwrap();
        assert_eq!(node.state(), &json!({ "fresh": true }));
        assert!(!tree.is_registered(&ModulePath::from(["a", "e"])));

        tree.attach(&ModulePath::from(["a", "e"]), node).unwrap();
        assert!(tree.is_registered(&ModulePath::from(["a", "e"])));
    }

    #[test]
    fn test_update_can_drop_namespacing() {
        let mut tree = ModuleTree::new(sample()).unwrap();
        tree.update(ModuleDef::new().module("a", ModuleDef::new())).unwrap();
        assert_eq!(tree.namespace(&ModulePath::from("a")).unwrap(), "");
    }

    proptest::proptest! {
        #[test]
        fn prop_namespace_concatenates_namespaced_segments(
            flags in proptest::collection::vec(proptest::bool::ANY, 1..6)
        ) {
            let mut def = ModuleDef::new();
            for (depth, namespaced) in flags.iter().enumerate().rev() {
                def = ModuleDef::new()
                    .namespaced(*namespaced)
                    .module(format!("m{}", depth + 1), def);
            }
            let tree = ModuleTree::new(ModuleDef::new().module("m0", def)).unwrap();

            let mut path = ModulePath::root();
            let mut expected = String::new();
            let mut node = tree.root();
            for depth in 0..flags.len() {
                let key = format!("m{}", depth);
                node = node.get_child(&key).unwrap();
                path = path.child(key.as_str());
                if node.namespaced() {
                    expected.push_str(&key);
                    expected.push('/');
                }
                proptest::prop_assert_eq!(tree.namespace(&path).unwrap(), expected.clone());
            }
        }
    }
}
