//! Module paths
//!
//! A module is addressed by the sequence of child keys leading to it from the
//! root module. The root module has the empty path.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Path of a module inside the module tree
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    #[inline]
    pub fn root() -> Self {
        ModulePath(Vec::new())
    }

    #[inline]
    pub fn new(segments: Vec<String>) -> Self {
        ModulePath(segments)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Final segment (the key under which the module hangs off its parent)
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Path of the parent module; the root is its own parent
    pub fn parent(&self) -> ModulePath {
        match self.0.split_last() {
            Some((_, rest)) => ModulePath(rest.to_vec()),
            None => ModulePath::root(),
        }
    }

    /// Path of a direct child
    pub fn child(&self, key: impl Into<String>) -> ModulePath {
        let mut segments = self.0.clone();
        segments.push(key.into());
        ModulePath(segments)
    }
}

impl fmt::Debug for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path([{}])", self.0.join(", "))
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A single string is a one-segment path
impl From<&str> for ModulePath {
    fn from(key: &str) -> Self {
        ModulePath(vec![key.to_string()])
    }
}

impl From<String> for ModulePath {
    fn from(key: String) -> Self {
        ModulePath(vec![key])
    }
}

impl From<Vec<String>> for ModulePath {
    fn from(segments: Vec<String>) -> Self {
        ModulePath(segments)
    }
}

impl From<&[&str]> for ModulePath {
    fn from(segments: &[&str]) -> Self {
        ModulePath(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ModulePath {
    fn from(segments: [&str; N]) -> Self {
        ModulePath(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl From<&ModulePath> for ModulePath {
    fn from(path: &ModulePath) -> Self {
        path.clone()
    }
}
