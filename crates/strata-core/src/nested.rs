//! Nested state helpers
//!
//! The live state tree is a JSON document; a module's slice lives under its
//! path, one object level per segment.

use serde_json::Value;

use crate::ModulePath;

/// Walk the state tree along `path`
pub fn get_nested<'a>(state: &'a Value, path: &ModulePath) -> Option<&'a Value> {
    path.iter().try_fold(state, |node, key| node.get(key))
}

/// Walk the state tree along `path`, mutably
pub fn get_nested_mut<'a>(state: &'a mut Value, path: &ModulePath) -> Option<&'a mut Value> {
    path.iter().try_fold(state, |node, key| node.get_mut(key))
}

/// Short name of a value's JSON type, used in diagnostics
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
