//! Mutation and action requests
//!
//! Both pipelines accept two call styles:
//! - a type name plus a separate payload
//! - a single object carrying `{ "type": ..., ... }`, which is then the payload
//!
//! [`IntoRequest`] unifies them into a [`Request`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{value_kind, StoreError, StoreResult};

/// A normalized request: the operation type and its payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

impl Request {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Request {
            kind: kind.into(),
            payload,
        }
    }

    /// Prefix the type with a namespace
    pub fn qualify(mut self, namespace: &str) -> Self {
        if !namespace.is_empty() {
            self.kind = format!("{}{}", namespace, self.kind);
        }
        self
    }
}

/// Anything that can be turned into a request given a payload
pub trait IntoRequest {
    fn into_request(self, payload: Value) -> StoreResult<Request>;
}

impl IntoRequest for &str {
    fn into_request(self, payload: Value) -> StoreResult<Request> {
        Ok(Request::new(self, payload))
    }
}

impl IntoRequest for String {
    fn into_request(self, payload: Value) -> StoreResult<Request> {
        Ok(Request::new(self, payload))
    }
}

impl IntoRequest for &String {
    fn into_request(self, payload: Value) -> StoreResult<Request> {
        Ok(Request::new(self.as_str(), payload))
    }
}

impl IntoRequest for Request {
    fn into_request(self, _payload: Value) -> StoreResult<Request> {
        Ok(self)
    }
}

/// Object style: `{ "type": "cart/add", "id": 3 }`. The separate payload is ignored.
impl IntoRequest for Value {
    fn into_request(self, payload: Value) -> StoreResult<Request> {
        match self {
            Value::String(kind) => Ok(Request::new(kind, payload)),
            Value::Object(ref map) => match map.get("type") {
                Some(Value::String(kind)) => Ok(Request::new(kind.clone(), self.clone())),
                Some(other) => Err(StoreError::InvalidRequest(value_kind(other).to_string())),
                None => Err(StoreError::InvalidRequest("object without \"type\"".to_string())),
            },
            other => Err(StoreError::InvalidRequest(value_kind(&other).to_string())),
        }
    }
}

/// Options accepted by `commit`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// From a namespaced module: commit the unqualified (root) type
    pub root: bool,
    /// Removed option, accepted and reported
    pub silent: bool,
}

impl CommitOptions {
    pub fn root() -> Self {
        CommitOptions {
            root: true,
            ..Default::default()
        }
    }
}

/// Options accepted by `dispatch`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// From a namespaced module: dispatch the unqualified (root) type
    pub root: bool,
}

impl DispatchOptions {
    pub fn root() -> Self {
        DispatchOptions { root: true }
    }
}

/// A committed mutation as seen by subscribers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

/// A dispatched action as seen by action subscribers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

impl From<Request> for MutationRecord {
    fn from(req: Request) -> Self {
        MutationRecord {
            kind: req.kind,
            payload: req.payload,
        }
    }
}

impl From<Request> for ActionRecord {
    fn from(req: Request) -> Self {
        ActionRecord {
            kind: req.kind,
            payload: req.payload,
        }
    }
}
