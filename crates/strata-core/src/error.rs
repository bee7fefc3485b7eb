//! Error types for the strata store

use thiserror::Error;

use crate::ModulePath;

/// Boxed error produced by user action handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core store errors
#[derive(Error, Debug)]
pub enum StoreError {
    // Authoring errors
    #[error(
        "{kind} should be {expected} but \"{kind}.{key}\"{suffix} is {found}",
        suffix = module_suffix(.path)
    )]
    Shape {
        path: ModulePath,
        kind: &'static str,
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("module not found: \"{0}\"")]
    Lookup(ModulePath),

    #[error("cannot register the root module by using register_module")]
    RootModule,

    #[error("expects string as the type, but found {0}")]
    InvalidRequest(String),

    // Invariant violations
    #[error("do not mutate store state outside mutation handlers")]
    IllegalMutation,

    #[error("precondition failed: {0}")]
    Precondition(String),

    // Unknown operation types (reported, never thrown by the pipelines)
    #[error("unknown mutation type: {0}")]
    UnknownMutation(String),

    #[error("unknown action type: {0}")]
    UnknownAction(String),

    #[error("unknown getter: {0}")]
    UnknownGetter(String),

    // Runtime errors
    #[error("store has been dropped")]
    Detached,

    #[error("action failed: {0}")]
    Action(#[source] BoxError),
}

impl StoreError {
    /// Wrap an arbitrary failure raised inside an action handler
    pub fn action<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        StoreError::Action(err.into())
    }

    /// Whether this error is fatal to the caller (as opposed to merely reported)
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            StoreError::UnknownMutation(_)
                | StoreError::UnknownAction(_)
                | StoreError::UnknownGetter(_)
        )
    }
}

fn module_suffix(path: &ModulePath) -> String {
    if path.is_root() {
        String::new()
    } else {
        format!(" in module \"{}\"", path)
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
