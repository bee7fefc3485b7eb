//! strata Store - Hierarchical state container
//!
//! This crate implements the store engine:
//! 1. Build the module tree from a root definition
//! 2. Install handlers under namespaced type names
//! 3. Commit: run mutation handlers inside one guarded write
//! 4. Dispatch: run action handlers, observe them before and after settlement
//! 5. Project getters over the live state with per-version memoization
//! 6. Register, unregister and hot-update modules at runtime
//!
//! Strict mode, the devtools bridge and the logger plugin sit on top of the
//! commit pipeline.

pub mod context;
pub mod definition;
pub mod devtools;
pub mod getters;
pub mod host;
pub mod logger;
pub mod manifest;
pub mod module;
pub mod observable;
pub mod store;
pub mod subscription;
pub mod tree;

pub use context::*;
pub use definition::*;
pub use devtools::{DevtoolsEvent, DevtoolsHook, TravelHandler};
pub use getters::*;
pub use host::*;
pub use logger::*;
pub use manifest::*;
pub use module::*;
pub use observable::*;
pub use store::*;
pub use subscription::*;
pub use tree::*;

pub use strata_core::*;
