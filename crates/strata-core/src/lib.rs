//! strata Core - Fundamental types shared by the store engine
//!
//! This crate defines:
//! - The error taxonomy (StoreError)
//! - Module paths (ModulePath)
//! - Mutation and action requests, records and call options
//! - Helpers for walking the nested state tree

pub mod error;
pub mod path;
pub mod request;
pub mod nested;

pub use error::*;
pub use path::*;
pub use request::*;
pub use nested::*;
