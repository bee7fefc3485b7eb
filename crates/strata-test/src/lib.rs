//! strata Test Harness - Scenario testing and store validation
//!
//! This crate provides:
//! - Sample module trees (counter, shopping cart) and a recording inspector
//! - End-to-end checkout scenarios with invariant checks
//! - Randomized register/commit/unregister fuzzing against a model

pub mod fixtures;
pub mod scenarios;
pub mod store_fuzzer;

pub use fixtures::*;
pub use scenarios::*;
pub use store_fuzzer::*;
