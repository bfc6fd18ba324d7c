//! Rendering parity harness
//!
//! Runs a catalog of test documents through an external renderer, compares
//! each frame against a stored baseline, and aggregates the results into
//! reports that CI can gate on.

pub mod catalog;
pub mod cli;
pub mod commands;
pub mod common;
pub mod exec;
pub mod report;
pub mod schedule;
pub mod work;

// Re-export commonly used types for tests
pub use catalog::{Catalog, Category, Viewport};
pub use common::{Error, Result};
pub use work::{RunId, WorkUnit};
