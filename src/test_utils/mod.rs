/// Deterministic in-memory driver for exercising services without a database.
pub mod scripted;

/// Helper utilities for testing and development
pub mod test_helpers;

pub use scripted::{Execution, Response, Script, ScriptedDriver, ScriptedResult};
pub use test_helpers::{create_test_row, text_fields};
