//! Core abstractions for out-of-order streaming HTML composition.
//!
//! This crate provides the data model shared by every pipeline stage:
//! - `Token` - Typed markup events produced by the tokenizer
//! - `TaskInfo` / `ResolvedWork` - Units of work bound to placeholder elements
//! - `Resolver` trait - Pluggable task lookup
//! - `HtmsError` - Stream failure taxonomy
//! - `PipelineConfig` - Per-document pipeline options
//! - `PipelineTiming` - Per-document timing marks

mod config;
mod error;
mod lifecycle;
mod task;
mod token;

pub use config::*;
pub use error::*;
pub use lifecycle::*;
pub use task::*;
pub use token::*;

/// Attribute naming the task bound to a placeholder element.
pub const TASK_ATTRIBUTE: &str = "data-htms";

/// Attribute naming the module a task (or a scope of tasks) resolves against.
pub const MODULE_ATTRIBUTE: &str = "data-htms-module";

/// Attribute correlating a rendered placeholder with its chunk.
pub const UUID_ATTRIBUTE: &str = "data-htms-uuid";
