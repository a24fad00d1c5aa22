//! Resolver implementations.
//!
//! This crate provides:
//! - `ModuleRegistry` / `ModuleResolver` - In-memory task modules with named exports
//! - `FnResolver` - Resolver backed by a closure
//! - `FragmentResolver` - Tasks that read HTML fragments from a directory tree
//! - `ResolveError` - Lookup failures reported through rejecting tasks

mod error;
mod fragment;
mod function;
mod module;

pub use error::*;
pub use fragment::*;
pub use function::*;
pub use module::*;
