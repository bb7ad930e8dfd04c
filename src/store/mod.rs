//! Version storage and the buffer operations built on it.
//!
//! [`VersionStore`] is the append-only commit DAG. The remaining modules
//! extend [`Buffer`](crate::model::buffer::Buffer) with branch, working-tree
//! and history operations.

pub mod branch;
pub mod lifecycle;
pub mod version_store;
pub mod working_tree;

pub use version_store::{Ancestors, VersionStore};
