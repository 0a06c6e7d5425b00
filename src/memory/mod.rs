//! The blackboard every codelet reads and writes.
//!
//! Codelets never call each other. Producers write named
//! [`MemoryObject`]s, consumers read them, and the [`MemoryRegistry`] built
//! while mounting is the only place those objects are listed.

pub mod memory_object;
pub mod names;
pub mod registry;

pub use memory_object::{MemoryObject, MemorySnapshot};
pub use registry::MemoryRegistry;
