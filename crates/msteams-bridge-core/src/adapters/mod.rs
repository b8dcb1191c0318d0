//! # Infrastructure Adapters
//!
//! Concrete implementations of the persistence traits.

pub mod memory_store;

pub use memory_store::InMemoryStore;
