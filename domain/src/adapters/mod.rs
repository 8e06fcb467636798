//! Built-in adapters that have no external dependencies.

pub mod memory_store;
