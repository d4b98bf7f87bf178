//! Test-only adapters that live inside the domain crate for convenience.
//!
//! These are intended for unit testing and local demos. Real database
//! adapters live in separate crates.

pub mod memory_context;
