//! Poolfi Service - operation compositions
//!
//! Wires the accounting engine, the risk engine and the stores together:
//! each user-facing operation accrues interest, drives the wrapper mutation
//! protocol, applies the required health checks, and only then hands the
//! mutated entities to the store.

pub mod error;
pub mod memory;
pub mod service;

pub use error::ServiceError;
pub use memory::MemoryStore;
pub use service::{LendingService, LendingStore};
