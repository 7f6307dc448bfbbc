//! # Tollgate Infrastructure
//!
//! Concrete implementations of the ports defined in `tollgate-core`:
//! the Redis-scripted admission backend, its single-node stand-ins, and the
//! YAML credential registry.

pub mod admission;
pub mod registry;

pub use admission::{BypassAdmission, InMemoryAdmission, RedisAdmission, RedisAdmissionConfig};
pub use registry::ApiKeyRegistry;
