//! # Tollgate Core
//!
//! The domain layer of the Tollgate rate-limiting gateway.
//! This crate contains pure business logic with zero infrastructure
//! dependencies: the sliding-window accounting model, the token estimator,
//! and the ports that infrastructure must implement.

pub mod domain;
pub mod error;
pub mod estimator;
pub mod ports;

pub use error::{AdmissionError, RegistryError};
