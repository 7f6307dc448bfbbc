//! Admission control implementations.

mod bypass;
mod memory;
mod redis;

pub use bypass::BypassAdmission;
pub use memory::InMemoryAdmission;
pub use self::redis::{RedisAdmission, RedisAdmissionConfig};
