//! Request middleware: bearer extraction and error mapping.

pub mod auth;
pub mod error;

pub use auth::BearerCredential;
pub use error::GatewayError;
