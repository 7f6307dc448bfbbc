//! Credential registry port.

use crate::domain::CredentialLimits;
use crate::error::RegistryError;

/// Point-in-time lookup of per-credential limits.
///
/// `resolve` reads a consistent snapshot: a reload happening concurrently
/// never exposes a half-updated mapping. Unknown credentials are a distinct
/// outcome (`None`), never coerced into default limits.
pub trait CredentialStore: Send + Sync {
    fn resolve(&self, credential: &str) -> Option<CredentialLimits>;

    /// Re-read the backing source and atomically publish a new snapshot.
    /// On failure the current snapshot stays in place. Returns the number of
    /// credentials in the new snapshot.
    fn reload(&self) -> Result<usize, RegistryError>;
}
