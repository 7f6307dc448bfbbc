//! YAML credential registry.
//!
//! Loads `credential -> (rpm, input_tpm, output_tpm)` from a declarative
//! document at startup and on explicit reload. Lookups read a point-in-time
//! snapshot through `ArcSwap`, so in-flight admissions always see a
//! consistent triple; reloads publish a whole new snapshot with one atomic
//! pointer swap and never mutate in place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Deserialize;

use tollgate_core::domain::CredentialLimits;
use tollgate_core::error::RegistryError;
use tollgate_core::ports::CredentialStore;

/// On-disk shape: `keys: { <credential>: { request_per_minute,
/// input_tokens_per_minute, output_tokens_per_minute } }`. All three numeric
/// fields are required and non-negative.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    keys: HashMap<String, KeyLimits>,
}

#[derive(Debug, Deserialize)]
struct KeyLimits {
    request_per_minute: u64,
    input_tokens_per_minute: u64,
    output_tokens_per_minute: u64,
}

impl From<KeyLimits> for CredentialLimits {
    fn from(limits: KeyLimits) -> Self {
        Self {
            rpm: limits.request_per_minute,
            input_tpm: limits.input_tokens_per_minute,
            output_tpm: limits.output_tokens_per_minute,
        }
    }
}

type Snapshot = HashMap<String, CredentialLimits>;

#[derive(Debug)]
pub struct ApiKeyRegistry {
    path: PathBuf,
    snapshot: ArcSwap<Snapshot>,
}

impl ApiKeyRegistry {
    /// Load the credentials document, failing if it is missing or malformed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let snapshot = read_snapshot(&path)?;
        tracing::info!(
            path = %path.display(),
            credentials = snapshot.len(),
            "Loaded credential registry"
        );
        Ok(Self {
            path,
            snapshot: ArcSwap::from_pointee(snapshot),
        })
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }
}

impl CredentialStore for ApiKeyRegistry {
    fn resolve(&self, credential: &str) -> Option<CredentialLimits> {
        self.snapshot.load().get(credential).copied()
    }

    fn reload(&self) -> Result<usize, RegistryError> {
        let next = read_snapshot(&self.path)?;
        let count = next.len();
        self.snapshot.store(Arc::new(next));
        Ok(count)
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot, RegistryError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let parsed: CredentialsFile =
        serde_yaml_ng::from_str(&raw).map_err(|e| RegistryError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    Ok(parsed
        .keys
        .into_iter()
        .map(|(credential, limits)| (credential, limits.into()))
        .collect())
}
