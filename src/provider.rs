//! Resource provider seam.
//!
//! Extraction of live configurations from cloud vendors is an external
//! collaborator concern; the engine only consumes [`ResourceSnapshot`]s
//! through the [`ResourceProvider`] trait.

use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cloud vendor a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
}

impl CloudProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Azure => "azure",
            CloudProvider::Gcp => "gcp",
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resource's identity and current configuration as supplied by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub resource_id: String,
    pub provider: CloudProvider,
    pub resource_type: String,
    pub configuration: Value,
}

impl ResourceSnapshot {
    pub fn new(
        resource_id: impl Into<String>,
        provider: CloudProvider,
        resource_type: impl Into<String>,
        configuration: Value,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            provider,
            resource_type: resource_type.into(),
            configuration,
        }
    }

    /// Reject snapshots missing required identifiers.
    pub fn validate(&self) -> Result<()> {
        if self.resource_id.is_empty() {
            return Err(DriftError::validation("resource", "missing resource_id"));
        }
        if self.resource_type.is_empty() {
            return Err(DriftError::validation("resource", "missing resource_type"));
        }
        Ok(())
    }
}

/// Supplies the current configuration of every resource visible to a user.
pub trait ResourceProvider: Send + Sync {
    fn resources(&self, user: &str) -> Result<Vec<ResourceSnapshot>>;
}

/// Provider backed by a fixed snapshot list. Useful for tests and embedders
/// that fetch configurations out of band.
#[derive(Debug, Default)]
pub struct StaticProvider {
    resources: Vec<ResourceSnapshot>,
}

impl StaticProvider {
    pub fn new(resources: Vec<ResourceSnapshot>) -> Self {
        Self { resources }
    }
}

impl ResourceProvider for StaticProvider {
    fn resources(&self, _user: &str) -> Result<Vec<ResourceSnapshot>> {
        Ok(self.resources.clone())
    }
}
