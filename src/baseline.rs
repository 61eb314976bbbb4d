//! Baseline snapshots and the baseline manager.

use crate::error::{DriftError, Result};
use crate::provider::{CloudProvider, ResourceSnapshot};
use crate::store::BaselineStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// How a baseline came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineType {
    /// Saved explicitly by an operator.
    Manual,
    /// Captured from the first observed configuration of a resource.
    Automatic,
    /// Reviewed and approved; preferred over all others during detection.
    Approved,
}

impl BaselineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaselineType::Manual => "manual",
            BaselineType::Automatic => "automatic",
            BaselineType::Approved => "approved",
        }
    }
}

impl std::fmt::Display for BaselineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored configuration snapshot used as the comparison point for drift
/// detection. Exactly one row exists per (user, resource_id, baseline_type);
/// re-creation is an upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub user: String,
    pub resource_id: String,
    pub provider: CloudProvider,
    pub resource_type: String,
    pub configuration: Value,
    /// SHA-256 of the canonical configuration JSON. Detection compares
    /// hashes first to skip diffing unchanged resources.
    pub config_hash: String,
    pub baseline_type: BaselineType,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Baseline {
    pub fn new(
        user: impl Into<String>,
        resource_id: impl Into<String>,
        provider: CloudProvider,
        resource_type: impl Into<String>,
        configuration: Value,
        baseline_type: BaselineType,
        description: impl Into<String>,
    ) -> Result<Self> {
        let user = user.into();
        let resource_id = resource_id.into();
        let resource_type = resource_type.into();
        if user.is_empty() {
            return Err(DriftError::validation("baseline", "missing user"));
        }
        if resource_id.is_empty() {
            return Err(DriftError::validation("baseline", "missing resource_id"));
        }
        if resource_type.is_empty() {
            return Err(DriftError::validation("baseline", "missing resource_type"));
        }

        let now = Utc::now();
        Ok(Self {
            user,
            resource_id,
            provider,
            resource_type,
            config_hash: Self::hash_configuration(&configuration),
            configuration,
            baseline_type,
            description: description.into(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Hash the canonical JSON form of a configuration tree.
    ///
    /// `serde_json` serializes object keys in sorted order, so equal trees
    /// always hash equal.
    pub fn hash_configuration(configuration: &Value) -> String {
        let canonical = serde_json::to_string(configuration).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Replace the stored configuration, rehash, bump `updated_at`.
    pub fn replace_configuration(&mut self, configuration: Value, description: impl Into<String>) {
        self.config_hash = Self::hash_configuration(&configuration);
        self.configuration = configuration;
        self.description = description.into();
        self.updated_at = Utc::now();
    }
}

/// Owns baseline lifecycle on top of the persistence seam.
pub struct BaselineManager {
    store: Arc<dyn BaselineStore>,
}

impl BaselineManager {
    pub fn new(store: Arc<dyn BaselineStore>) -> Self {
        Self { store }
    }

    /// Return the baseline detection should compare against: the approved
    /// baseline if one exists, otherwise the automatic one, creating the
    /// automatic baseline from the resource's current configuration on
    /// first observation.
    ///
    /// A freshly-discovered resource therefore never drifts against an
    /// empty or missing baseline on its very first scan.
    pub fn get_or_create(&self, user: &str, snapshot: &ResourceSnapshot) -> Result<Baseline> {
        snapshot.validate()?;

        if let Some(approved) =
            self.store
                .get(user, &snapshot.resource_id, BaselineType::Approved)?
        {
            return Ok(approved);
        }
        if let Some(automatic) =
            self.store
                .get(user, &snapshot.resource_id, BaselineType::Automatic)?
        {
            return Ok(automatic);
        }

        debug!(
            user,
            resource_id = %snapshot.resource_id,
            "creating automatic baseline on first observation"
        );
        let baseline = Baseline::new(
            user,
            &snapshot.resource_id,
            snapshot.provider,
            &snapshot.resource_type,
            snapshot.configuration.clone(),
            BaselineType::Automatic,
            "captured automatically on first observation",
        )?;
        self.store.upsert(baseline.clone())?;
        Ok(baseline)
    }

    /// Save a baseline, replacing any existing row with the same
    /// (user, resource_id, baseline_type) key.
    pub fn save(&self, baseline: Baseline) -> Result<()> {
        self.store.upsert(baseline)
    }

    /// Replace an existing baseline's configuration and description.
    pub fn update(
        &self,
        user: &str,
        resource_id: &str,
        baseline_type: BaselineType,
        configuration: Value,
        description: &str,
    ) -> Result<Baseline> {
        let mut baseline = self
            .store
            .get(user, resource_id, baseline_type)?
            .ok_or_else(|| {
                DriftError::not_found("baseline", format!("{user}/{resource_id}/{baseline_type}"))
            })?;
        baseline.replace_configuration(configuration, description);
        self.store.upsert(baseline.clone())?;
        Ok(baseline)
    }

    /// Remove a baseline explicitly.
    pub fn delete(
        &self,
        user: &str,
        resource_id: &str,
        baseline_type: BaselineType,
    ) -> Result<()> {
        if !self.store.delete(user, resource_id, baseline_type)? {
            return Err(DriftError::not_found(
                "baseline",
                format!("{user}/{resource_id}/{baseline_type}"),
            ));
        }
        Ok(())
    }

    /// All baselines for a user.
    pub fn list(&self, user: &str) -> Result<Vec<Baseline>> {
        self.store.list(user)
    }
}
