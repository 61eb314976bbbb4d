//! Drift finding lifecycle management.

use crate::error::{DriftError, Result};
use crate::findings::{DriftFinding, DriftStatus, DriftSummary};
use crate::rules::types::{DriftCategory, Severity};
use crate::store::{FindingStore, UpsertOutcome};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Owns the finding lifecycle and deduplication on top of the store seam.
pub struct DriftManager {
    store: Arc<dyn FindingStore>,
}

impl DriftManager {
    pub fn new(store: Arc<dyn FindingStore>) -> Self {
        Self { store }
    }

    /// Record a detection-cycle finding. Delegates to the store's
    /// transactional upsert so an open finding with the same
    /// (user, resource_id, drift_type) is refreshed in place rather than
    /// duplicated.
    pub fn record(&self, finding: DriftFinding) -> Result<UpsertOutcome> {
        self.store.upsert_open(finding)
    }

    pub fn get(&self, user: &str, id: Uuid) -> Result<Option<DriftFinding>> {
        self.store.get(user, id)
    }

    /// Mark a finding acknowledged.
    pub fn acknowledge(&self, user: &str, id: Uuid) -> Result<DriftFinding> {
        self.transition(user, id, DriftStatus::Acknowledged)
    }

    /// Mark a finding resolved. Acknowledgement first is not required.
    pub fn resolve(&self, user: &str, id: Uuid) -> Result<DriftFinding> {
        self.transition(user, id, DriftStatus::Resolved)
    }

    /// Mark a finding ignored.
    pub fn ignore(&self, user: &str, id: Uuid) -> Result<DriftFinding> {
        self.transition(user, id, DriftStatus::Ignored)
    }

    fn transition(&self, user: &str, id: Uuid, next: DriftStatus) -> Result<DriftFinding> {
        let mut finding = self
            .store
            .get(user, id)?
            .ok_or_else(|| DriftError::not_found("finding", id.to_string()))?;

        if !finding.status.can_transition_to(next) {
            return Err(DriftError::validation(
                "finding",
                format!("cannot transition from {} to {}", finding.status, next),
            ));
        }

        finding.status = next;
        finding.updated_at = Utc::now();
        if !next.is_open() {
            finding.resolved_at = Some(finding.updated_at);
        }
        self.store.update(finding.clone())?;
        debug!(user, %id, status = %next, "finding transitioned");
        Ok(finding)
    }

    /// Resolve every open finding on a resource whose drift type was not
    /// observed in the current detection cycle. Called by the detector when
    /// the auto-resolve policy is enabled.
    pub fn resolve_missing(
        &self,
        user: &str,
        resource_id: &str,
        observed: &[DriftCategory],
    ) -> Result<Vec<DriftFinding>> {
        let mut resolved = Vec::new();
        for finding in self.store.list_open(user)? {
            if finding.resource_id == resource_id && !observed.contains(&finding.drift_type) {
                resolved.push(self.resolve(user, finding.id)?);
            }
        }
        Ok(resolved)
    }

    /// All findings for a user.
    pub fn list(&self, user: &str) -> Result<Vec<DriftFinding>> {
        self.store.list(user)
    }

    /// All open findings for a user.
    pub fn list_open(&self, user: &str) -> Result<Vec<DriftFinding>> {
        self.store.list_open(user)
    }

    /// Counts by severity and status. A pure query over current rows, never
    /// a side effect of detection.
    pub fn summary(&self, user: &str) -> Result<DriftSummary> {
        Ok(DriftSummary::from_findings(&self.store.list(user)?))
    }

    pub fn count_by_status(&self, user: &str) -> Result<HashMap<DriftStatus, usize>> {
        let mut counts = HashMap::new();
        for finding in self.store.list(user)? {
            *counts.entry(finding.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    pub fn count_by_severity(&self, user: &str) -> Result<HashMap<Severity, usize>> {
        let mut counts = HashMap::new();
        for finding in self.store.list(user)? {
            *counts.entry(finding.severity).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
