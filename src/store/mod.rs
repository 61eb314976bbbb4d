//! Persistence seam.
//!
//! The concrete persistence technology is an external collaborator; the
//! engine only depends on these traits. [`MemoryStore`] is the reference
//! implementation used by tests and embedders.

mod memory;

pub use memory::MemoryStore;

use crate::baseline::{Baseline, BaselineType};
use crate::compliance::assessment::Assessment;
use crate::compliance::controls::Framework;
use crate::error::Result;
use crate::findings::DriftFinding;
use crate::rules::types::DriftCategory;
use uuid::Uuid;

/// Outcome of an upsert on a natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Baseline rows, keyed by (user, resource_id, baseline_type).
pub trait BaselineStore: Send + Sync {
    fn get(
        &self,
        user: &str,
        resource_id: &str,
        baseline_type: BaselineType,
    ) -> Result<Option<Baseline>>;

    /// Insert or replace the row with the baseline's natural key.
    fn upsert(&self, baseline: Baseline) -> Result<()>;

    /// Remove a row; returns whether one existed.
    fn delete(&self, user: &str, resource_id: &str, baseline_type: BaselineType) -> Result<bool>;

    fn list(&self, user: &str) -> Result<Vec<Baseline>>;
}

/// Drift finding rows.
///
/// `upsert_open` is the concurrency-critical operation: it must locate the
/// open row for the candidate's (user, resource_id, drift_type) key and
/// either refresh it in place or insert the candidate, atomically. Callers
/// never implement find-then-insert on top of this trait.
pub trait FindingStore: Send + Sync {
    /// Atomic create-or-refresh of the open finding matching the candidate's
    /// natural key. On refresh the original id, status, and detected_at are
    /// kept; severity, title, description, changes, rule_ids, and
    /// updated_at are taken from the candidate.
    fn upsert_open(&self, candidate: DriftFinding) -> Result<UpsertOutcome>;

    fn get(&self, user: &str, id: Uuid) -> Result<Option<DriftFinding>>;

    fn get_open(
        &self,
        user: &str,
        resource_id: &str,
        drift_type: DriftCategory,
    ) -> Result<Option<DriftFinding>>;

    /// Replace an existing row by id (status transitions).
    fn update(&self, finding: DriftFinding) -> Result<()>;

    fn list(&self, user: &str) -> Result<Vec<DriftFinding>>;

    /// One consistent snapshot of every open finding for a user.
    fn list_open(&self, user: &str) -> Result<Vec<DriftFinding>>;
}

/// Append-only assessment history.
pub trait AssessmentStore: Send + Sync {
    fn append(&self, assessment: Assessment) -> Result<()>;

    fn list(&self, user: &str, framework: Framework) -> Result<Vec<Assessment>>;

    /// The most recent completed assessments, newest first, up to `limit`.
    fn latest_completed(
        &self,
        user: &str,
        framework: Framework,
        limit: usize,
    ) -> Result<Vec<Assessment>>;
}
