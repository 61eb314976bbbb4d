//! In-memory reference store.

use crate::baseline::{Baseline, BaselineType};
use crate::compliance::assessment::{Assessment, AssessmentStatus};
use crate::compliance::controls::Framework;
use crate::error::Result;
use crate::findings::DriftFinding;
use crate::rules::types::DriftCategory;
use crate::store::{AssessmentStore, BaselineStore, FindingStore, UpsertOutcome};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

type BaselineKey = (String, String, BaselineType);
type OpenKey = (String, String, DriftCategory);

/// Finding rows plus the open-finding index, kept behind one lock so the
/// upsert critical section covers both.
#[derive(Default)]
struct FindingTable {
    rows: HashMap<Uuid, DriftFinding>,
    open: HashMap<OpenKey, Uuid>,
}

/// In-memory implementation of all three store traits.
#[derive(Default)]
pub struct MemoryStore {
    baselines: RwLock<HashMap<BaselineKey, Baseline>>,
    findings: RwLock<FindingTable>,
    assessments: RwLock<Vec<Assessment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaselineStore for MemoryStore {
    fn get(
        &self,
        user: &str,
        resource_id: &str,
        baseline_type: BaselineType,
    ) -> Result<Option<Baseline>> {
        let key = (user.to_string(), resource_id.to_string(), baseline_type);
        Ok(self.baselines.read().get(&key).cloned())
    }

    fn upsert(&self, baseline: Baseline) -> Result<()> {
        let key = (
            baseline.user.clone(),
            baseline.resource_id.clone(),
            baseline.baseline_type,
        );
        self.baselines.write().insert(key, baseline);
        Ok(())
    }

    fn delete(&self, user: &str, resource_id: &str, baseline_type: BaselineType) -> Result<bool> {
        let key = (user.to_string(), resource_id.to_string(), baseline_type);
        Ok(self.baselines.write().remove(&key).is_some())
    }

    fn list(&self, user: &str) -> Result<Vec<Baseline>> {
        let mut rows: Vec<Baseline> = self
            .baselines
            .read()
            .values()
            .filter(|b| b.user == user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.resource_id.as_str(), a.baseline_type.as_str())
                .cmp(&(b.resource_id.as_str(), b.baseline_type.as_str()))
        });
        Ok(rows)
    }
}

impl FindingStore for MemoryStore {
    fn upsert_open(&self, candidate: DriftFinding) -> Result<UpsertOutcome> {
        let key = candidate.natural_key();
        // Single write-lock critical section: the equivalent of a
        // transactional upsert on the open-finding unique key.
        let mut table = self.findings.write();
        match table.open.get(&key).copied() {
            Some(existing_id) => {
                let existing = table
                    .rows
                    .get_mut(&existing_id)
                    .expect("open index points at a live row");
                existing.severity = candidate.severity;
                existing.title = candidate.title;
                existing.description = candidate.description;
                existing.changes = candidate.changes;
                existing.rule_ids = candidate.rule_ids;
                existing.updated_at = Utc::now();
                Ok(UpsertOutcome::Updated)
            }
            None => {
                table.open.insert(key, candidate.id);
                table.rows.insert(candidate.id, candidate);
                Ok(UpsertOutcome::Created)
            }
        }
    }

    fn get(&self, user: &str, id: Uuid) -> Result<Option<DriftFinding>> {
        Ok(self
            .findings
            .read()
            .rows
            .get(&id)
            .filter(|f| f.user == user)
            .cloned())
    }

    fn get_open(
        &self,
        user: &str,
        resource_id: &str,
        drift_type: DriftCategory,
    ) -> Result<Option<DriftFinding>> {
        let key = (user.to_string(), resource_id.to_string(), drift_type);
        let table = self.findings.read();
        Ok(table
            .open
            .get(&key)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    fn update(&self, finding: DriftFinding) -> Result<()> {
        let mut table = self.findings.write();
        if !table.rows.contains_key(&finding.id) {
            return Err(crate::error::DriftError::not_found(
                "finding",
                finding.id.to_string(),
            ));
        }
        let key = finding.natural_key();
        if finding.status.is_open() {
            table.open.insert(key, finding.id);
        } else if table.open.get(&key) == Some(&finding.id) {
            table.open.remove(&key);
        }
        table.rows.insert(finding.id, finding);
        Ok(())
    }

    fn list(&self, user: &str) -> Result<Vec<DriftFinding>> {
        let mut rows: Vec<DriftFinding> = self
            .findings
            .read()
            .rows
            .values()
            .filter(|f| f.user == user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.detected_at.cmp(&b.detected_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    fn list_open(&self, user: &str) -> Result<Vec<DriftFinding>> {
        let table = self.findings.read();
        let mut rows: Vec<DriftFinding> = table
            .open
            .values()
            .filter_map(|id| table.rows.get(id))
            .filter(|f| f.user == user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.detected_at.cmp(&b.detected_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

impl AssessmentStore for MemoryStore {
    fn append(&self, assessment: Assessment) -> Result<()> {
        self.assessments.write().push(assessment);
        Ok(())
    }

    fn list(&self, user: &str, framework: Framework) -> Result<Vec<Assessment>> {
        Ok(self
            .assessments
            .read()
            .iter()
            .filter(|a| a.user == user && a.framework == framework)
            .cloned()
            .collect())
    }

    fn latest_completed(
        &self,
        user: &str,
        framework: Framework,
        limit: usize,
    ) -> Result<Vec<Assessment>> {
        let mut rows: Vec<Assessment> = self
            .assessments
            .read()
            .iter()
            .filter(|a| {
                a.user == user
                    && a.framework == framework
                    && a.status == AssessmentStatus::Completed
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        rows.truncate(limit);
        Ok(rows)
    }
}
