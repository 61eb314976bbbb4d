//! Detection run orchestration.
//!
//! Per-resource diffing and rule evaluation are pure and hold no locks, so
//! resources can be processed on any number of workers; the only guarded
//! step is the open-finding upsert inside the store. Partial failures on
//! individual resources are collected and never abort the run.

use crate::baseline::{Baseline, BaselineManager};
use crate::diff::{FieldChange, diff_configs};
use crate::error::Result;
use crate::findings::{DriftFinding, DriftStatus};
use crate::manager::DriftManager;
use crate::provider::{ResourceProvider, ResourceSnapshot};
use crate::rules::evaluator::{RuleEvaluator, max_severity, primary_match};
use crate::rules::types::{DriftCategory, RuleMatch, RuleScope, Severity};
use crate::store::{BaselineStore, FindingStore, UpsertOutcome};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Behavior switches for a detection run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionPolicy {
    /// When true, open findings whose divergence was not observed in the
    /// current cycle are resolved automatically. When false (the default)
    /// they stay open until a human resolves them.
    pub auto_resolve: bool,
}

/// A per-resource failure collected during a run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResourceError {
    pub resource_id: String,
    pub error: String,
}

/// Outcome of one detection run.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DetectionReport {
    pub resources_scanned: usize,
    pub created: usize,
    pub updated: usize,
    pub auto_resolved: usize,
    pub errors: Vec<ResourceError>,
}

/// Orchestrates provider → baseline → diff → rules → finding upsert.
pub struct DriftDetector {
    provider: Arc<dyn ResourceProvider>,
    baselines: BaselineManager,
    findings: DriftManager,
    evaluator: RuleEvaluator,
    policy: DetectionPolicy,
}

impl DriftDetector {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        baseline_store: Arc<dyn BaselineStore>,
        finding_store: Arc<dyn FindingStore>,
    ) -> Self {
        Self {
            provider,
            baselines: BaselineManager::new(baseline_store),
            findings: DriftManager::new(finding_store),
            evaluator: RuleEvaluator::new(),
            policy: DetectionPolicy::default(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: RuleEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_policy(mut self, policy: DetectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn baselines(&self) -> &BaselineManager {
        &self.baselines
    }

    pub fn findings(&self) -> &DriftManager {
        &self.findings
    }

    /// Run detection over every resource the provider reports for a user.
    ///
    /// Individual resource failures land in the report's error list; only a
    /// provider failure for the whole listing aborts the run.
    pub fn detect_drifts(&self, user: &str) -> Result<DetectionReport> {
        let resources = self.provider.resources(user)?;
        let mut report = DetectionReport {
            resources_scanned: resources.len(),
            ..DetectionReport::default()
        };
        debug!(user, resources = resources.len(), "starting detection run");

        for snapshot in &resources {
            if let Err(err) = self.process_resource(user, snapshot, &mut report) {
                warn!(
                    user,
                    resource_id = %snapshot.resource_id,
                    error = %err,
                    "resource failed during detection"
                );
                report.errors.push(ResourceError {
                    resource_id: snapshot.resource_id.clone(),
                    error: err.to_string(),
                });
            }
        }

        debug!(
            user,
            created = report.created,
            updated = report.updated,
            auto_resolved = report.auto_resolved,
            errors = report.errors.len(),
            "detection run finished"
        );
        Ok(report)
    }

    fn process_resource(
        &self,
        user: &str,
        snapshot: &ResourceSnapshot,
        report: &mut DetectionReport,
    ) -> Result<()> {
        snapshot.validate()?;
        let baseline = self.baselines.get_or_create(user, snapshot)?;

        // Identical content hashes mean identical trees; skip the diff but
        // still evaluate posture rules against the current configuration.
        let changes =
            if baseline.config_hash == Baseline::hash_configuration(&snapshot.configuration) {
                Vec::new()
            } else {
                diff_configs(&baseline.configuration, &snapshot.configuration).changes
            };

        let matches = self.evaluator.evaluate(
            &snapshot.resource_type,
            snapshot.provider,
            &changes,
            &snapshot.configuration,
        );

        // Changes already claimed by a diff-scope rule; the rest become an
        // info-severity configuration_change finding so raw drift is never
        // silently dropped.
        let matched_paths: HashSet<String> = matches
            .iter()
            .filter(|m| m.scope == RuleScope::Diff)
            .map(|m| m.evidence.field_path.clone())
            .collect();
        let leftover: Vec<FieldChange> = changes
            .iter()
            .filter(|c| !matched_paths.contains(&c.field_path))
            .cloned()
            .collect();

        let mut groups: HashMap<DriftCategory, Vec<RuleMatch>> = HashMap::default();
        let mut order: Vec<DriftCategory> = Vec::new();
        for rule_match in matches {
            if !groups.contains_key(&rule_match.category) {
                order.push(rule_match.category);
            }
            groups.entry(rule_match.category).or_default().push(rule_match);
        }

        let mut observed = Vec::new();
        for category in order {
            let group = &groups[&category];
            let finding = build_finding(user, snapshot, category, group);
            observed.push(category);
            match self.findings.record(finding)? {
                UpsertOutcome::Created => report.created += 1,
                UpsertOutcome::Updated => report.updated += 1,
            }
        }

        if !leftover.is_empty() {
            let finding = configuration_change_finding(user, snapshot, leftover);
            observed.push(DriftCategory::ConfigurationChange);
            match self.findings.record(finding)? {
                UpsertOutcome::Created => report.created += 1,
                UpsertOutcome::Updated => report.updated += 1,
            }
        }

        if self.policy.auto_resolve {
            let resolved = self
                .findings
                .resolve_missing(user, &snapshot.resource_id, &observed)?;
            report.auto_resolved += resolved.len();
        }
        Ok(())
    }
}

/// Build the finding for one (resource, drift category) group of matches.
///
/// Severity is the maximum across the group; the earliest-declared rule
/// among the maximum-severity ties is the primary rule and supplies the
/// title.
fn build_finding(
    user: &str,
    snapshot: &ResourceSnapshot,
    category: DriftCategory,
    group: &[RuleMatch],
) -> DriftFinding {
    let severity = max_severity(group).unwrap_or(Severity::Info);
    let primary = primary_match(group).expect("non-empty match group");

    let description = if group.len() == 1 {
        format!("Rule {} matched. {}", primary.rule_id, primary.remediation)
    } else {
        format!(
            "{} rules matched; primary rule {}. {}",
            group.len(),
            primary.rule_id,
            primary.remediation
        )
    };

    let mut rule_ids = Vec::new();
    for rule_match in group {
        if !rule_ids.contains(&rule_match.rule_id) {
            rule_ids.push(rule_match.rule_id.clone());
        }
    }

    let now = Utc::now();
    DriftFinding {
        id: Uuid::new_v4(),
        user: user.to_string(),
        resource_id: snapshot.resource_id.clone(),
        provider: snapshot.provider,
        resource_type: snapshot.resource_type.clone(),
        drift_type: category,
        severity,
        title: primary.title.clone(),
        description,
        changes: group.iter().map(|m| m.evidence.clone()).collect(),
        rule_ids,
        status: DriftStatus::Detected,
        detected_at: now,
        updated_at: now,
        resolved_at: None,
    }
}

fn configuration_change_finding(
    user: &str,
    snapshot: &ResourceSnapshot,
    changes: Vec<FieldChange>,
) -> DriftFinding {
    let now = Utc::now();
    let description = format!(
        "{} field(s) diverged from the baseline without matching a security rule",
        changes.len()
    );
    DriftFinding {
        id: Uuid::new_v4(),
        user: user.to_string(),
        resource_id: snapshot.resource_id.clone(),
        provider: snapshot.provider,
        resource_type: snapshot.resource_type.clone(),
        drift_type: DriftCategory::ConfigurationChange,
        severity: Severity::Info,
        title: "Configuration changed from baseline".to_string(),
        description,
        changes,
        rule_ids: Vec::new(),
        status: DriftStatus::Detected,
        detected_at: now,
        updated_at: now,
        resolved_at: None,
    }
}
