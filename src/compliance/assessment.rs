//! Compliance assessment runs and trend reporting.

use crate::compliance::controls::{ComplianceControl, Framework, controls_for};
use crate::compliance::mapping::{MappingConfidence, MappingTable};
use crate::error::Result;
use crate::findings::DriftFinding;
use crate::rules::types::Severity;
use crate::store::{AssessmentStore, FindingStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStatus {
    Passed,
    Failed,
    /// The engine has no technical check mapped to this control at all.
    NotApplicable,
}

/// Per-control outcome of one assessment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResult {
    pub control_id: String,
    pub title: String,
    pub severity: Severity,
    pub status: ControlStatus,
    /// Highest confidence tier among the technical evidence that failed the
    /// control. `None` for passed or not-applicable controls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_confidence: Option<MappingConfidence>,
    /// Unresolved findings mapped at confidence >= medium.
    pub finding_ids: Vec<Uuid>,
    /// Findings mapped at low confidence. Informational only; never fail
    /// the control.
    pub advisory_finding_ids: Vec<Uuid>,
}

/// A scored, timestamped run of all controls in a framework for a user.
/// Immutable once completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Uuid,
    pub user: String,
    pub framework: Framework,
    pub control_results: Vec<ControlResult>,
    pub total_controls: usize,
    pub passed: usize,
    pub failed: usize,
    pub not_applicable: usize,
    /// Absent when the run failed: a partial score is never published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_percent: Option<f64>,
    pub status: AssessmentStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Assessment {
    /// A fresh running assessment with empty results.
    pub fn start(user: impl Into<String>, framework: Framework) -> Self {
        Self {
            id: Uuid::new_v4(),
            user: user.into(),
            framework,
            control_results: Vec::new(),
            total_controls: 0,
            passed: 0,
            failed: 0,
            not_applicable: 0,
            compliance_percent: None,
            status: AssessmentStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// passed/(passed+failed) as a percentage, rounded to one decimal.
///
/// Defined as 100.0 whenever failed = 0, including the degenerate case
/// where every control was not-applicable. Always within [0, 100].
pub fn compliance_percent(passed: usize, failed: usize) -> f64 {
    if failed == 0 {
        return 100.0;
    }
    let percent = passed as f64 / (passed + failed) as f64 * 100.0;
    (percent * 10.0).round() / 10.0
}

/// Direction of change between the two most recent completed assessments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendReport {
    pub framework: Framework,
    pub trend: Trend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_percent: Option<f64>,
    /// Relative change in percent; absent with fewer than two completed
    /// runs or a zero previous score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkSummary {
    pub framework: Framework,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_percent: Option<f64>,
    pub passed: usize,
    pub failed: usize,
    pub not_applicable: usize,
    pub trend: Trend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailingControl {
    pub framework: Framework,
    pub control_id: String,
    pub title: String,
    pub severity: Severity,
    pub finding_count: usize,
}

/// Cross-framework compliance rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceOverview {
    pub user: String,
    /// Aggregate passed/failed across the latest completed assessment of
    /// each framework. Absent when no framework has completed a run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_percent: Option<f64>,
    pub frameworks: Vec<FrameworkSummary>,
    pub top_failing_controls: Vec<FailingControl>,
    pub generated_at: DateTime<Utc>,
}

const TOP_FAILING_LIMIT: usize = 10;

/// Aggregates mapped findings into scored assessments.
pub struct AssessmentEngine {
    findings: Arc<dyn FindingStore>,
    store: Arc<dyn AssessmentStore>,
    mappings: MappingTable,
}

impl AssessmentEngine {
    /// Engine over the builtin mapping table.
    pub fn new(findings: Arc<dyn FindingStore>, store: Arc<dyn AssessmentStore>) -> Self {
        Self {
            findings,
            store,
            mappings: MappingTable::builtin(),
        }
    }

    pub fn with_mappings(mut self, mappings: MappingTable) -> Self {
        self.mappings = mappings;
        self
    }

    /// Run every control in the framework against the current open findings
    /// and append the completed assessment.
    ///
    /// The open-finding set is read in one store call, so the score is
    /// computed from a consistent snapshot: detection updates landing after
    /// the read belong to the next run. If the snapshot read fails the
    /// assessment is recorded with `status = failed` and no
    /// compliance_percent.
    pub fn run_assessment(&self, user: &str, framework: Framework) -> Result<Assessment> {
        let mut assessment = Assessment::start(user, framework);
        debug!(user, %framework, "starting assessment");

        let open = match self.findings.list_open(user) {
            Ok(open) => open,
            Err(err) => {
                warn!(user, %framework, error = %err, "assessment failed reading findings");
                assessment.status = AssessmentStatus::Failed;
                assessment.completed_at = Some(Utc::now());
                self.store.append(assessment.clone())?;
                return Ok(assessment);
            }
        };

        for control in controls_for(framework) {
            let result = self.evaluate_control(&control, &open);
            match result.status {
                ControlStatus::Passed => assessment.passed += 1,
                ControlStatus::Failed => assessment.failed += 1,
                ControlStatus::NotApplicable => assessment.not_applicable += 1,
            }
            assessment.control_results.push(result);
        }

        assessment.total_controls = assessment.control_results.len();
        assessment.compliance_percent =
            Some(compliance_percent(assessment.passed, assessment.failed));
        assessment.status = AssessmentStatus::Completed;
        assessment.completed_at = Some(Utc::now());

        self.store.append(assessment.clone())?;
        debug!(
            user,
            %framework,
            passed = assessment.passed,
            failed = assessment.failed,
            percent = ?assessment.compliance_percent,
            "assessment completed"
        );
        Ok(assessment)
    }

    fn evaluate_control(
        &self,
        control: &ComplianceControl,
        open: &[DriftFinding],
    ) -> ControlResult {
        let mappings = self.mappings.for_control(control.framework, &control.control_id);
        if mappings.is_empty() {
            return ControlResult {
                control_id: control.control_id.clone(),
                title: control.title.clone(),
                severity: control.severity,
                status: ControlStatus::NotApplicable,
                evidence_confidence: None,
                finding_ids: Vec::new(),
                advisory_finding_ids: Vec::new(),
            };
        }

        let mut finding_ids = Vec::new();
        let mut advisory_finding_ids = Vec::new();
        let mut evidence_confidence: Option<MappingConfidence> = None;
        for finding in open {
            for mapping in &mappings {
                if !mapping.matches(finding) {
                    continue;
                }
                if mapping.confidence.is_technical() {
                    if !finding_ids.contains(&finding.id) {
                        finding_ids.push(finding.id);
                    }
                    evidence_confidence = evidence_confidence.max(Some(mapping.confidence));
                } else if !advisory_finding_ids.contains(&finding.id) {
                    advisory_finding_ids.push(finding.id);
                }
            }
        }

        let status = if finding_ids.is_empty() {
            ControlStatus::Passed
        } else {
            ControlStatus::Failed
        };
        ControlResult {
            control_id: control.control_id.clone(),
            title: control.title.clone(),
            severity: control.severity,
            status,
            evidence_confidence: if status == ControlStatus::Failed {
                evidence_confidence
            } else {
                None
            },
            finding_ids,
            advisory_finding_ids,
        }
    }

    /// Compare the two most recent completed assessments for a framework.
    ///
    /// A zero previous score is reported as stable rather than dividing by
    /// zero. Change above +1% is improving, below -1% declining.
    pub fn trend(&self, user: &str, framework: Framework) -> Result<TrendReport> {
        let latest = self.store.latest_completed(user, framework, 2)?;
        let current_percent = latest.first().and_then(|a| a.compliance_percent);
        let previous_percent = latest.get(1).and_then(|a| a.compliance_percent);

        let (trend, percent_change) = match (current_percent, previous_percent) {
            (Some(current), Some(previous)) if previous != 0.0 => {
                let change = (current - previous) / previous * 100.0;
                let trend = if change > 1.0 {
                    Trend::Improving
                } else if change < -1.0 {
                    Trend::Declining
                } else {
                    Trend::Stable
                };
                (trend, Some(change))
            }
            _ => (Trend::Stable, None),
        };

        Ok(TrendReport {
            framework,
            trend,
            current_percent,
            previous_percent,
            percent_change,
        })
    }

    /// Cross-framework rollup over each framework's latest completed
    /// assessment: aggregate score, per-framework trend, and the worst
    /// failing controls ordered by control severity.
    pub fn compliance_overview(&self, user: &str) -> Result<ComplianceOverview> {
        let mut frameworks = Vec::new();
        let mut failing = Vec::new();
        let mut total_passed = 0;
        let mut total_failed = 0;

        for framework in Framework::ALL {
            let Some(assessment) = self
                .store
                .latest_completed(user, framework, 1)?
                .into_iter()
                .next()
            else {
                continue;
            };
            total_passed += assessment.passed;
            total_failed += assessment.failed;

            let trend = self.trend(user, framework)?;
            frameworks.push(FrameworkSummary {
                framework,
                compliance_percent: assessment.compliance_percent,
                passed: assessment.passed,
                failed: assessment.failed,
                not_applicable: assessment.not_applicable,
                trend: trend.trend,
            });

            for result in &assessment.control_results {
                if result.status == ControlStatus::Failed {
                    failing.push(FailingControl {
                        framework,
                        control_id: result.control_id.clone(),
                        title: result.title.clone(),
                        severity: result.severity,
                        finding_count: result.finding_ids.len(),
                    });
                }
            }
        }

        failing.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.finding_count.cmp(&a.finding_count))
                .then(a.control_id.cmp(&b.control_id))
        });
        failing.truncate(TOP_FAILING_LIMIT);

        let overall_percent = if frameworks.is_empty() {
            None
        } else {
            Some(compliance_percent(total_passed, total_failed))
        };

        Ok(ComplianceOverview {
            user: user.to_string(),
            overall_percent,
            frameworks,
            top_failing_controls: failing,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::FieldChange;
    use crate::error::DriftError;
    use crate::findings::{DriftFinding, DriftStatus};
    use crate::provider::CloudProvider;
    use crate::rules::types::DriftCategory;
    use crate::store::{FindingStore, MemoryStore, UpsertOutcome};
    use serde_json::json;

    fn make_finding(resource_id: &str, drift_type: DriftCategory) -> DriftFinding {
        let now = Utc::now();
        DriftFinding {
            id: Uuid::new_v4(),
            user: "user-1".to_string(),
            resource_id: resource_id.to_string(),
            provider: CloudProvider::Aws,
            resource_type: "storage_bucket".to_string(),
            drift_type,
            severity: Severity::High,
            title: "Test".to_string(),
            description: "test".to_string(),
            changes: vec![FieldChange::modified("x", json!(1), json!(2))],
            rule_ids: vec!["R-001".to_string()],
            status: DriftStatus::Detected,
            detected_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    fn engine_with(findings: Vec<DriftFinding>) -> (AssessmentEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        for finding in findings {
            store.upsert_open(finding).unwrap();
        }
        (AssessmentEngine::new(store.clone(), store.clone()), store)
    }

    #[test]
    fn test_compliance_percent_boundaries() {
        assert_eq!(compliance_percent(0, 0), 100.0);
        assert_eq!(compliance_percent(10, 0), 100.0);
        assert_eq!(compliance_percent(0, 10), 0.0);
        assert_eq!(compliance_percent(7, 3), 70.0);
        assert_eq!(compliance_percent(1, 2), 33.3);
        assert_eq!(compliance_percent(2, 1), 66.7);
    }

    #[test]
    fn test_compliance_percent_in_bounds() {
        for passed in 0..20 {
            for failed in 0..20 {
                let percent = compliance_percent(passed, failed);
                assert!((0.0..=100.0).contains(&percent), "{passed}/{failed}");
            }
        }
    }

    #[test]
    fn test_clean_user_is_fully_compliant() {
        let (engine, _) = engine_with(Vec::new());
        let assessment = engine.run_assessment("user-1", Framework::Cis).unwrap();

        assert_eq!(assessment.status, AssessmentStatus::Completed);
        assert_eq!(assessment.failed, 0);
        assert_eq!(assessment.not_applicable, 0);
        assert_eq!(assessment.compliance_percent, Some(100.0));
        assert!(assessment.completed_at.is_some());
    }

    #[test]
    fn test_open_finding_fails_mapped_controls() {
        let (engine, _) =
            engine_with(vec![make_finding("bucket-1", DriftCategory::Encryption)]);
        let assessment = engine.run_assessment("user-1", Framework::Cis).unwrap();

        // Encryption maps to CIS 2.2 (high) and 2.3 (medium).
        assert_eq!(assessment.failed, 2);
        assert_eq!(assessment.passed, 8);
        assert_eq!(assessment.compliance_percent, Some(80.0));

        let result = assessment
            .control_results
            .iter()
            .find(|r| r.control_id == "2.2")
            .unwrap();
        assert_eq!(result.status, ControlStatus::Failed);
        assert_eq!(result.evidence_confidence, Some(MappingConfidence::High));
        assert_eq!(result.finding_ids.len(), 1);
    }

    #[test]
    fn test_resolved_findings_do_not_fail_controls() {
        let store = Arc::new(MemoryStore::new());
        let finding = make_finding("bucket-1", DriftCategory::Encryption);
        let id = finding.id;
        store.upsert_open(finding).unwrap();
        let mut resolved = FindingStore::get(store.as_ref(), "user-1", id).unwrap().unwrap();
        resolved.status = DriftStatus::Resolved;
        resolved.resolved_at = Some(Utc::now());
        store.update(resolved).unwrap();

        let engine = AssessmentEngine::new(store.clone(), store.clone());
        let assessment = engine.run_assessment("user-1", Framework::Cis).unwrap();
        assert_eq!(assessment.failed, 0);
    }

    #[test]
    fn test_unmapped_control_is_not_applicable() {
        let (engine, _) = engine_with(Vec::new());
        let assessment = engine.run_assessment("user-1", Framework::NistCsf).unwrap();

        let result = assessment
            .control_results
            .iter()
            .find(|r| r.control_id == "ID.AM-1")
            .unwrap();
        assert_eq!(result.status, ControlStatus::NotApplicable);
        assert_eq!(assessment.not_applicable, 1);
    }

    #[test]
    fn test_low_confidence_evidence_is_advisory() {
        let (engine, _) = engine_with(vec![make_finding(
            "bucket-1",
            DriftCategory::ConfigurationChange,
        )]);
        let assessment = engine.run_assessment("user-1", Framework::NistCsf).unwrap();

        // PR.IP-1 is mapped to configuration_change at low confidence only:
        // the control must not fail, but the evidence stays visible.
        let result = assessment
            .control_results
            .iter()
            .find(|r| r.control_id == "PR.IP-1")
            .unwrap();
        assert_eq!(result.status, ControlStatus::Passed);
        assert!(result.finding_ids.is_empty());
        assert_eq!(result.advisory_finding_ids.len(), 1);
        assert_eq!(result.evidence_confidence, None);
    }

    #[test]
    fn test_scenario_ten_controls_three_failing() {
        // Encryption fails 2.2 and 2.3; network exposure fails 4.1; with a
        // mapping table trimmed to make exactly those three fail.
        let (engine, _) = engine_with(vec![
            make_finding("bucket-1", DriftCategory::Encryption),
            make_finding("sg-1", DriftCategory::NetworkExposure),
        ]);
        let table = MappingTable::with_mappings(
            MappingTable::builtin()
                .mappings()
                .iter()
                .filter(|m| !(m.framework == Framework::Cis && m.control_id == "4.2"))
                .cloned()
                .collect(),
        );
        let engine = engine.with_mappings(table);
        let assessment = engine.run_assessment("user-1", Framework::Cis).unwrap();

        assert_eq!(assessment.total_controls, 10);
        assert_eq!(assessment.failed, 3);
        // 4.2 lost its mapping, so it is not applicable rather than passed.
        assert_eq!(assessment.not_applicable, 1);
        assert_eq!(assessment.passed, 6);
        assert_eq!(assessment.compliance_percent, Some(66.7));
    }

    #[test]
    fn test_failed_run_publishes_no_percent() {
        struct FailingFindings;
        impl FindingStore for FailingFindings {
            fn upsert_open(&self, _: DriftFinding) -> crate::error::Result<UpsertOutcome> {
                Err(DriftError::store("upsert_open", "down"))
            }
            fn get(&self, _: &str, _: Uuid) -> crate::error::Result<Option<DriftFinding>> {
                Err(DriftError::store("get", "down"))
            }
            fn get_open(
                &self,
                _: &str,
                _: &str,
                _: DriftCategory,
            ) -> crate::error::Result<Option<DriftFinding>> {
                Err(DriftError::store("get_open", "down"))
            }
            fn update(&self, _: DriftFinding) -> crate::error::Result<()> {
                Err(DriftError::store("update", "down"))
            }
            fn list(&self, _: &str) -> crate::error::Result<Vec<DriftFinding>> {
                Err(DriftError::store("list", "down"))
            }
            fn list_open(&self, _: &str) -> crate::error::Result<Vec<DriftFinding>> {
                Err(DriftError::store("list_open", "down"))
            }
        }

        let assessments = Arc::new(MemoryStore::new());
        let engine = AssessmentEngine::new(Arc::new(FailingFindings), assessments.clone());
        let assessment = engine.run_assessment("user-1", Framework::Cis).unwrap();

        assert_eq!(assessment.status, AssessmentStatus::Failed);
        assert_eq!(assessment.compliance_percent, None);

        // The failed run is recorded but never counted as completed.
        assert!(assessments
            .latest_completed("user-1", Framework::Cis, 1)
            .unwrap()
            .is_empty());
        assert_eq!(
            AssessmentStore::list(assessments.as_ref(), "user-1", Framework::Cis)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_trend_with_fewer_than_two_runs() {
        let (engine, _) = engine_with(Vec::new());
        let report = engine.trend("user-1", Framework::Cis).unwrap();
        assert_eq!(report.trend, Trend::Stable);
        assert_eq!(report.percent_change, None);

        engine.run_assessment("user-1", Framework::Cis).unwrap();
        let report = engine.trend("user-1", Framework::Cis).unwrap();
        assert_eq!(report.trend, Trend::Stable);
        assert_eq!(report.current_percent, Some(100.0));
        assert_eq!(report.previous_percent, None);
    }

    #[test]
    fn test_trend_improving_and_declining() {
        let store = Arc::new(MemoryStore::new());
        let engine = AssessmentEngine::new(store.clone(), store.clone());

        let append = |percent: f64, offset_ms: i64| {
            let mut assessment = Assessment::start("user-1", Framework::Cis);
            assessment.status = AssessmentStatus::Completed;
            assessment.compliance_percent = Some(percent);
            assessment.started_at = Utc::now() + chrono::Duration::milliseconds(offset_ms);
            store.append(assessment).unwrap();
        };

        append(50.0, 0);
        append(80.0, 100);
        let report = engine.trend("user-1", Framework::Cis).unwrap();
        assert_eq!(report.trend, Trend::Improving);
        assert_eq!(report.percent_change, Some(60.0));

        append(40.0, 200);
        let report = engine.trend("user-1", Framework::Cis).unwrap();
        assert_eq!(report.trend, Trend::Declining);
    }

    #[test]
    fn test_trend_small_change_is_stable() {
        let store = Arc::new(MemoryStore::new());
        let engine = AssessmentEngine::new(store.clone(), store.clone());
        for (percent, offset) in [(80.0, 0), (80.5, 100)] {
            let mut assessment = Assessment::start("user-1", Framework::Cis);
            assessment.status = AssessmentStatus::Completed;
            assessment.compliance_percent = Some(percent);
            assessment.started_at = Utc::now() + chrono::Duration::milliseconds(offset);
            store.append(assessment).unwrap();
        }
        let report = engine.trend("user-1", Framework::Cis).unwrap();
        assert_eq!(report.trend, Trend::Stable);
    }

    #[test]
    fn test_trend_zero_previous_is_stable() {
        let store = Arc::new(MemoryStore::new());
        let engine = AssessmentEngine::new(store.clone(), store.clone());
        for (percent, offset) in [(0.0, 0), (90.0, 100)] {
            let mut assessment = Assessment::start("user-1", Framework::Cis);
            assessment.status = AssessmentStatus::Completed;
            assessment.compliance_percent = Some(percent);
            assessment.started_at = Utc::now() + chrono::Duration::milliseconds(offset);
            store.append(assessment).unwrap();
        }
        let report = engine.trend("user-1", Framework::Cis).unwrap();
        assert_eq!(report.trend, Trend::Stable);
        assert_eq!(report.percent_change, None);
    }

    #[test]
    fn test_overview_rollup_and_top_failing() {
        let (engine, _) = engine_with(vec![
            make_finding("bucket-1", DriftCategory::Encryption),
            make_finding("sg-1", DriftCategory::NetworkExposure),
        ]);
        engine.run_assessment("user-1", Framework::Cis).unwrap();
        engine.run_assessment("user-1", Framework::Soc2).unwrap();

        let overview = engine.compliance_overview("user-1").unwrap();
        assert_eq!(overview.frameworks.len(), 2);
        assert!(overview.overall_percent.is_some());
        assert!(!overview.top_failing_controls.is_empty());

        // Sorted by control severity, worst first.
        let severities: Vec<Severity> = overview
            .top_failing_controls
            .iter()
            .map(|c| c.severity)
            .collect();
        let mut sorted = severities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(severities, sorted);
    }

    #[test]
    fn test_overview_without_assessments() {
        let (engine, _) = engine_with(Vec::new());
        let overview = engine.compliance_overview("user-1").unwrap();
        assert!(overview.frameworks.is_empty());
        assert_eq!(overview.overall_percent, None);
        assert!(overview.top_failing_controls.is_empty());
    }
}
