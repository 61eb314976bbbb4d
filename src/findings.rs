//! Drift finding records and their lifecycle state machine.

use crate::diff::FieldChange;
use crate::provider::CloudProvider;
use crate::rules::types::{DriftCategory, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a drift finding.
///
/// `detected → acknowledged → resolved`; `detected|acknowledged → ignored`;
/// acknowledgement is optional, `detected → resolved` is allowed directly.
/// Resolved and ignored are terminal for the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftStatus {
    Detected,
    Acknowledged,
    Resolved,
    Ignored,
}

impl DriftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftStatus::Detected => "detected",
            DriftStatus::Acknowledged => "acknowledged",
            DriftStatus::Resolved => "resolved",
            DriftStatus::Ignored => "ignored",
        }
    }

    /// Open findings participate in deduplication and compliance assessment.
    pub fn is_open(&self) -> bool {
        matches!(self, DriftStatus::Detected | DriftStatus::Acknowledged)
    }

    /// Whether the state machine permits this transition.
    pub fn can_transition_to(&self, next: DriftStatus) -> bool {
        matches!(
            (self, next),
            (DriftStatus::Detected, DriftStatus::Acknowledged)
                | (DriftStatus::Detected, DriftStatus::Resolved)
                | (DriftStatus::Detected, DriftStatus::Ignored)
                | (DriftStatus::Acknowledged, DriftStatus::Resolved)
                | (DriftStatus::Acknowledged, DriftStatus::Ignored)
        )
    }
}

impl std::fmt::Display for DriftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detected divergence between a resource and its baseline.
///
/// The full change list is retained for audit and export, not just the
/// human-readable summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftFinding {
    pub id: Uuid,
    pub user: String,
    pub resource_id: String,
    pub provider: CloudProvider,
    pub resource_type: String,
    pub drift_type: DriftCategory,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub changes: Vec<FieldChange>,
    /// Ids of every rule that matched, declaration order, primary first.
    pub rule_ids: Vec<String>,
    pub status: DriftStatus,
    pub detected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DriftFinding {
    /// Natural key for open-finding deduplication.
    pub fn natural_key(&self) -> (String, String, DriftCategory) {
        (
            self.user.clone(),
            self.resource_id.clone(),
            self.drift_type,
        )
    }
}

/// Counts of findings by status and severity for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftSummary {
    pub total: usize,
    pub open: usize,
    pub detected: usize,
    pub acknowledged: usize,
    pub resolved: usize,
    pub ignored: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl DriftSummary {
    pub fn from_findings(findings: &[DriftFinding]) -> Self {
        let mut summary = Self {
            total: findings.len(),
            ..Self::default()
        };
        for finding in findings {
            match finding.status {
                DriftStatus::Detected => summary.detected += 1,
                DriftStatus::Acknowledged => summary.acknowledged += 1,
                DriftStatus::Resolved => summary.resolved += 1,
                DriftStatus::Ignored => summary.ignored += 1,
            }
            if finding.status.is_open() {
                summary.open += 1;
            }
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info => summary.info += 1,
            }
        }
        summary
    }
}
