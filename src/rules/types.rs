use crate::diff::FieldChange;
use crate::provider::CloudProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordinal severity assigned during rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Category of divergence a rule detects. Doubles as the drift type of the
/// finding it produces, which is the deduplication key dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftCategory {
    Encryption,
    NetworkExposure,
    AccessControl,
    Logging,
    DataProtection,
    /// Catch-all for configuration changes no security rule matched.
    ConfigurationChange,
}

impl DriftCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftCategory::Encryption => "encryption",
            DriftCategory::NetworkExposure => "network_exposure",
            DriftCategory::AccessControl => "access_control",
            DriftCategory::Logging => "logging",
            DriftCategory::DataProtection => "data_protection",
            DriftCategory::ConfigurationChange => "configuration_change",
        }
    }
}

impl std::fmt::Display for DriftCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a rule's condition is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    /// The rule matches field changes produced by the differencer
    /// (e.g. "encryption flag flipped off").
    Diff,
    /// The rule matches the raw current configuration regardless of drift
    /// (e.g. "public access currently enabled").
    Posture,
}

/// Condition predicate applied to the value at a rule's field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "value")]
pub enum Predicate {
    Equals(Value),
    NotEquals(Value),
    Contains(String),
    Absent,
    Present,
}

impl Predicate {
    /// Evaluate against the value found at the rule's field path, `None`
    /// meaning the path is absent. A present `null` counts as present.
    pub fn evaluate(&self, value: Option<&Value>) -> bool {
        match self {
            Predicate::Equals(expected) => value == Some(expected),
            // An absent value does not satisfy not_equals; the predicate
            // targets a present value that differs.
            Predicate::NotEquals(expected) => value.is_some_and(|v| v != expected),
            Predicate::Contains(needle) => match value {
                Some(Value::String(s)) => s.contains(needle.as_str()),
                Some(Value::Array(items)) => {
                    items.iter().any(|item| item.as_str() == Some(needle.as_str()))
                }
                _ => false,
            },
            Predicate::Absent => value.is_none(),
            Predicate::Present => value.is_some(),
        }
    }

    /// The value this predicate expects, if it names one. Used to record
    /// expected-vs-observed evidence on posture findings.
    pub fn expected_value(&self) -> Option<Value> {
        match self {
            Predicate::Equals(v) => Some(v.clone()),
            Predicate::Contains(s) => Some(Value::String(s.clone())),
            _ => None,
        }
    }
}

/// A declarative security rule. Read-only reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRule {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub category: DriftCategory,
    pub scope: RuleScope,
    /// Resource types this rule applies to. Empty = any.
    #[serde(default)]
    pub resource_types: Vec<String>,
    /// Providers this rule applies to. Empty = any.
    #[serde(default)]
    pub providers: Vec<CloudProvider>,
    pub field_path: String,
    pub predicate: Predicate,
    pub remediation: String,
}

impl SecurityRule {
    /// Whether this rule applies to the given resource dimensions.
    /// An empty dimension is a wildcard.
    pub fn applies_to(&self, resource_type: &str, provider: CloudProvider) -> bool {
        let type_ok = self.resource_types.is_empty()
            || self.resource_types.iter().any(|t| t == resource_type);
        let provider_ok = self.providers.is_empty() || self.providers.contains(&provider);
        type_ok && provider_ok
    }
}

/// A rule that matched during evaluation, with the evidence that triggered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule_id: String,
    pub title: String,
    pub severity: Severity,
    pub category: DriftCategory,
    pub scope: RuleScope,
    pub remediation: String,
    /// For diff-scope rules, the change that triggered the match. For
    /// posture-scope rules, a synthesized expected-vs-observed record.
    pub evidence: FieldChange,
}
