//! Security rule evaluation.
//!
//! Evaluation is pure and deterministic: identical (configuration/diff,
//! ruleset) inputs always yield the identical match list, in rule
//! declaration order.

use crate::diff::{ChangeType, FieldChange};
use crate::paths;
use crate::provider::CloudProvider;
use crate::rules::builtin;
use crate::rules::types::{RuleMatch, RuleScope, SecurityRule, Severity};
use serde_json::Value;
use tracing::{trace, warn};

pub struct RuleEvaluator {
    rules: Vec<SecurityRule>,
}

impl RuleEvaluator {
    /// Evaluator over the builtin ruleset.
    pub fn new() -> Self {
        Self {
            rules: builtin::all_rules(),
        }
    }

    /// Evaluator over an explicit ruleset (replaces the builtins).
    pub fn with_rules(rules: Vec<SecurityRule>) -> Self {
        Self { rules }
    }

    /// Append rules (e.g. loaded from a custom rules file) after the
    /// builtins. Declaration order is preserved for tie-breaking.
    pub fn add_rules(&mut self, rules: Vec<SecurityRule>) {
        self.rules.extend(rules);
    }

    pub fn rules(&self) -> &[SecurityRule] {
        &self.rules
    }

    /// Evaluate every applicable rule against one resource.
    ///
    /// Diff-scope rules run against `changes`; posture-scope rules run
    /// against `configuration`. A malformed rule is skipped with a warning
    /// and never aborts evaluation of the others.
    pub fn evaluate(
        &self,
        resource_type: &str,
        provider: CloudProvider,
        changes: &[FieldChange],
        configuration: &Value,
    ) -> Vec<RuleMatch> {
        trace!(
            resource_type,
            provider = %provider,
            changes = changes.len(),
            rules = self.rules.len(),
            "evaluating rules"
        );

        let mut matches = Vec::new();
        for rule in &self.rules {
            if !rule.applies_to(resource_type, provider) {
                continue;
            }
            if let Err(message) = paths::validate(&rule.field_path) {
                warn!(rule_id = %rule.id, %message, "skipping malformed rule");
                continue;
            }
            match rule.scope {
                RuleScope::Diff => Self::check_diff_rule(rule, changes, &mut matches),
                RuleScope::Posture => Self::check_posture_rule(rule, configuration, &mut matches),
            }
        }
        matches
    }

    fn check_diff_rule(rule: &SecurityRule, changes: &[FieldChange], out: &mut Vec<RuleMatch>) {
        for change in changes {
            if !paths::matches(&rule.field_path, &change.field_path) {
                continue;
            }
            // The predicate sees the post-change value; a removed field
            // evaluates as absent.
            if rule.predicate.evaluate(change.new_value.as_ref()) {
                out.push(rule_match(rule, change.clone()));
            }
        }
    }

    fn check_posture_rule(rule: &SecurityRule, configuration: &Value, out: &mut Vec<RuleMatch>) {
        let found = paths::lookup_all(configuration, &rule.field_path);
        if found.is_empty() {
            // Absence can only be asserted for a concrete path; a wildcard
            // pattern with no expansion has nothing to assert over.
            if !rule.field_path.contains(paths::WILDCARD) && rule.predicate.evaluate(None) {
                out.push(rule_match(
                    rule,
                    FieldChange {
                        field_path: rule.field_path.clone(),
                        old_value: rule.predicate.expected_value(),
                        new_value: None,
                        change_type: ChangeType::Removed,
                    },
                ));
            }
            return;
        }
        for (path, value) in found {
            if rule.predicate.evaluate(Some(value)) {
                out.push(rule_match(
                    rule,
                    FieldChange {
                        field_path: path,
                        old_value: None,
                        new_value: Some(value.clone()),
                        change_type: ChangeType::Modified,
                    },
                ));
            }
        }
    }
}

impl Default for RuleEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn rule_match(rule: &SecurityRule, evidence: FieldChange) -> RuleMatch {
    RuleMatch {
        rule_id: rule.id.clone(),
        title: rule.title.clone(),
        severity: rule.severity,
        category: rule.category,
        scope: rule.scope,
        remediation: rule.remediation.clone(),
        evidence,
    }
}

/// Maximum severity across a match set.
pub fn max_severity(matches: &[RuleMatch]) -> Option<Severity> {
    matches.iter().map(|m| m.severity).max()
}

/// The primary match: the earliest-declared rule among those tied at the
/// maximum severity. Presentation metadata only.
pub fn primary_match(matches: &[RuleMatch]) -> Option<&RuleMatch> {
    let max = max_severity(matches)?;
    matches.iter().find(|m| m.severity == max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff_configs;
    use crate::rules::types::{DriftCategory, Predicate};
    use serde_json::json;

    fn make_rule(id: &str, severity: Severity, scope: RuleScope, path: &str) -> SecurityRule {
        SecurityRule {
            id: id.to_string(),
            title: format!("Rule {id}"),
            description: String::new(),
            severity,
            category: DriftCategory::Encryption,
            scope,
            resource_types: Vec::new(),
            providers: Vec::new(),
            field_path: path.to_string(),
            predicate: Predicate::Equals(json!(false)),
            remediation: String::new(),
        }
    }

    #[test]
    fn test_diff_rule_fires_on_flipped_flag() {
        let evaluator = RuleEvaluator::new();
        let baseline = json!({"encryption": {"enabled": true}});
        let actual = json!({"encryption": {"enabled": false}});
        let report = diff_configs(&baseline, &actual);

        let matches = evaluator.evaluate(
            "storage_bucket",
            CloudProvider::Aws,
            &report.changes,
            &actual,
        );

        assert!(matches.iter().any(|m| m.rule_id == "ENC-001"));
        assert_eq!(max_severity(&matches), Some(Severity::Critical));
    }

    #[test]
    fn test_posture_rule_fires_without_drift() {
        let evaluator = RuleEvaluator::new();
        let config = json!({"public_access": true, "logging": {"enabled": true}});

        let matches = evaluator.evaluate("storage_bucket", CloudProvider::Gcp, &[], &config);

        let acc: Vec<_> = matches.iter().filter(|m| m.rule_id == "ACC-001").collect();
        assert_eq!(acc.len(), 1);
        assert_eq!(acc[0].evidence.field_path, "public_access");
        assert_eq!(acc[0].evidence.new_value, Some(json!(true)));
    }

    #[test]
    fn test_wildcard_ingress_rule() {
        let evaluator = RuleEvaluator::new();
        let baseline = json!({"ingress": [{"port": 22, "cidr": "10.0.0.0/8"}], "logging": {}});
        let actual = json!({"ingress": [{"port": 22, "cidr": "0.0.0.0/0"}], "logging": {}});
        let report = diff_configs(&baseline, &actual);

        let matches = evaluator.evaluate(
            "security_group",
            CloudProvider::Aws,
            &report.changes,
            &actual,
        );

        // Diff rule NET-001 and posture rule NET-002 both fire.
        assert!(matches.iter().any(|m| m.rule_id == "NET-001"));
        assert!(matches.iter().any(|m| m.rule_id == "NET-002"));
        assert_eq!(max_severity(&matches), Some(Severity::Critical));
        let net1 = matches.iter().find(|m| m.rule_id == "NET-001").unwrap();
        assert_eq!(net1.evidence.field_path, "ingress.0.cidr");
    }

    #[test]
    fn test_absent_predicate_on_removed_field() {
        let evaluator = RuleEvaluator::new();
        let baseline = json!({"encryption": {"enabled": true, "kms_key_id": "key-1"}});
        let actual = json!({"encryption": {"enabled": true}});
        let report = diff_configs(&baseline, &actual);

        let matches = evaluator.evaluate("database", CloudProvider::Aws, &report.changes, &actual);
        assert!(matches.iter().any(|m| m.rule_id == "ENC-002"));
    }

    #[test]
    fn test_posture_absence_concrete_path() {
        let evaluator = RuleEvaluator::new();
        let config = json!({"encryption": {"enabled": true}});

        let matches = evaluator.evaluate("database", CloudProvider::Azure, &[], &config);
        let log: Vec<_> = matches.iter().filter(|m| m.rule_id == "LOG-002").collect();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].evidence.change_type, ChangeType::Removed);
    }

    #[test]
    fn test_rule_scoping_filters_matches() {
        let evaluator = RuleEvaluator::new();
        // MFA delete off, but on GCP where ACC-002 does not apply.
        let config = json!({"versioning": {"mfa_delete": false}, "logging": {}});
        let matches = evaluator.evaluate("storage_bucket", CloudProvider::Gcp, &[], &config);
        assert!(!matches.iter().any(|m| m.rule_id == "ACC-002"));

        let matches = evaluator.evaluate("storage_bucket", CloudProvider::Aws, &[], &config);
        assert!(matches.iter().any(|m| m.rule_id == "ACC-002"));
    }

    #[test]
    fn test_malformed_rule_is_isolated() {
        let mut rules = vec![make_rule("BAD-001", Severity::Critical, RuleScope::Posture, "")];
        rules.push(make_rule(
            "GOOD-001",
            Severity::High,
            RuleScope::Posture,
            "encryption.enabled",
        ));
        let evaluator = RuleEvaluator::with_rules(rules);
        let config = json!({"encryption": {"enabled": false}});

        let matches = evaluator.evaluate("database", CloudProvider::Aws, &[], &config);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_id, "GOOD-001");
    }

    #[test]
    fn test_severity_monotonic_in_ruleset() {
        let base_rules = vec![make_rule(
            "R-001",
            Severity::Medium,
            RuleScope::Posture,
            "encryption.enabled",
        )];
        let config = json!({"encryption": {"enabled": false}});

        let small = RuleEvaluator::with_rules(base_rules.clone());
        let small_sev = max_severity(&small.evaluate("db", CloudProvider::Aws, &[], &config));

        let mut bigger_rules = base_rules;
        bigger_rules.push(make_rule(
            "R-002",
            Severity::Critical,
            RuleScope::Posture,
            "encryption.enabled",
        ));
        let bigger = RuleEvaluator::with_rules(bigger_rules);
        let bigger_sev = max_severity(&bigger.evaluate("db", CloudProvider::Aws, &[], &config));

        assert!(bigger_sev >= small_sev);
    }

    #[test]
    fn test_primary_match_is_first_declared_at_max() {
        let rules = vec![
            make_rule("R-001", Severity::High, RuleScope::Posture, "encryption.enabled"),
            make_rule("R-002", Severity::High, RuleScope::Posture, "encryption.enabled"),
            make_rule("R-003", Severity::Low, RuleScope::Posture, "encryption.enabled"),
        ];
        let evaluator = RuleEvaluator::with_rules(rules);
        let config = json!({"encryption": {"enabled": false}});

        let matches = evaluator.evaluate("db", CloudProvider::Aws, &[], &config);
        assert_eq!(matches.len(), 3);
        let primary = primary_match(&matches).unwrap();
        assert_eq!(primary.rule_id, "R-001");
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let evaluator = RuleEvaluator::new();
        let baseline = json!({"encryption": {"enabled": true}, "logging": {"enabled": true}});
        let actual = json!({"encryption": {"enabled": false}, "logging": {"enabled": false}});
        let report = diff_configs(&baseline, &actual);

        let first: Vec<String> = evaluator
            .evaluate("db", CloudProvider::Aws, &report.changes, &actual)
            .iter()
            .map(|m| format!("{}:{}", m.rule_id, m.evidence.field_path))
            .collect();
        for _ in 0..5 {
            let next: Vec<String> = evaluator
                .evaluate("db", CloudProvider::Aws, &report.changes, &actual)
                .iter()
                .map(|m| format!("{}:{}", m.rule_id, m.evidence.field_path))
                .collect();
            assert_eq!(first, next);
        }
    }

    #[test]
    fn test_no_matches_on_clean_config() {
        let evaluator = RuleEvaluator::new();
        let config = json!({
            "encryption": {"enabled": true, "kms_key_id": "key-1"},
            "logging": {"enabled": true},
            "public_access": false,
            "deletion_protection": true,
        });
        let matches = evaluator.evaluate("database", CloudProvider::Aws, &[], &config);
        assert!(matches.is_empty());
    }
}
