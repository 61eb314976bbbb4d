//! Custom rule loading from YAML definitions.
//!
//! Loaded rules share the [`SecurityRule`] type with the builtins; a rule
//! that fails validation is reported individually and never poisons the
//! rest of the file.

use crate::error::{DriftError, Result};
use crate::paths;
use crate::provider::CloudProvider;
use crate::rules::types::{DriftCategory, Predicate, RuleScope, SecurityRule, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// YAML schema for a custom rules file.
#[derive(Debug, Serialize, Deserialize)]
pub struct RuleSetConfig {
    pub version: String,
    pub rules: Vec<YamlRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YamlRule {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: String,
    pub category: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub resource_types: Vec<String>,
    #[serde(default)]
    pub providers: Vec<String>,
    pub field_path: String,
    pub op: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub remediation: String,
}

fn default_scope() -> String {
    "diff".to_string()
}

/// Loads custom rules from YAML.
pub struct RuleLoader;

impl RuleLoader {
    /// Load rules from a YAML file path.
    pub fn load_from_file(path: &Path) -> Result<Vec<SecurityRule>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DriftError::validation("ruleset", format!("cannot read {}: {e}", path.display()))
        })?;
        Self::load_from_str(&content)
    }

    /// Load rules from a YAML string.
    pub fn load_from_str(content: &str) -> Result<Vec<SecurityRule>> {
        let config: RuleSetConfig = serde_yaml::from_str(content)?;
        config.rules.into_iter().map(Self::convert).collect()
    }

    /// Convert one YAML rule, validating every enum field.
    pub fn convert(yaml: YamlRule) -> Result<SecurityRule> {
        let severity = parse_severity(&yaml.id, &yaml.severity)?;
        let category = parse_category(&yaml.id, &yaml.category)?;
        let scope = parse_scope(&yaml.id, &yaml.scope)?;
        let providers = yaml
            .providers
            .iter()
            .map(|p| parse_provider(&yaml.id, p))
            .collect::<Result<Vec<_>>>()?;
        let predicate = parse_predicate(&yaml.id, &yaml.op, yaml.value)?;

        paths::validate(&yaml.field_path)
            .map_err(|message| DriftError::rule(yaml.id.as_str(), message))?;

        Ok(SecurityRule {
            id: yaml.id,
            title: yaml.title,
            description: yaml.description,
            severity,
            category,
            scope,
            resource_types: yaml.resource_types,
            providers,
            field_path: yaml.field_path,
            predicate,
            remediation: yaml.remediation,
        })
    }
}

fn parse_severity(rule_id: &str, value: &str) -> Result<Severity> {
    match value {
        "critical" => Ok(Severity::Critical),
        "high" => Ok(Severity::High),
        "medium" => Ok(Severity::Medium),
        "low" => Ok(Severity::Low),
        "info" => Ok(Severity::Info),
        other => Err(DriftError::rule(
            rule_id,
            format!("invalid severity '{other}', expected critical, high, medium, low or info"),
        )),
    }
}

fn parse_category(rule_id: &str, value: &str) -> Result<DriftCategory> {
    match value {
        "encryption" => Ok(DriftCategory::Encryption),
        "network_exposure" => Ok(DriftCategory::NetworkExposure),
        "access_control" => Ok(DriftCategory::AccessControl),
        "logging" => Ok(DriftCategory::Logging),
        "data_protection" => Ok(DriftCategory::DataProtection),
        "configuration_change" => Ok(DriftCategory::ConfigurationChange),
        other => Err(DriftError::rule(
            rule_id,
            format!("invalid category '{other}'"),
        )),
    }
}

fn parse_scope(rule_id: &str, value: &str) -> Result<RuleScope> {
    match value {
        "diff" => Ok(RuleScope::Diff),
        "posture" => Ok(RuleScope::Posture),
        other => Err(DriftError::rule(
            rule_id,
            format!("invalid scope '{other}', expected diff or posture"),
        )),
    }
}

fn parse_provider(rule_id: &str, value: &str) -> Result<CloudProvider> {
    match value {
        "aws" => Ok(CloudProvider::Aws),
        "azure" => Ok(CloudProvider::Azure),
        "gcp" => Ok(CloudProvider::Gcp),
        other => Err(DriftError::rule(
            rule_id,
            format!("invalid provider '{other}', expected aws, azure or gcp"),
        )),
    }
}

fn parse_predicate(rule_id: &str, op: &str, value: Option<Value>) -> Result<Predicate> {
    match op {
        "equals" => value.map(Predicate::Equals).ok_or_else(|| {
            DriftError::rule(rule_id, "op 'equals' requires a value")
        }),
        "not_equals" => value.map(Predicate::NotEquals).ok_or_else(|| {
            DriftError::rule(rule_id, "op 'not_equals' requires a value")
        }),
        "contains" => match value {
            Some(Value::String(s)) => Ok(Predicate::Contains(s)),
            _ => Err(DriftError::rule(
                rule_id,
                "op 'contains' requires a string value",
            )),
        },
        "absent" => Ok(Predicate::Absent),
        "present" => Ok(Predicate::Present),
        other => Err(DriftError::rule(
            rule_id,
            format!("invalid op '{other}', expected equals, not_equals, contains, absent or present"),
        )),
    }
}
