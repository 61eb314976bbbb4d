//! Builtin security ruleset.
//!
//! Immutable reference data. Rules are declared in a fixed order; the
//! evaluator uses declaration order to break ties when several rules match
//! at the same severity.

use crate::provider::CloudProvider;
use crate::rules::types::{DriftCategory, Predicate, RuleScope, SecurityRule, Severity};
use serde_json::json;

/// All builtin rules, in declaration order.
pub fn all_rules() -> Vec<SecurityRule> {
    vec![
        enc_001(),
        enc_002(),
        net_001(),
        net_002(),
        net_003(),
        acc_001(),
        acc_002(),
        acc_003(),
        log_001(),
        log_002(),
        dat_001(),
        dat_002(),
    ]
}

fn rule(
    id: &str,
    title: &str,
    description: &str,
    severity: Severity,
    category: DriftCategory,
    scope: RuleScope,
    field_path: &str,
    predicate: Predicate,
    remediation: &str,
) -> SecurityRule {
    SecurityRule {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        severity,
        category,
        scope,
        resource_types: Vec::new(),
        providers: Vec::new(),
        field_path: field_path.to_string(),
        predicate,
        remediation: remediation.to_string(),
    }
}

fn enc_001() -> SecurityRule {
    rule(
        "ENC-001",
        "Encryption disabled",
        "Encryption at rest was turned off relative to the baseline",
        Severity::Critical,
        DriftCategory::Encryption,
        RuleScope::Diff,
        "encryption.enabled",
        Predicate::Equals(json!(false)),
        "Re-enable encryption at rest and investigate who changed it",
    )
}

fn enc_002() -> SecurityRule {
    rule(
        "ENC-002",
        "Customer-managed key removed",
        "The KMS key reference disappeared from the encryption block",
        Severity::High,
        DriftCategory::Encryption,
        RuleScope::Diff,
        "encryption.kms_key_id",
        Predicate::Absent,
        "Restore the customer-managed key; default service keys weaken key custody",
    )
}

fn net_001() -> SecurityRule {
    rule(
        "NET-001",
        "Ingress opened to the internet",
        "An ingress rule was widened to 0.0.0.0/0 relative to the baseline",
        Severity::Critical,
        DriftCategory::NetworkExposure,
        RuleScope::Diff,
        "ingress.*.cidr",
        Predicate::Equals(json!("0.0.0.0/0")),
        "Restrict the ingress CIDR to known networks",
    )
}

fn net_002() -> SecurityRule {
    rule(
        "NET-002",
        "Security group allows 0.0.0.0/0",
        "An ingress rule currently accepts traffic from any address",
        Severity::High,
        DriftCategory::NetworkExposure,
        RuleScope::Posture,
        "ingress.*.cidr",
        Predicate::Equals(json!("0.0.0.0/0")),
        "Restrict the ingress CIDR to known networks",
    )
}

fn net_003() -> SecurityRule {
    let mut r = rule(
        "NET-003",
        "Public IP assigned",
        "The instance currently has a public IP address attached",
        Severity::Medium,
        DriftCategory::NetworkExposure,
        RuleScope::Posture,
        "network.public_ip",
        Predicate::Equals(json!(true)),
        "Detach the public IP and route through a load balancer or NAT",
    );
    r.resource_types = vec!["compute_instance".to_string()];
    r
}

fn acc_001() -> SecurityRule {
    rule(
        "ACC-001",
        "Public access enabled",
        "The resource is currently reachable without authentication",
        Severity::Critical,
        DriftCategory::AccessControl,
        RuleScope::Posture,
        "public_access",
        Predicate::Equals(json!(true)),
        "Disable public access and grant access through IAM policies",
    )
}

fn acc_002() -> SecurityRule {
    let mut r = rule(
        "ACC-002",
        "MFA delete disabled",
        "Bucket versioning does not require MFA for deletions",
        Severity::Medium,
        DriftCategory::AccessControl,
        RuleScope::Posture,
        "versioning.mfa_delete",
        Predicate::Equals(json!(false)),
        "Enable MFA delete on the bucket's versioning configuration",
    );
    r.resource_types = vec!["storage_bucket".to_string()];
    r.providers = vec![CloudProvider::Aws];
    r
}

fn acc_003() -> SecurityRule {
    rule(
        "ACC-003",
        "Wildcard principal in policy",
        "An attached policy currently grants access to any principal",
        Severity::High,
        DriftCategory::AccessControl,
        RuleScope::Posture,
        "policy.principal",
        Predicate::Equals(json!("*")),
        "Name explicit principals in the resource policy",
    )
}

fn log_001() -> SecurityRule {
    rule(
        "LOG-001",
        "Access logging disabled",
        "Access logging was turned off relative to the baseline",
        Severity::Medium,
        DriftCategory::Logging,
        RuleScope::Diff,
        "logging.enabled",
        Predicate::Equals(json!(false)),
        "Re-enable access logging; gaps in the log trail break auditability",
    )
}

fn log_002() -> SecurityRule {
    rule(
        "LOG-002",
        "No logging configuration",
        "The resource has no logging block at all",
        Severity::Low,
        DriftCategory::Logging,
        RuleScope::Posture,
        "logging",
        Predicate::Absent,
        "Add a logging configuration with a destination and retention",
    )
}

fn dat_001() -> SecurityRule {
    let mut r = rule(
        "DAT-001",
        "Versioning disabled",
        "Object versioning was turned off relative to the baseline",
        Severity::Medium,
        DriftCategory::DataProtection,
        RuleScope::Diff,
        "versioning.enabled",
        Predicate::Equals(json!(false)),
        "Re-enable versioning to protect against destructive overwrites",
    );
    r.resource_types = vec!["storage_bucket".to_string()];
    r
}

fn dat_002() -> SecurityRule {
    rule(
        "DAT-002",
        "Deletion protection disabled",
        "Deletion protection is currently off",
        Severity::Low,
        DriftCategory::DataProtection,
        RuleScope::Posture,
        "deletion_protection",
        Predicate::Equals(json!(false)),
        "Enable deletion protection on stateful resources",
    )
}
