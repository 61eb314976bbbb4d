//! Compliance framework reference data.
//!
//! Control tables are immutable loaded datasets, never mutable globals, so
//! assessment stays side-effect-free and testable in isolation.

use crate::rules::types::Severity;
use serde::{Deserialize, Serialize};

/// Supported compliance frameworks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    Cis,
    NistCsf,
    Soc2,
}

impl Framework {
    pub const ALL: [Framework; 3] = [Framework::Cis, Framework::NistCsf, Framework::Soc2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Cis => "cis",
            Framework::NistCsf => "nist_csf",
            Framework::Soc2 => "soc2",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Framework::Cis => "CIS Benchmarks",
            Framework::NistCsf => "NIST Cybersecurity Framework",
            Framework::Soc2 => "SOC 2",
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named, checkable requirement within a framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceControl {
    pub framework: Framework,
    pub control_id: String,
    pub title: String,
    pub category: String,
    pub severity: Severity,
    pub remediation: String,
}

fn control(
    framework: Framework,
    control_id: &str,
    title: &str,
    category: &str,
    severity: Severity,
    remediation: &str,
) -> ComplianceControl {
    ComplianceControl {
        framework,
        control_id: control_id.to_string(),
        title: title.to_string(),
        category: category.to_string(),
        severity,
        remediation: remediation.to_string(),
    }
}

/// The control table for a framework, in control-id order.
pub fn controls_for(framework: Framework) -> Vec<ComplianceControl> {
    match framework {
        Framework::Cis => cis_controls(),
        Framework::NistCsf => nist_csf_controls(),
        Framework::Soc2 => soc2_controls(),
    }
}

fn cis_controls() -> Vec<ComplianceControl> {
    let fw = Framework::Cis;
    vec![
        control(
            fw,
            "1.1",
            "Ensure MFA delete is enabled on storage buckets",
            "Identity and Access Management",
            Severity::Medium,
            "Enable MFA delete on bucket versioning configuration",
        ),
        control(
            fw,
            "1.5",
            "Ensure resource policies do not grant wildcard principals",
            "Identity and Access Management",
            Severity::High,
            "Replace '*' principals with explicit identities",
        ),
        control(
            fw,
            "2.1",
            "Ensure storage buckets block public access",
            "Storage",
            Severity::Critical,
            "Enable the public access block on every bucket",
        ),
        control(
            fw,
            "2.2",
            "Ensure encryption at rest is enabled",
            "Storage",
            Severity::Critical,
            "Enable server-side encryption with a managed key",
        ),
        control(
            fw,
            "2.3",
            "Ensure customer-managed keys are used for encryption",
            "Storage",
            Severity::High,
            "Attach a customer-managed KMS key to the resource",
        ),
        control(
            fw,
            "3.1",
            "Ensure audit logging is enabled",
            "Logging",
            Severity::High,
            "Enable audit logging with a durable destination",
        ),
        control(
            fw,
            "3.3",
            "Ensure access logging is enabled on storage buckets",
            "Logging",
            Severity::Medium,
            "Enable server access logging on the bucket",
        ),
        control(
            fw,
            "4.1",
            "Ensure no security group allows ingress from 0.0.0.0/0",
            "Networking",
            Severity::Critical,
            "Restrict ingress rules to known CIDR ranges",
        ),
        control(
            fw,
            "4.2",
            "Ensure compute instances are not assigned public IPs",
            "Networking",
            Severity::Medium,
            "Remove public IPs and front instances with a load balancer",
        ),
        control(
            fw,
            "5.1",
            "Ensure data stores have versioning or deletion protection",
            "Data Protection",
            Severity::Medium,
            "Enable versioning and deletion protection on data stores",
        ),
    ]
}

fn nist_csf_controls() -> Vec<ComplianceControl> {
    let fw = Framework::NistCsf;
    vec![
        control(
            fw,
            "ID.AM-1",
            "Physical devices and systems are inventoried",
            "Identify",
            Severity::Low,
            "Maintain an asset inventory covering all environments",
        ),
        control(
            fw,
            "PR.AC-1",
            "Identities and credentials are managed for authorized users",
            "Protect",
            Severity::High,
            "Enforce least-privilege identity policies",
        ),
        control(
            fw,
            "PR.AC-5",
            "Network integrity is protected",
            "Protect",
            Severity::High,
            "Segment networks and restrict perimeter ingress",
        ),
        control(
            fw,
            "PR.DS-1",
            "Data-at-rest is protected",
            "Protect",
            Severity::Critical,
            "Encrypt data at rest across all storage services",
        ),
        control(
            fw,
            "PR.IP-1",
            "A baseline configuration is created and maintained",
            "Protect",
            Severity::Medium,
            "Keep approved configuration baselines current",
        ),
        control(
            fw,
            "PR.IP-4",
            "Backups of information are conducted and maintained",
            "Protect",
            Severity::Medium,
            "Protect data stores with versioning and backups",
        ),
        control(
            fw,
            "DE.AE-3",
            "Event data are collected and correlated",
            "Detect",
            Severity::Medium,
            "Aggregate logs from every source into correlation tooling",
        ),
        control(
            fw,
            "DE.CM-1",
            "The network is monitored to detect potential events",
            "Detect",
            Severity::High,
            "Enable continuous monitoring on network boundaries",
        ),
    ]
}

fn soc2_controls() -> Vec<ComplianceControl> {
    let fw = Framework::Soc2;
    vec![
        control(
            fw,
            "CC6.1",
            "Logical access security measures protect information assets",
            "Common Criteria",
            Severity::Critical,
            "Restrict logical access to authorized identities",
        ),
        control(
            fw,
            "CC6.3",
            "Access to data and software is removed when no longer required",
            "Common Criteria",
            Severity::Medium,
            "Review and revoke stale access grants",
        ),
        control(
            fw,
            "CC6.6",
            "Logical access measures protect against external threats",
            "Common Criteria",
            Severity::High,
            "Harden perimeter controls against outside connections",
        ),
        control(
            fw,
            "CC6.7",
            "Information is protected during transmission and storage",
            "Common Criteria",
            Severity::High,
            "Encrypt information in transit and at rest",
        ),
        control(
            fw,
            "CC7.2",
            "Systems are monitored for anomalies and security events",
            "Common Criteria",
            Severity::Medium,
            "Monitor components for anomalous activity",
        ),
        control(
            fw,
            "CC8.1",
            "Changes to infrastructure are authorized and tracked",
            "Common Criteria",
            Severity::Medium,
            "Run infrastructure changes through change management",
        ),
        control(
            fw,
            "A1.2",
            "Environmental protections and recovery infrastructure exist",
            "Availability",
            Severity::Medium,
            "Maintain recovery capacity for data and services",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_cis_has_ten_controls() {
        assert_eq!(controls_for(Framework::Cis).len(), 10);
    }

    #[test]
    fn test_control_ids_unique_per_framework() {
        for framework in Framework::ALL {
            let controls = controls_for(framework);
            let ids: HashSet<&str> = controls.iter().map(|c| c.control_id.as_str()).collect();
            assert_eq!(ids.len(), controls.len(), "{framework}");
        }
    }

    #[test]
    fn test_framework_serialization() {
        assert_eq!(
            serde_json::to_string(&Framework::NistCsf).unwrap(),
            "\"nist_csf\""
        );
        let back: Framework = serde_json::from_str("\"soc2\"").unwrap();
        assert_eq!(back, Framework::Soc2);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Framework::Cis.display_name(), "CIS Benchmarks");
        assert_eq!(Framework::Soc2.display_name(), "SOC 2");
    }
}
