//! Mapping between drift categories and framework controls.
//!
//! A mapping records that findings of a drift category provide technical
//! evidence for a control, at a stated confidence. Low-confidence mappings
//! are advisory only: they never fail a control on their own and are kept
//! distinguishable from medium/high evidence in assessment output.

use crate::compliance::controls::Framework;
use crate::findings::DriftFinding;
use crate::provider::CloudProvider;
use crate::rules::types::DriftCategory;
use serde::{Deserialize, Serialize};

/// Confidence that a drift category is real evidence for a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingConfidence {
    Low,
    Medium,
    High,
}

impl MappingConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingConfidence::Low => "low",
            MappingConfidence::Medium => "medium",
            MappingConfidence::High => "high",
        }
    }

    /// Whether evidence at this confidence may fail a control.
    pub fn is_technical(&self) -> bool {
        *self >= MappingConfidence::Medium
    }
}

impl std::fmt::Display for MappingConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One (drift category → control) association.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMapping {
    pub framework: Framework,
    pub control_id: String,
    pub category: DriftCategory,
    /// Resource types the mapping is restricted to. Empty = any.
    #[serde(default)]
    pub resource_types: Vec<String>,
    /// Providers the mapping is restricted to. Empty = any.
    #[serde(default)]
    pub providers: Vec<CloudProvider>,
    pub confidence: MappingConfidence,
}

impl ControlMapping {
    /// Whether a finding is evidence under this mapping.
    pub fn matches(&self, finding: &DriftFinding) -> bool {
        if finding.drift_type != self.category {
            return false;
        }
        let type_ok = self.resource_types.is_empty()
            || self.resource_types.iter().any(|t| t == &finding.resource_type);
        let provider_ok = self.providers.is_empty() || self.providers.contains(&finding.provider);
        type_ok && provider_ok
    }
}

/// Immutable lookup table of control mappings.
pub struct MappingTable {
    mappings: Vec<ControlMapping>,
}

impl MappingTable {
    /// The builtin mapping table.
    pub fn builtin() -> Self {
        Self {
            mappings: builtin_mappings(),
        }
    }

    pub fn with_mappings(mappings: Vec<ControlMapping>) -> Self {
        Self { mappings }
    }

    pub fn mappings(&self) -> &[ControlMapping] {
        &self.mappings
    }

    /// Every mapping targeting one control.
    pub fn for_control(&self, framework: Framework, control_id: &str) -> Vec<&ControlMapping> {
        self.mappings
            .iter()
            .filter(|m| m.framework == framework && m.control_id == control_id)
            .collect()
    }

    /// Every mapping a finding provides evidence for, with its confidence.
    pub fn for_finding(&self, framework: Framework, finding: &DriftFinding) -> Vec<&ControlMapping> {
        self.mappings
            .iter()
            .filter(|m| m.framework == framework && m.matches(finding))
            .collect()
    }
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn mapping(
    framework: Framework,
    control_id: &str,
    category: DriftCategory,
    confidence: MappingConfidence,
) -> ControlMapping {
    ControlMapping {
        framework,
        control_id: control_id.to_string(),
        category,
        resource_types: Vec::new(),
        providers: Vec::new(),
        confidence,
    }
}

fn builtin_mappings() -> Vec<ControlMapping> {
    use DriftCategory::*;
    use Framework::*;
    use MappingConfidence::*;

    vec![
        // CIS
        mapping(Cis, "1.1", AccessControl, Medium),
        mapping(Cis, "1.5", AccessControl, Medium),
        mapping(Cis, "2.1", AccessControl, High),
        mapping(Cis, "2.2", Encryption, High),
        mapping(Cis, "2.3", Encryption, Medium),
        mapping(Cis, "3.1", Logging, High),
        mapping(Cis, "3.3", Logging, Medium),
        mapping(Cis, "4.1", NetworkExposure, High),
        mapping(Cis, "4.2", NetworkExposure, Medium),
        mapping(Cis, "5.1", DataProtection, Medium),
        // NIST CSF
        mapping(NistCsf, "PR.AC-1", AccessControl, High),
        mapping(NistCsf, "PR.AC-5", NetworkExposure, Medium),
        mapping(NistCsf, "PR.DS-1", Encryption, High),
        mapping(NistCsf, "PR.IP-1", ConfigurationChange, Low),
        mapping(NistCsf, "PR.IP-4", DataProtection, Medium),
        mapping(NistCsf, "DE.AE-3", Logging, Medium),
        mapping(NistCsf, "DE.CM-1", Logging, High),
        // SOC 2
        mapping(Soc2, "CC6.1", AccessControl, High),
        mapping(Soc2, "CC6.3", AccessControl, Low),
        mapping(Soc2, "CC6.6", NetworkExposure, Medium),
        mapping(Soc2, "CC6.7", Encryption, Medium),
        mapping(Soc2, "CC7.2", Logging, Medium),
        mapping(Soc2, "CC8.1", ConfigurationChange, Low),
        mapping(Soc2, "A1.2", DataProtection, Medium),
    ]
}
