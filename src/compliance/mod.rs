//! Compliance control mapping and assessment.

pub mod assessment;
pub mod controls;
pub mod mapping;

pub use assessment::{
    Assessment, AssessmentEngine, AssessmentStatus, ComplianceOverview, ControlResult,
    ControlStatus, FailingControl, FrameworkSummary, Trend, TrendReport, compliance_percent,
};
pub use controls::{ComplianceControl, Framework, controls_for};
pub use mapping::{ControlMapping, MappingConfidence, MappingTable};
