//! Care-plan section vocabulary.

use serde::{Deserialize, Serialize};

/// The sections a generated care plan is required to populate.
///
/// This enum is deliberately *closed*: section-scoped operations (confidence
/// scoring, regeneration, patch application) only ever address these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarePlanSection {
    PrimaryDiagnosis,
    ClinicalSummary,
    Actions,
    ShortTermGoals,
    LongTermGoals,
    SuccessMetrics,
    PatientInstructions,
    EducationalResources,
}

impl CarePlanSection {
    /// All required sections, in the order they appear in generated output.
    pub const ALL: [CarePlanSection; 8] = [
        CarePlanSection::PrimaryDiagnosis,
        CarePlanSection::ClinicalSummary,
        CarePlanSection::Actions,
        CarePlanSection::ShortTermGoals,
        CarePlanSection::LongTermGoals,
        CarePlanSection::SuccessMetrics,
        CarePlanSection::PatientInstructions,
        CarePlanSection::EducationalResources,
    ];

    /// The JSON field name of this section.
    pub fn as_str(&self) -> &'static str {
        match self {
            CarePlanSection::PrimaryDiagnosis => "primary_diagnosis",
            CarePlanSection::ClinicalSummary => "clinical_summary",
            CarePlanSection::Actions => "actions",
            CarePlanSection::ShortTermGoals => "short_term_goals",
            CarePlanSection::LongTermGoals => "long_term_goals",
            CarePlanSection::SuccessMetrics => "success_metrics",
            CarePlanSection::PatientInstructions => "patient_instructions",
            CarePlanSection::EducationalResources => "educational_resources",
        }
    }
}

impl std::fmt::Display for CarePlanSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CarePlanSection {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CarePlanSection::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| UnknownSection(s.to_owned()))
    }
}

/// The named section is not part of the care-plan vocabulary.
#[derive(Debug, thiserror::Error)]
#[error("unknown care plan section: {0}")]
pub struct UnknownSection(pub String);
