//! The care-plan aggregate and its review vocabulary.
//!
//! A [`CarePlan`] is the central versioned document: created as a draft by
//! the orchestrator, mutated only by the review workflow, never physically
//! deleted. `clinician_reviews` is append-only; storage order is preserved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::score::ConfidenceScore;

/// Kind of recommended intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Medication,
    Diagnostic,
    Lifestyle,
    Followup,
    Monitoring,
    Referral,
}

/// Priority of a recommended intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    High,
    Medium,
    Low,
}

/// One recommended intervention within a care plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarePlanAction {
    pub action_id: String,
    pub action_type: ActionType,
    pub description: String,
    pub priority: ActionPriority,
    /// Free text: "immediately", "within 1 week", "quarterly", ...
    pub timeline: String,
    pub rationale: String,
    #[serde(default)]
    pub evidence_source: Option<String>,
    #[serde(default)]
    pub contraindications: Vec<String>,
}

/// Verdict of a single clinician review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    NeedsRevision,
    Rejected,
}

/// Operation of a requested modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationOp {
    Replace,
    Append,
    Remove,
}

/// One requested change to a care-plan field.
///
/// `field` is matched against the [`ModifiableField`] allow-list when the
/// review is applied; unmatched fields are skipped (lenient-patch policy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub field: String,
    pub operation: ModificationOp,
    pub new_value: Value,
}

/// The fixed set of care-plan fields a clinician modification may address.
///
/// Replaces attribute lookup by string name: anything outside this list is
/// not patchable. Actions are excluded; structured edits to actions go
/// through section regeneration instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifiableField {
    PrimaryDiagnosis,
    ClinicalSummary,
    PatientInstructions,
    SecondaryDiagnoses,
    ShortTermGoals,
    LongTermGoals,
    SuccessMetrics,
    EducationalResources,
}

impl ModifiableField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "primary_diagnosis" => Some(Self::PrimaryDiagnosis),
            "clinical_summary" => Some(Self::ClinicalSummary),
            "patient_instructions" => Some(Self::PatientInstructions),
            "secondary_diagnoses" => Some(Self::SecondaryDiagnoses),
            "short_term_goals" => Some(Self::ShortTermGoals),
            "long_term_goals" => Some(Self::LongTermGoals),
            "success_metrics" => Some(Self::SuccessMetrics),
            "educational_resources" => Some(Self::EducationalResources),
            _ => None,
        }
    }

    /// Whether the field holds a list (append/remove are only legal here).
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Self::SecondaryDiagnoses
                | Self::ShortTermGoals
                | Self::LongTermGoals
                | Self::SuccessMetrics
                | Self::EducationalResources
        )
    }
}

/// An append-only record of one reviewer's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicianReview {
    pub reviewer_id: String,
    pub reviewer_name: String,
    pub review_date: DateTime<Utc>,
    pub status: ReviewVerdict,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub modifications: Vec<Modification>,
}

/// Lifecycle state of a care plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarePlanStatus {
    Draft,
    UnderReview,
    Approved,
    SentToPatient,
    Active,
    Completed,
}

impl std::fmt::Display for CarePlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CarePlanStatus::Draft => "draft",
            CarePlanStatus::UnderReview => "under_review",
            CarePlanStatus::Approved => "approved",
            CarePlanStatus::SentToPatient => "sent_to_patient",
            CarePlanStatus::Active => "active",
            CarePlanStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Structured, versioned clinical recommendation document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarePlan {
    pub careplan_id: String,
    pub patient_id: String,
    pub created_date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,

    // Plan metadata
    pub status: CarePlanStatus,
    pub version: u32,

    // Clinical summary
    pub primary_diagnosis: String,
    #[serde(default)]
    pub secondary_diagnoses: Vec<String>,
    pub chief_complaint: String,
    pub clinical_summary: String,

    // Care plan actions
    #[serde(default)]
    pub actions: Vec<CarePlanAction>,

    // Goals and outcomes
    #[serde(default)]
    pub short_term_goals: Vec<String>,
    #[serde(default)]
    pub long_term_goals: Vec<String>,
    #[serde(default)]
    pub success_metrics: Vec<String>,

    // Review and approval
    #[serde(default)]
    pub clinician_reviews: Vec<ClinicianReview>,
    #[serde(default)]
    pub final_approver: Option<String>,
    #[serde(default)]
    pub approval_date: Option<DateTime<Utc>>,

    // Patient communication
    #[serde(default)]
    pub patient_instructions: Option<String>,
    #[serde(default)]
    pub educational_resources: Vec<String>,

    // AI generation metadata
    #[serde(default)]
    pub llm_model_used: Option<String>,
    #[serde(default)]
    pub generation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub confidence_score: Option<ConfidenceScore>,
}

impl CarePlan {
    /// Marks a content mutation: bumps `version` and refreshes
    /// `last_modified`. Every mutating workflow step goes through here so
    /// the version counter stays strictly increasing.
    pub fn touch(&mut self) {
        self.version += 1;
        self.last_modified = Utc::now();
    }

    /// Applies a single requested modification against the field allow-list.
    ///
    /// Returns `true` if the modification was applied. Unknown fields,
    /// list operations on scalar fields and non-string payloads for string
    /// fields are skipped rather than rejected; the caller records how many
    /// modifications actually landed.
    pub fn apply_modification(&mut self, modification: &Modification) -> bool {
        let Some(field) = ModifiableField::parse(&modification.field) else {
            return false;
        };

        match modification.operation {
            ModificationOp::Replace => self.replace_field(field, &modification.new_value),
            ModificationOp::Append | ModificationOp::Remove if !field.is_list() => false,
            ModificationOp::Append => match as_string(&modification.new_value) {
                Some(item) => {
                    self.list_field_mut(field).push(item);
                    true
                }
                None => false,
            },
            ModificationOp::Remove => match as_string(&modification.new_value) {
                Some(item) => {
                    let list = self.list_field_mut(field);
                    let before = list.len();
                    list.retain(|existing| existing != &item);
                    before != list.len()
                }
                None => false,
            },
        }
    }

    fn replace_field(&mut self, field: ModifiableField, value: &Value) -> bool {
        if field.is_list() {
            let Some(items) = as_string_list(value) else {
                return false;
            };
            *self.list_field_mut(field) = items;
            return true;
        }

        match field {
            ModifiableField::PrimaryDiagnosis => match as_string(value) {
                Some(text) => {
                    self.primary_diagnosis = text;
                    true
                }
                None => false,
            },
            ModifiableField::ClinicalSummary => match as_string(value) {
                Some(text) => {
                    self.clinical_summary = text;
                    true
                }
                None => false,
            },
            ModifiableField::PatientInstructions => {
                if value.is_null() {
                    self.patient_instructions = None;
                    true
                } else {
                    match as_string(value) {
                        Some(text) => {
                            self.patient_instructions = Some(text);
                            true
                        }
                        None => false,
                    }
                }
            }
            _ => false,
        }
    }

    fn list_field_mut(&mut self, field: ModifiableField) -> &mut Vec<String> {
        match field {
            ModifiableField::SecondaryDiagnoses => &mut self.secondary_diagnoses,
            ModifiableField::ShortTermGoals => &mut self.short_term_goals,
            ModifiableField::LongTermGoals => &mut self.long_term_goals,
            ModifiableField::SuccessMetrics => &mut self.success_metrics,
            ModifiableField::EducationalResources => &mut self.educational_resources,
            // Guarded by is_list() at every call site.
            _ => unreachable!("scalar field has no list representation"),
        }
    }
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}

fn as_string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_owned))
        .collect()
}
