//! Patient intake model.
//!
//! An intake is the patient-reported questionnaire captured once per
//! encounter. It is immutable after submission; there is no update path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One patient-reported symptom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    pub description: String,
    /// Severity on a 1-10 scale.
    pub severity: u8,
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub onset_date: Option<DateTime<Utc>>,
}

/// Status of a reported condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionStatus {
    Active,
    Resolved,
    Chronic,
}

/// One entry in the patient's reported medical history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalHistoryEntry {
    pub condition: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub diagnosis_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A medication the patient is currently taking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub prescribing_physician: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// The initial patient-reported clinical questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientIntake {
    pub patient_id: String,
    pub intake_date: DateTime<Utc>,

    // Demographics
    pub age: u32,
    pub gender: String,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub height_cm: Option<f64>,

    // Chief complaint and symptoms
    pub chief_complaint: String,
    #[serde(default)]
    pub symptoms: Vec<Symptom>,

    // Medical history
    #[serde(default)]
    pub medical_history: Vec<MedicalHistoryEntry>,
    #[serde(default)]
    pub family_history: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,

    // Current medications
    #[serde(default)]
    pub current_medications: Vec<Medication>,

    // Lifestyle factors
    #[serde(default)]
    pub smoking_status: Option<String>,
    #[serde(default)]
    pub alcohol_consumption: Option<String>,
    #[serde(default)]
    pub exercise_frequency: Option<String>,

    #[serde(default)]
    pub additional_notes: Option<String>,
}
