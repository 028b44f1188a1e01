//! EHR record model.
//!
//! Owned by the EHR gateway; read-only to the core services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a laboratory result relative to its reference range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabStatus {
    Normal,
    Abnormal,
    Critical,
}

/// One laboratory result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    pub test_name: String,
    pub value: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub reference_range: Option<String>,
    #[serde(default)]
    pub status: Option<LabStatus>,
    pub test_date: DateTime<Utc>,
}

/// A single set of recorded vital signs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    #[serde(default)]
    pub temperature_f: Option<f64>,
    #[serde(default)]
    pub blood_pressure_systolic: Option<u32>,
    #[serde(default)]
    pub blood_pressure_diastolic: Option<u32>,
    #[serde(default)]
    pub heart_rate: Option<u32>,
    #[serde(default)]
    pub respiratory_rate: Option<u32>,
    #[serde(default)]
    pub oxygen_saturation: Option<f64>,
    pub recorded_date: DateTime<Utc>,
}

/// Role of a diagnosis within the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosisStatus {
    Primary,
    Secondary,
    RuleOut,
}

/// One coded diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    #[serde(default)]
    pub icd_10_code: Option<String>,
    pub description: String,
    pub diagnosis_date: DateTime<Utc>,
    pub status: DiagnosisStatus,
    #[serde(default)]
    pub provider: Option<String>,
}

/// One performed procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    #[serde(default)]
    pub cpt_code: Option<String>,
    pub description: String,
    pub procedure_date: DateTime<Utc>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Patient record as returned by the EHR gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EhrRecord {
    pub patient_id: String,
    pub record_id: String,
    pub last_updated: DateTime<Utc>,

    #[serde(default)]
    pub mrn: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<DateTime<Utc>>,
    #[serde(default)]
    pub gender: Option<String>,

    #[serde(default)]
    pub diagnoses: Vec<Diagnosis>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    #[serde(default)]
    pub lab_results: Vec<LabResult>,
    #[serde(default)]
    pub vital_signs: Vec<VitalSigns>,
}
