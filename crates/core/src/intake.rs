//! Patient intake processing.

use std::sync::Arc;

use carepath_types::PatientIntake;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{CareError, CareResult};
use crate::repository::IntakeRepository;

/// The fields tracked by completeness scoring.
const TRACKED_FIELDS: usize = 8;

/// An intake is complete enough for generation at this score or above.
const COMPLETENESS_FLOOR: f32 = 0.7;

/// Receipt for a processed intake submission.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeReceipt {
    pub intake_id: String,
    pub patient_id: String,
    pub processed_at: DateTime<Utc>,
}

/// Result of completeness validation for a patient's latest intake.
#[derive(Debug, Clone, Serialize)]
pub struct CompletenessReport {
    pub is_complete: bool,
    pub completeness_score: f32,
    pub missing_fields: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Service for processing patient intake data.
pub struct IntakeService {
    intakes: Arc<dyn IntakeRepository>,
    audit: Arc<dyn AuditSink>,
}

impl IntakeService {
    pub fn new(intakes: Arc<dyn IntakeRepository>, audit: Arc<dyn AuditSink>) -> Self {
        Self { intakes, audit }
    }

    /// Validates and stores one intake submission.
    ///
    /// Intakes are immutable after submission; a new encounter submits a
    /// new intake rather than updating an old one.
    pub async fn submit_intake(&self, intake: PatientIntake) -> CareResult<IntakeReceipt> {
        validate_intake(&intake)?;

        let processed_at = Utc::now();
        let intake_id = format!("intake_{}_{}", intake.patient_id, processed_at.timestamp());
        let patient_id = intake.patient_id.clone();
        let chief_complaint = intake.chief_complaint.clone();

        self.intakes.put(intake_id.clone(), intake).await?;

        self.audit.record(
            AuditEvent::new("intake_submitted")
                .patient(&patient_id)
                .details(json!({
                    "intake_id": intake_id,
                    "chief_complaint": chief_complaint,
                })),
        );

        Ok(IntakeReceipt {
            intake_id,
            patient_id,
            processed_at,
        })
    }

    /// Scores the patient's latest intake for care-plan readiness.
    ///
    /// completeness_score = populated tracked fields / 8; complete at 0.7
    /// or above.
    pub async fn validate_completeness(&self, patient_id: &str) -> CareResult<CompletenessReport> {
        let Some(intake) = self.intakes.latest_for_patient(patient_id).await? else {
            return Ok(CompletenessReport {
                is_complete: false,
                completeness_score: 0.0,
                missing_fields: vec!["no intake data found".to_owned()],
                recommendations: vec![],
            });
        };

        let missing_fields = missing_fields(&intake);
        let completeness_score =
            (TRACKED_FIELDS - missing_fields.len()) as f32 / TRACKED_FIELDS as f32;

        Ok(CompletenessReport {
            is_complete: completeness_score >= COMPLETENESS_FLOOR,
            completeness_score,
            recommendations: recommendations(&missing_fields),
            missing_fields,
        })
    }

    /// Latest stored intake for a patient, if any.
    pub async fn latest_intake(&self, patient_id: &str) -> CareResult<Option<PatientIntake>> {
        self.intakes.latest_for_patient(patient_id).await
    }

    /// All submissions for a patient, most recent first.
    pub async fn intake_history(&self, patient_id: &str) -> CareResult<Vec<IntakeReceipt>> {
        let mut history: Vec<IntakeReceipt> = self
            .intakes
            .history_for_patient(patient_id)
            .await?
            .into_iter()
            .map(|(intake_id, intake)| IntakeReceipt {
                intake_id,
                patient_id: intake.patient_id,
                processed_at: intake.intake_date,
            })
            .collect();
        history.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        Ok(history)
    }
}

fn validate_intake(intake: &PatientIntake) -> CareResult<()> {
    if intake.patient_id.trim().is_empty() {
        return Err(CareError::validation("patient_id cannot be empty"));
    }
    if intake.chief_complaint.trim().is_empty() {
        return Err(CareError::validation("chief complaint cannot be empty"));
    }
    if intake.age > 150 {
        return Err(CareError::validation("age must be between 0 and 150"));
    }
    for symptom in &intake.symptoms {
        if !(1..=10).contains(&symptom.severity) {
            return Err(CareError::validation(format!(
                "symptom severity must be between 1 and 10, got {}",
                symptom.severity
            )));
        }
    }
    Ok(())
}

fn missing_fields(intake: &PatientIntake) -> Vec<String> {
    let mut missing = Vec::new();
    if intake.chief_complaint.trim().is_empty() {
        missing.push("chief_complaint".to_owned());
    }
    if intake.symptoms.is_empty() {
        missing.push("symptoms".to_owned());
    }
    if intake.medical_history.is_empty() {
        missing.push("medical_history".to_owned());
    }
    if intake.current_medications.is_empty() {
        missing.push("current_medications".to_owned());
    }
    if intake.allergies.is_empty() {
        missing.push("allergies".to_owned());
    }
    if intake.age == 0 {
        missing.push("age".to_owned());
    }
    if intake.gender.trim().is_empty() {
        missing.push("gender".to_owned());
    }
    if intake.family_history.is_empty() {
        missing.push("family_history".to_owned());
    }
    missing
}

fn recommendations(missing_fields: &[String]) -> Vec<String> {
    let mut recommendations = Vec::new();
    if missing_fields.iter().any(|f| f == "symptoms") {
        recommendations.push("Please provide detailed symptom information".to_owned());
    }
    if missing_fields.iter().any(|f| f == "medical_history") {
        recommendations
            .push("Medical history is crucial for accurate care planning".to_owned());
    }
    recommendations
}
