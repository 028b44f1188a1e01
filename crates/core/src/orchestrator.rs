//! Care-plan draft orchestration.
//!
//! Composes intake, EHR data and retrieved guidelines, invokes the draft
//! generator and converts its output into a typed [`CarePlan`]. Generation
//! failures are recovered locally with a rule-based template so the system
//! always produces *some* draft; every other failure propagates typed.

use std::sync::Arc;

use carepath_llm::{DraftGenerator, GenerationOutcome, SafetyReport};
use carepath_types::{
    ActionPriority, ActionType, CarePlan, CarePlanAction, CarePlanSection, CarePlanStatus,
    ConfidenceScore, EhrRecord, Guideline, PatientIntake,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::timeout;

use crate::audit::{AuditEvent, AuditSink};
use crate::config::CoreConfig;
use crate::ehr::EhrGateway;
use crate::error::{CareError, CareResult};
use crate::intake::IntakeService;
use crate::repository::{CarePlanRepository, PlanLocks};
use crate::retrieval::{GuidelineIndex, QueryEmbedder};

/// Model name recorded when the rule-based fallback produced the draft.
pub const FALLBACK_MODEL: &str = "fallback_template";

/// Receipt for a generated (or reused) draft.
#[derive(Debug, Clone, Serialize)]
pub struct DraftReceipt {
    pub careplan_id: String,
    pub patient_id: String,
    pub model_used: String,
    pub tokens_used: u64,
    pub confidence_score: f32,
    pub created_at: DateTime<Utc>,
}

/// Receipt for a regenerated section.
#[derive(Debug, Clone, Serialize)]
pub struct SectionReceipt {
    pub careplan_id: String,
    pub updated_section: CarePlanSection,
    pub version: u32,
    pub updated_at: DateTime<Utc>,
}

/// Orchestrates care-plan generation from intake, EHR and guidelines.
pub struct CarePlanOrchestrator {
    intake: Arc<IntakeService>,
    ehr: Arc<dyn EhrGateway>,
    embedder: Arc<dyn QueryEmbedder>,
    guidelines: Arc<dyn GuidelineIndex>,
    generator: Arc<dyn DraftGenerator>,
    plans: Arc<dyn CarePlanRepository>,
    locks: Arc<PlanLocks>,
    audit: Arc<dyn AuditSink>,
    config: CoreConfig,
}

impl CarePlanOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        intake: Arc<IntakeService>,
        ehr: Arc<dyn EhrGateway>,
        embedder: Arc<dyn QueryEmbedder>,
        guidelines: Arc<dyn GuidelineIndex>,
        generator: Arc<dyn DraftGenerator>,
        plans: Arc<dyn CarePlanRepository>,
        locks: Arc<PlanLocks>,
        audit: Arc<dyn AuditSink>,
        config: CoreConfig,
    ) -> Self {
        Self {
            intake,
            ehr,
            embedder,
            guidelines,
            generator,
            plans,
            locks,
            audit,
            config,
        }
    }

    /// Generates a care-plan draft for a patient.
    ///
    /// Without `force`, an existing draft makes this a no-op returning the
    /// existing draft's receipt. With `force`, regenerated content replaces
    /// the existing plan in place under the same `careplan_id`.
    pub async fn generate_draft(&self, patient_id: &str, force: bool) -> CareResult<DraftReceipt> {
        let existing = self.plans.find_by_patient(patient_id).await?;
        if let Some(plan) = &existing {
            if !force {
                tracing::debug!(patient_id, careplan_id = %plan.careplan_id, "reusing existing draft");
                return Ok(receipt_for(plan, 0));
            }
        }

        let intake = self
            .intake_for_generation(patient_id)
            .await?;

        // EHR fetch and guideline retrieval are independent; run them
        // concurrently and treat either as absent on failure.
        let (ehr, guidelines) = tokio::join!(
            self.fetch_ehr_best_effort(patient_id),
            self.retrieve_guidelines(&intake),
        );

        let outcome = match timeout(
            self.config.llm_timeout(),
            self.generator
                .generate_care_plan(&intake, ehr.as_ref(), &guidelines),
        )
        .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => {
                tracing::warn!(patient_id, %error, "llm generation failed, using fallback template");
                fallback::template_outcome(&intake)
            }
            Err(_) => {
                tracing::warn!(patient_id, "llm generation timed out, using fallback template");
                fallback::template_outcome(&intake)
            }
        };

        let plan = match existing {
            Some(previous) if force => {
                // Replacement is a read-modify-write: take the plan lock and
                // re-read, since reviews may have landed while the generation
                // call was in flight. The review trail, approval record and
                // version counter carry over from the just-read plan; only
                // the generated content is replaced.
                let _guard = self.locks.acquire(&previous.careplan_id).await;
                let current = self
                    .plans
                    .get(&previous.careplan_id)
                    .await?
                    .unwrap_or(previous);
                let mut plan =
                    plan_from_outcome(patient_id, current.careplan_id.clone(), &outcome)?;
                plan.created_date = current.created_date;
                plan.clinician_reviews = current.clinician_reviews;
                plan.final_approver = current.final_approver;
                plan.approval_date = current.approval_date;
                plan.version = current.version + 1;
                self.plans.put(plan.clone()).await?;
                plan
            }
            _ => {
                let careplan_id = format!("cp_{}_{}", patient_id, Utc::now().timestamp());
                let plan = plan_from_outcome(patient_id, careplan_id, &outcome)?;
                self.plans.put(plan.clone()).await?;
                plan
            }
        };

        self.audit.record(
            AuditEvent::new("careplan_generated")
                .patient(patient_id)
                .careplan(&plan.careplan_id)
                .details(json!({
                    "model_used": outcome.model_used,
                    "tokens_used": outcome.tokens_used,
                    "confidence_score": outcome.confidence_score,
                    "forced": force,
                })),
        );

        Ok(receipt_for(&plan, outcome.tokens_used))
    }

    /// Latest draft for a patient; `None` when absent.
    pub async fn get_existing_draft(&self, patient_id: &str) -> CareResult<Option<CarePlan>> {
        self.plans.find_by_patient(patient_id).await
    }

    /// Plan by id; `None` when absent. Callers decide whether that is an
    /// error.
    pub async fn get_draft(&self, careplan_id: &str) -> CareResult<Option<CarePlan>> {
        self.plans.get(careplan_id).await
    }

    /// Re-derives one section of an existing plan using the plan itself as
    /// context, then replaces that field in place.
    pub async fn regenerate_section(
        &self,
        careplan_id: &str,
        section: CarePlanSection,
        additional_context: Option<&str>,
    ) -> CareResult<SectionReceipt> {
        let _guard = self.locks.acquire(careplan_id).await;

        let mut plan = self
            .plans
            .get(careplan_id)
            .await?
            .ok_or_else(|| CareError::not_found(format!("care plan {careplan_id}")))?;

        let plan_json = serde_json::to_value(&plan)
            .map_err(|e| CareError::Repository(e.to_string()))?;

        let updated = timeout(
            self.config.llm_timeout(),
            self.generator
                .regenerate_section(section, &plan_json, additional_context),
        )
        .await
        .map_err(|_| CareError::Generation(carepath_llm::GenerationError::Timeout))??;

        apply_section(&mut plan, section, &updated)?;
        plan.touch();
        self.plans.put(plan.clone()).await?;

        self.audit.record(
            AuditEvent::new("careplan_section_regenerated")
                .patient(&plan.patient_id)
                .careplan(careplan_id)
                .details(json!({
                    "section": section.as_str(),
                    "version": plan.version,
                })),
        );

        Ok(SectionReceipt {
            careplan_id: careplan_id.to_owned(),
            updated_section: section,
            version: plan.version,
            updated_at: plan.last_modified,
        })
    }

    /// Runs the independent safety-validation pass over a stored plan.
    pub async fn safety_check(&self, careplan_id: &str) -> CareResult<SafetyReport> {
        let plan = self
            .plans
            .get(careplan_id)
            .await?
            .ok_or_else(|| CareError::not_found(format!("care plan {careplan_id}")))?;

        let plan_json = serde_json::to_value(&plan)
            .map_err(|e| CareError::Repository(e.to_string()))?;

        let report = timeout(
            self.config.llm_timeout(),
            self.generator.validate_care_plan(&plan_json),
        )
        .await
        .map_err(|_| CareError::Generation(carepath_llm::GenerationError::Timeout))??;

        self.audit.record(
            AuditEvent::new("careplan_validated")
                .patient(&plan.patient_id)
                .careplan(careplan_id)
                .details(json!({
                    "contraindications": report.contraindications.len(),
                    "concerns": report.concerns.len(),
                })),
        );

        Ok(report)
    }

    async fn intake_for_generation(&self, patient_id: &str) -> CareResult<PatientIntake> {
        let Some(intake) = self.intake.latest_intake(patient_id).await? else {
            return Err(CareError::not_found(format!(
                "no intake data for patient {patient_id}"
            )));
        };

        let report = self.intake.validate_completeness(patient_id).await?;
        if !report.is_complete {
            return Err(CareError::validation(format!(
                "intake for patient {} is incomplete (score {:.2}, missing: {})",
                patient_id,
                report.completeness_score,
                report.missing_fields.join(", ")
            )));
        }
        Ok(intake)
    }

    async fn fetch_ehr_best_effort(&self, patient_id: &str) -> Option<EhrRecord> {
        match timeout(self.config.ehr_timeout(), self.ehr.patient_record(patient_id)).await {
            Ok(Ok(record)) => Some(record),
            Ok(Err(error)) => {
                tracing::warn!(patient_id, %error, "ehr fetch failed, continuing without ehr data");
                None
            }
            Err(_) => {
                tracing::warn!(patient_id, "ehr fetch timed out, continuing without ehr data");
                None
            }
        }
    }

    async fn retrieve_guidelines(&self, intake: &PatientIntake) -> Vec<Guideline> {
        let query = guideline_query(intake, None);
        let embedding = match self.embedder.embed(&query).await {
            Ok(embedding) => embedding,
            Err(error) => {
                tracing::warn!(%error, "query embedding failed, continuing without guidelines");
                return Vec::new();
            }
        };

        match self
            .guidelines
            .search(&embedding, self.config.retrieval_k())
            .await
        {
            Ok(results) => results
                .into_iter()
                .filter(|scored| scored.score > self.config.relevance_threshold())
                .map(|scored| scored.guideline)
                .collect(),
            Err(error) => {
                tracing::warn!(%error, "guideline retrieval failed, continuing without guidelines");
                Vec::new()
            }
        }
    }
}

/// Builds the deterministic retrieval query from patient context.
fn guideline_query(intake: &PatientIntake, ehr: Option<&EhrRecord>) -> String {
    let mut parts = vec![format!("chief complaint: {}", intake.chief_complaint)];

    if !intake.symptoms.is_empty() {
        let symptoms: Vec<&str> = intake.symptoms.iter().map(|s| s.description.as_str()).collect();
        parts.push(format!("symptoms: {}", symptoms.join(", ")));
    }
    if !intake.medical_history.is_empty() {
        let history: Vec<&str> = intake
            .medical_history
            .iter()
            .map(|h| h.condition.as_str())
            .collect();
        parts.push(format!("medical history: {}", history.join(", ")));
    }
    if let Some(record) = ehr {
        if !record.diagnoses.is_empty() {
            let recent: Vec<&str> = record.diagnoses
                [record.diagnoses.len().saturating_sub(3)..]
                .iter()
                .map(|d| d.description.as_str())
                .collect();
            parts.push(format!("recent diagnoses: {}", recent.join(", ")));
        }
    }

    parts.join(" | ")
}

fn receipt_for(plan: &CarePlan, tokens_used: u64) -> DraftReceipt {
    DraftReceipt {
        careplan_id: plan.careplan_id.clone(),
        patient_id: plan.patient_id.clone(),
        model_used: plan
            .llm_model_used
            .clone()
            .unwrap_or_else(|| "unknown".to_owned()),
        tokens_used,
        confidence_score: plan.confidence_score.map(|s| s.value()).unwrap_or(0.0),
        created_at: plan.created_date,
    }
}

/// Converts raw generator output into the typed care-plan document.
///
/// Conversion is lenient: unknown or missing fields default to empty
/// strings and lists, and each action receives a derived id
/// `{careplan_id}_action_{index}`.
fn plan_from_outcome(
    patient_id: &str,
    careplan_id: String,
    outcome: &GenerationOutcome,
) -> CareResult<CarePlan> {
    let raw = &outcome.care_plan;
    let now = Utc::now();

    let confidence_score = ConfidenceScore::new(outcome.confidence_score)
        .map_err(|e| CareError::validation(e.to_string()))?;

    Ok(CarePlan {
        patient_id: patient_id.to_owned(),
        created_date: now,
        last_modified: now,
        status: CarePlanStatus::Draft,
        version: 1,
        primary_diagnosis: str_field(raw, "primary_diagnosis"),
        secondary_diagnoses: list_field(raw, "secondary_diagnoses"),
        chief_complaint: str_field(raw, "chief_complaint"),
        clinical_summary: str_field(raw, "clinical_summary"),
        actions: actions_from_value(&careplan_id, raw.get("actions")),
        short_term_goals: list_field(raw, "short_term_goals"),
        long_term_goals: list_field(raw, "long_term_goals"),
        success_metrics: list_field(raw, "success_metrics"),
        clinician_reviews: Vec::new(),
        final_approver: None,
        approval_date: None,
        patient_instructions: opt_str_field(raw, "patient_instructions"),
        educational_resources: list_field(raw, "educational_resources"),
        llm_model_used: Some(outcome.model_used.clone()),
        generation_timestamp: Some(now),
        confidence_score: Some(confidence_score),
        careplan_id,
    })
}

/// Builds the action list 1:1 from the generator's `actions` array.
fn actions_from_value(careplan_id: &str, value: Option<&Value>) -> Vec<CarePlanAction> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| CarePlanAction {
            action_id: format!("{careplan_id}_action_{index}"),
            action_type: enum_field(item, "type", ActionType::Medication),
            description: str_field(item, "description"),
            priority: enum_field(item, "priority", ActionPriority::Medium),
            timeline: str_field_or(item, "timeline", "within 1 week"),
            rationale: str_field(item, "rationale"),
            evidence_source: opt_str_field(item, "evidence_source"),
            contraindications: list_field(item, "contraindications"),
        })
        .collect()
}

/// Replaces one section of the plan with regenerated content.
///
/// The generator is asked to key its response by the section name; a bare
/// value is accepted as well.
fn apply_section(plan: &mut CarePlan, section: CarePlanSection, updated: &Value) -> CareResult<()> {
    let value = updated.get(section.as_str()).unwrap_or(updated);

    match section {
        CarePlanSection::PrimaryDiagnosis => {
            plan.primary_diagnosis = require_str(value, section)?;
        }
        CarePlanSection::ClinicalSummary => {
            plan.clinical_summary = require_str(value, section)?;
        }
        CarePlanSection::PatientInstructions => {
            plan.patient_instructions = Some(require_str(value, section)?);
        }
        CarePlanSection::Actions => {
            plan.actions = actions_from_value(&plan.careplan_id, Some(value));
        }
        CarePlanSection::ShortTermGoals => {
            plan.short_term_goals = require_list(value, section)?;
        }
        CarePlanSection::LongTermGoals => {
            plan.long_term_goals = require_list(value, section)?;
        }
        CarePlanSection::SuccessMetrics => {
            plan.success_metrics = require_list(value, section)?;
        }
        CarePlanSection::EducationalResources => {
            plan.educational_resources = require_list(value, section)?;
        }
    }
    Ok(())
}

fn require_str(value: &Value, section: CarePlanSection) -> CareResult<String> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| CareError::validation(format!("regenerated {section} is not a string")))
}

fn require_list(value: &Value, section: CarePlanSection) -> CareResult<Vec<String>> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_owned))
                .collect()
        })
        .ok_or_else(|| CareError::validation(format!("regenerated {section} is not a list")))
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn str_field_or(value: &Value, key: &str, default: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_owned()
}

fn opt_str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn list_field(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

fn enum_field<T: serde::de::DeserializeOwned>(value: &Value, key: &str, default: T) -> T {
    value
        .get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or(default)
}

/// Rule-based draft templates used when the generator fails.
pub mod fallback {
    use super::*;

    /// Produces a deterministic draft keyed on chief-complaint keywords.
    ///
    /// Confidence is computed from the populated sections with the same
    /// formula as generated drafts.
    pub fn template_outcome(intake: &PatientIntake) -> GenerationOutcome {
        let care_plan = template_plan(intake);
        let confidence_score = carepath_llm::completeness_confidence(&care_plan);
        GenerationOutcome {
            care_plan,
            model_used: FALLBACK_MODEL.to_owned(),
            tokens_used: 0,
            confidence_score,
        }
    }

    fn template_plan(intake: &PatientIntake) -> Value {
        let complaint = intake.chief_complaint.to_lowercase();
        let (actions, goals) = if complaint.contains("diabetes") {
            diabetes_template()
        } else if complaint.contains("hypertension") || complaint.contains("blood pressure") {
            hypertension_template()
        } else {
            generic_template(&intake.chief_complaint)
        };

        let (short_term, long_term) = split_goals(goals);

        json!({
            "primary_diagnosis": intake.chief_complaint,
            "secondary_diagnoses": [],
            "chief_complaint": intake.chief_complaint,
            "clinical_summary": format!(
                "Patient presents with {}. Comprehensive evaluation and management plan developed.",
                intake.chief_complaint
            ),
            "actions": actions,
            "short_term_goals": short_term,
            "long_term_goals": long_term,
            "success_metrics": [
                "Patient reports symptom improvement",
                "Clinical markers within target range",
                "Treatment adherence above 80%",
            ],
            "patient_instructions": format!(
                "Follow the prescribed treatment plan for {}. Contact your provider with concerns.",
                intake.chief_complaint
            ),
            "educational_resources": [
                format!("Patient education materials for {}", intake.chief_complaint),
                "General wellness resources",
            ],
        })
    }

    fn diabetes_template() -> (Value, Vec<&'static str>) {
        (
            json!([
                {
                    "type": "medication",
                    "description": "Continue Metformin 500mg twice daily",
                    "priority": "high",
                    "timeline": "ongoing",
                    "rationale": "Blood glucose management",
                },
                {
                    "type": "lifestyle",
                    "description": "Low-carb diet consultation with a nutritionist",
                    "priority": "high",
                    "timeline": "within 2 weeks",
                    "rationale": "Dietary management is essential for diabetes control",
                },
                {
                    "type": "monitoring",
                    "description": "Blood glucose self-monitoring with HbA1c testing every 3 months",
                    "priority": "medium",
                    "timeline": "quarterly",
                    "rationale": "Monitor long-term glucose control",
                },
            ]),
            vec![
                "Achieve HbA1c below 7%",
                "Maintain stable blood glucose levels",
                "Prevent diabetic complications",
            ],
        )
    }

    fn hypertension_template() -> (Value, Vec<&'static str>) {
        (
            json!([
                {
                    "type": "medication",
                    "description": "Start ACE inhibitor (Lisinopril 10mg daily)",
                    "priority": "high",
                    "timeline": "immediately",
                    "rationale": "First-line treatment for hypertension",
                },
                {
                    "type": "lifestyle",
                    "description": "Reduce sodium intake to under 2g per day",
                    "priority": "high",
                    "timeline": "ongoing",
                    "rationale": "Dietary sodium reduction improves blood pressure control",
                },
                {
                    "type": "monitoring",
                    "description": "Home blood pressure monitoring twice daily",
                    "priority": "medium",
                    "timeline": "daily",
                    "rationale": "Track treatment response",
                },
            ]),
            vec![
                "Achieve blood pressure below 130/80 mmHg",
                "Reduce cardiovascular risk",
                "Maintain medication adherence",
            ],
        )
    }

    fn generic_template(chief_complaint: &str) -> (Value, Vec<&'static str>) {
        (
            json!([
                {
                    "type": "diagnostic",
                    "description": format!("Further evaluation of {chief_complaint}"),
                    "priority": "high",
                    "timeline": "within 1 week",
                    "rationale": "Additional information needed for a proper diagnosis",
                },
                {
                    "type": "lifestyle",
                    "description": "General wellness consultation",
                    "priority": "medium",
                    "timeline": "within 2 weeks",
                    "rationale": "Address overall health optimisation",
                },
            ]),
            vec![
                "Establish an accurate diagnosis",
                "Address patient concerns",
                "Develop a comprehensive treatment plan",
            ],
        )
    }

    fn split_goals(goals: Vec<&'static str>) -> (Vec<String>, Vec<String>) {
        let short_term: Vec<String> = goals.iter().take(2).map(|g| g.to_string()).collect();
        let mut long_term: Vec<String> = goals.iter().skip(2).map(|g| g.to_string()).collect();
        if long_term.is_empty() {
            long_term.push("Maintain optimal health".to_owned());
        }
        (short_term, long_term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carepath_types::{Diagnosis, DiagnosisStatus, Symptom};

    fn intake(chief_complaint: &str) -> PatientIntake {
        PatientIntake {
            patient_id: "patient001".into(),
            intake_date: Utc::now(),
            age: 54,
            gender: "F".into(),
            weight_kg: None,
            height_cm: None,
            chief_complaint: chief_complaint.into(),
            symptoms: vec![Symptom {
                description: "fatigue".into(),
                severity: 3,
                duration_days: None,
                onset_date: None,
            }],
            medical_history: vec![],
            family_history: vec![],
            allergies: vec![],
            current_medications: vec![],
            smoking_status: None,
            alcohol_consumption: None,
            exercise_frequency: None,
            additional_notes: None,
        }
    }

    #[test]
    fn fallback_picks_diabetes_template() {
        let outcome = fallback::template_outcome(&intake("type 2 diabetes follow-up"));
        assert_eq!(outcome.model_used, FALLBACK_MODEL);
        assert_eq!(outcome.tokens_used, 0);

        let actions = outcome.care_plan["actions"].as_array().unwrap();
        assert!(actions.iter().any(|a| {
            a["description"].as_str().unwrap().contains("glucose")
        }));
        assert!(outcome.confidence_score > 0.0);
    }

    #[test]
    fn fallback_matches_blood_pressure_phrase() {
        let outcome = fallback::template_outcome(&intake("persistent high blood pressure"));
        let actions = outcome.care_plan["actions"].as_array().unwrap();
        assert!(actions
            .iter()
            .any(|a| a["description"].as_str().unwrap().contains("Lisinopril")));
    }

    #[test]
    fn fallback_generic_template_has_diagnostic_action() {
        let outcome = fallback::template_outcome(&intake("recurring migraines"));
        let actions = outcome.care_plan["actions"].as_array().unwrap();
        assert_eq!(actions[0]["type"], "diagnostic");
        assert!(actions[0]["description"]
            .as_str()
            .unwrap()
            .contains("recurring migraines"));
    }

    #[test]
    fn plan_conversion_derives_action_ids() {
        let outcome = fallback::template_outcome(&intake("type 2 diabetes follow-up"));
        let plan =
            plan_from_outcome("patient001", "cp_patient001_1700000000".into(), &outcome).unwrap();

        assert_eq!(plan.status, CarePlanStatus::Draft);
        assert_eq!(plan.version, 1);
        assert_eq!(plan.actions[0].action_id, "cp_patient001_1700000000_action_0");
        assert_eq!(plan.actions[1].action_id, "cp_patient001_1700000000_action_1");
        assert_eq!(plan.llm_model_used.as_deref(), Some(FALLBACK_MODEL));
        assert!(plan.confidence_score.is_some());
    }

    #[test]
    fn plan_conversion_tolerates_sparse_output() {
        let outcome = GenerationOutcome {
            care_plan: json!({"primary_diagnosis": "Migraine"}),
            model_used: "gpt-4-turbo-preview".into(),
            tokens_used: 812,
            confidence_score: 0.125,
        };
        let plan = plan_from_outcome("patient001", "cp_x".into(), &outcome).unwrap();
        assert_eq!(plan.primary_diagnosis, "Migraine");
        assert!(plan.actions.is_empty());
        assert!(plan.clinical_summary.is_empty());
        assert_eq!(plan.patient_instructions, None);
    }

    #[test]
    fn query_includes_recent_diagnoses() {
        let record = EhrRecord {
            patient_id: "patient001".into(),
            record_id: "ehr_patient001".into(),
            last_updated: Utc::now(),
            mrn: None,
            date_of_birth: None,
            gender: None,
            diagnoses: ["old", "cad", "ckd", "t2dm"]
                .iter()
                .map(|name| Diagnosis {
                    icd_10_code: None,
                    description: name.to_string(),
                    diagnosis_date: Utc::now(),
                    status: DiagnosisStatus::Secondary,
                    provider: None,
                })
                .collect(),
            procedures: vec![],
            lab_results: vec![],
            vital_signs: vec![],
        };

        let query = guideline_query(&intake("chest pain"), Some(&record));
        assert!(query.starts_with("chief complaint: chest pain"));
        assert!(query.contains("symptoms: fatigue"));
        assert!(query.contains("recent diagnoses: cad, ckd, t2dm"));
        assert!(!query.contains("old"));
    }

    #[test]
    fn section_application_accepts_keyed_and_bare_values() {
        let outcome = fallback::template_outcome(&intake("type 2 diabetes follow-up"));
        let mut plan =
            plan_from_outcome("patient001", "cp_x".into(), &outcome).unwrap();

        apply_section(
            &mut plan,
            CarePlanSection::ClinicalSummary,
            &json!({"clinical_summary": "Updated summary."}),
        )
        .unwrap();
        assert_eq!(plan.clinical_summary, "Updated summary.");

        apply_section(
            &mut plan,
            CarePlanSection::ShortTermGoals,
            &json!(["Goal A", "Goal B"]),
        )
        .unwrap();
        assert_eq!(plan.short_term_goals, vec!["Goal A", "Goal B"]);

        let err = apply_section(
            &mut plan,
            CarePlanSection::PrimaryDiagnosis,
            &json!({"primary_diagnosis": 42}),
        )
        .unwrap_err();
        assert!(matches!(err, CareError::Validation(_)));
    }
}
