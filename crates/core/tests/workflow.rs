//! End-to-end workflow: intake submission through draft generation, review
//! cycles, approval and patient delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use carepath_core::{
    ApprovalRequest, AuditSink, BagOfWordsEmbedder, CareError, CarePlanOrchestrator,
    CarePlanRepository, CoreConfig, DeliveryError, DeliveryReceipt, InMemoryCarePlans,
    InMemoryGuidelineIndex, InMemoryIntakes, IntakeService, PatientDelivery, PatientFacingPlan,
    PlanLocks, PortalDelivery, RecordingAuditSink, ReviewRequest, ReviewService,
    StaticEhrGateway,
};
use carepath_llm::{DraftGenerator, GenerationError, GenerationOutcome, SafetyReport};
use carepath_types::{
    CarePlanSection, CarePlanStatus, ConditionStatus, EhrRecord, Guideline, MedicalHistoryEntry,
    Medication, Modification, ModificationOp, PatientIntake, ReviewVerdict, Symptom,
};
use chrono::Utc;
use serde_json::{json, Value};

/// Generator that always fails, forcing the rule-based fallback.
struct OfflineGenerator;

#[async_trait]
impl DraftGenerator for OfflineGenerator {
    async fn generate_care_plan(
        &self,
        _intake: &PatientIntake,
        _ehr: Option<&EhrRecord>,
        _guidelines: &[Guideline],
    ) -> Result<GenerationOutcome, GenerationError> {
        Err(GenerationError::MissingContent)
    }

    async fn regenerate_section(
        &self,
        _section: CarePlanSection,
        _existing_plan: &Value,
        _additional_context: Option<&str>,
    ) -> Result<Value, GenerationError> {
        Err(GenerationError::MissingContent)
    }

    async fn validate_care_plan(&self, _plan: &Value) -> Result<SafetyReport, GenerationError> {
        Err(GenerationError::MissingContent)
    }
}

/// Generator returning a fixed, fully populated payload.
struct ScriptedGenerator;

#[async_trait]
impl DraftGenerator for ScriptedGenerator {
    async fn generate_care_plan(
        &self,
        intake: &PatientIntake,
        _ehr: Option<&EhrRecord>,
        _guidelines: &[Guideline],
    ) -> Result<GenerationOutcome, GenerationError> {
        Ok(GenerationOutcome {
            care_plan: json!({
                "primary_diagnosis": "Type 2 Diabetes Mellitus",
                "secondary_diagnoses": ["Hyperlipidemia"],
                "chief_complaint": intake.chief_complaint,
                "clinical_summary": "Poorly controlled glucose over three months.",
                "actions": [{
                    "type": "medication",
                    "description": "Continue Metformin 500mg twice daily",
                    "priority": "high",
                    "timeline": "ongoing",
                    "rationale": "Blood glucose management",
                }],
                "short_term_goals": ["Stabilise fasting glucose"],
                "long_term_goals": ["HbA1c below 7%"],
                "success_metrics": ["Quarterly HbA1c in range"],
                "patient_instructions": "Take medication with meals.",
                "educational_resources": ["Diabetes self-management guide"],
            }),
            model_used: "gpt-4-turbo-preview".into(),
            tokens_used: 1234,
            confidence_score: 1.0,
        })
    }

    async fn regenerate_section(
        &self,
        section: CarePlanSection,
        _existing_plan: &Value,
        _additional_context: Option<&str>,
    ) -> Result<Value, GenerationError> {
        Ok(json!({ section.as_str(): "Regenerated clinical summary." }))
    }

    async fn validate_care_plan(&self, _plan: &Value) -> Result<SafetyReport, GenerationError> {
        Ok(SafetyReport::default())
    }
}

/// Scripted generator that sleeps first, leaving a window for other
/// operations on the plan while generation is in flight.
struct SlowGenerator {
    delay: Duration,
}

#[async_trait]
impl DraftGenerator for SlowGenerator {
    async fn generate_care_plan(
        &self,
        intake: &PatientIntake,
        ehr: Option<&EhrRecord>,
        guidelines: &[Guideline],
    ) -> Result<GenerationOutcome, GenerationError> {
        tokio::time::sleep(self.delay).await;
        ScriptedGenerator.generate_care_plan(intake, ehr, guidelines).await
    }

    async fn regenerate_section(
        &self,
        section: CarePlanSection,
        existing_plan: &Value,
        additional_context: Option<&str>,
    ) -> Result<Value, GenerationError> {
        ScriptedGenerator
            .regenerate_section(section, existing_plan, additional_context)
            .await
    }

    async fn validate_care_plan(&self, plan: &Value) -> Result<SafetyReport, GenerationError> {
        ScriptedGenerator.validate_care_plan(plan).await
    }
}

struct FailingDelivery;

#[async_trait]
impl PatientDelivery for FailingDelivery {
    async fn deliver(
        &self,
        _patient_id: &str,
        _plan: &PatientFacingPlan,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        Err(DeliveryError::Transport("portal unreachable".into()))
    }
}

struct Harness {
    intake: Arc<IntakeService>,
    orchestrator: CarePlanOrchestrator,
    review: ReviewService,
    plans: Arc<dyn CarePlanRepository>,
    audit: Arc<RecordingAuditSink>,
}

fn harness(generator: Arc<dyn DraftGenerator>, delivery: Arc<dyn PatientDelivery>) -> Harness {
    let plans: Arc<dyn CarePlanRepository> = Arc::new(InMemoryCarePlans::new());
    let locks = Arc::new(PlanLocks::new());
    let audit = Arc::new(RecordingAuditSink::new());
    let audit_sink: Arc<dyn AuditSink> = audit.clone();
    let intake = Arc::new(IntakeService::new(
        Arc::new(InMemoryIntakes::new()),
        Arc::clone(&audit_sink),
    ));

    let orchestrator = CarePlanOrchestrator::new(
        Arc::clone(&intake),
        Arc::new(StaticEhrGateway::new()),
        Arc::new(BagOfWordsEmbedder::new(64)),
        Arc::new(InMemoryGuidelineIndex::new(64)),
        generator,
        Arc::clone(&plans),
        Arc::clone(&locks),
        Arc::clone(&audit_sink),
        CoreConfig::new(
            Duration::from_secs(5),
            Duration::from_secs(2),
            5,
            0.7,
        )
        .expect("config"),
    );

    let review = ReviewService::new(
        Arc::clone(&plans),
        locks,
        delivery,
        audit_sink,
    );

    Harness {
        intake,
        orchestrator,
        review,
        plans,
        audit,
    }
}

fn diabetes_intake(patient_id: &str) -> PatientIntake {
    PatientIntake {
        patient_id: patient_id.into(),
        intake_date: Utc::now(),
        age: 54,
        gender: "F".into(),
        weight_kg: Some(82.0),
        height_cm: Some(165.0),
        chief_complaint: "elevated blood sugar, diabetes follow-up".into(),
        symptoms: vec![Symptom {
            description: "increased thirst".into(),
            severity: 4,
            duration_days: Some(21),
            onset_date: None,
        }],
        medical_history: vec![MedicalHistoryEntry {
            condition: "Type 2 diabetes".into(),
            status: ConditionStatus::Chronic,
            diagnosis_date: None,
            notes: None,
        }],
        family_history: vec!["Father: coronary artery disease".into()],
        allergies: vec!["penicillin".into()],
        current_medications: vec![Medication {
            name: "Metformin".into(),
            dosage: "500mg".into(),
            frequency: "twice daily".into(),
            start_date: None,
            prescribing_physician: None,
            active: true,
        }],
        smoking_status: Some("never".into()),
        alcohol_consumption: None,
        exercise_frequency: None,
        additional_notes: None,
    }
}

fn approved_review(reviewer: &str) -> ReviewRequest {
    ReviewRequest {
        reviewer_id: reviewer.into(),
        reviewer_name: reviewer.into(),
        status: ReviewVerdict::Approved,
        comments: None,
        modifications: vec![],
    }
}

#[tokio::test]
async fn generation_falls_back_when_llm_unavailable() {
    let h = harness(Arc::new(OfflineGenerator), Arc::new(PortalDelivery));
    h.intake.submit_intake(diabetes_intake("patient001")).await.unwrap();

    let receipt = h.orchestrator.generate_draft("patient001", false).await.unwrap();
    assert!(receipt.careplan_id.starts_with("cp_patient001_"));
    assert_eq!(receipt.model_used, "fallback_template");

    let plan = h.plans.get(&receipt.careplan_id).await.unwrap().unwrap();
    assert_eq!(plan.status, CarePlanStatus::Draft);
    assert_eq!(plan.version, 1);
    assert!(plan
        .actions
        .iter()
        .any(|a| a.description.to_lowercase().contains("glucose")));
}

#[tokio::test]
async fn generation_requires_intake() {
    let h = harness(Arc::new(ScriptedGenerator), Arc::new(PortalDelivery));
    let err = h.orchestrator.generate_draft("patient999", false).await.unwrap_err();
    assert!(matches!(err, CareError::NotFound(_)));
}

#[tokio::test]
async fn generation_rejects_incomplete_intake() {
    let h = harness(Arc::new(ScriptedGenerator), Arc::new(PortalDelivery));
    let mut intake = diabetes_intake("patient002");
    intake.symptoms.clear();
    intake.medical_history.clear();
    intake.allergies.clear();
    intake.family_history.clear();
    h.intake.submit_intake(intake).await.unwrap();

    let err = h.orchestrator.generate_draft("patient002", false).await.unwrap_err();
    assert!(matches!(err, CareError::Validation(_)));
}

#[tokio::test]
async fn repeated_generation_is_idempotent_until_forced() {
    let h = harness(Arc::new(ScriptedGenerator), Arc::new(PortalDelivery));
    h.intake.submit_intake(diabetes_intake("patient001")).await.unwrap();

    let first = h.orchestrator.generate_draft("patient001", false).await.unwrap();
    let second = h.orchestrator.generate_draft("patient001", false).await.unwrap();
    assert_eq!(first.careplan_id, second.careplan_id);

    let forced = h.orchestrator.generate_draft("patient001", true).await.unwrap();
    assert_eq!(forced.careplan_id, first.careplan_id);

    let plan = h.plans.get(&forced.careplan_id).await.unwrap().unwrap();
    assert_eq!(plan.version, 2);
    assert_eq!(plan.status, CarePlanStatus::Draft);
}

#[tokio::test]
async fn forced_regeneration_keeps_reviews_submitted_mid_flight() {
    let h = Arc::new(harness(
        Arc::new(SlowGenerator {
            delay: Duration::from_millis(200),
        }),
        Arc::new(PortalDelivery),
    ));
    h.intake.submit_intake(diabetes_intake("patient001")).await.unwrap();
    let draft = h.orchestrator.generate_draft("patient001", false).await.unwrap();
    let id = draft.careplan_id.clone();

    // Start a forced regeneration, then land a review while its generation
    // call is still sleeping.
    let forced = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.orchestrator.generate_draft("patient001", true).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let receipt = h.review.submit_review(&id, approved_review("dr_chen")).await.unwrap();
    assert_eq!(receipt.version, 2);

    forced.await.unwrap().unwrap();

    // The replacement kept the review trail and built on the reviewed
    // version instead of the pre-generation snapshot.
    let plan = h.plans.get(&id).await.unwrap().unwrap();
    assert_eq!(plan.clinician_reviews.len(), 1);
    assert_eq!(plan.clinician_reviews[0].reviewer_id, "dr_chen");
    assert_eq!(plan.version, 3);
    assert_eq!(plan.status, CarePlanStatus::Draft);
}

#[tokio::test]
async fn full_review_and_delivery_cycle() {
    let h = harness(Arc::new(ScriptedGenerator), Arc::new(PortalDelivery));
    h.intake.submit_intake(diabetes_intake("patient001")).await.unwrap();

    let draft = h.orchestrator.generate_draft("patient001", false).await.unwrap();
    let id = draft.careplan_id.as_str();

    // Reviewer asks for a revision with one concrete edit.
    let revision = ReviewRequest {
        reviewer_id: "dr_chen".into(),
        reviewer_name: "Dr. Chen".into(),
        status: ReviewVerdict::NeedsRevision,
        comments: Some("Tighten the summary.".into()),
        modifications: vec![Modification {
            field: "clinical_summary".into(),
            operation: ModificationOp::Replace,
            new_value: json!("Glucose control deteriorating despite Metformin."),
        }],
    };
    let receipt = h.review.submit_review(id, revision).await.unwrap();
    assert_eq!(receipt.status, CarePlanStatus::UnderReview);
    assert_eq!(receipt.version, 2);
    assert_eq!(receipt.modifications_applied, 1);

    // A second reviewer approves, then sign-off and delivery.
    let receipt = h.review.submit_review(id, approved_review("dr_patel")).await.unwrap();
    assert_eq!(receipt.status, CarePlanStatus::Approved);
    assert_eq!(receipt.version, 3);

    let approval = h
        .review
        .approve_careplan(
            id,
            ApprovalRequest {
                approver_id: "dr_patel".into(),
                approver_name: "Dr. Patel".into(),
                final_comments: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(approval.version, 4);

    let outcome = h.review.send_to_patient(id).await.unwrap();
    assert_eq!(outcome.status, CarePlanStatus::SentToPatient);
    assert_eq!(outcome.version, 5);

    // Versions only ever moved up, and the audit trail covers each step.
    assert_eq!(
        h.audit.actions(),
        vec![
            "intake_submitted",
            "careplan_generated",
            "review_submitted",
            "review_submitted",
            "careplan_approved",
            "careplan_sent",
        ]
    );

    // Nothing further is reviewable after the send.
    let err = h.review.submit_review(id, approved_review("dr_chen")).await.unwrap_err();
    assert!(matches!(err, CareError::InvalidState { .. }));
}

#[tokio::test]
async fn rejected_review_restarts_the_cycle() {
    let h = harness(Arc::new(ScriptedGenerator), Arc::new(PortalDelivery));
    h.intake.submit_intake(diabetes_intake("patient001")).await.unwrap();
    let draft = h.orchestrator.generate_draft("patient001", false).await.unwrap();

    let mut rejection = approved_review("dr_chen");
    rejection.status = ReviewVerdict::Rejected;
    let receipt = h.review.submit_review(&draft.careplan_id, rejection).await.unwrap();
    assert_eq!(receipt.status, CarePlanStatus::Draft);
    assert_eq!(receipt.review_count, 1);

    // The rejected plan can be reviewed again from draft.
    let receipt = h
        .review
        .submit_review(&draft.careplan_id, approved_review("dr_patel"))
        .await
        .unwrap();
    assert_eq!(receipt.status, CarePlanStatus::Approved);
    assert_eq!(receipt.review_count, 2);
}

#[tokio::test]
async fn delivery_failure_keeps_plan_approved_for_retry() {
    let h = harness(Arc::new(ScriptedGenerator), Arc::new(FailingDelivery));
    h.intake.submit_intake(diabetes_intake("patient001")).await.unwrap();
    let draft = h.orchestrator.generate_draft("patient001", false).await.unwrap();
    let id = draft.careplan_id.as_str();

    h.review.submit_review(id, approved_review("dr_chen")).await.unwrap();
    let err = h.review.send_to_patient(id).await.unwrap_err();
    assert!(matches!(err, CareError::Delivery(_)));

    let plan = h.plans.get(id).await.unwrap().unwrap();
    assert_eq!(plan.status, CarePlanStatus::Approved);
}

#[tokio::test]
async fn section_regeneration_bumps_version_in_place() {
    let h = harness(Arc::new(ScriptedGenerator), Arc::new(PortalDelivery));
    h.intake.submit_intake(diabetes_intake("patient001")).await.unwrap();
    let draft = h.orchestrator.generate_draft("patient001", false).await.unwrap();

    let receipt = h
        .orchestrator
        .regenerate_section(&draft.careplan_id, CarePlanSection::ClinicalSummary, None)
        .await
        .unwrap();
    assert_eq!(receipt.updated_section, CarePlanSection::ClinicalSummary);
    assert_eq!(receipt.version, 2);

    let plan = h.plans.get(&draft.careplan_id).await.unwrap().unwrap();
    assert_eq!(plan.clinical_summary, "Regenerated clinical summary.");
    assert_eq!(plan.version, 2);
}

#[tokio::test]
async fn safety_check_reports_on_stored_plan() {
    let h = harness(Arc::new(ScriptedGenerator), Arc::new(PortalDelivery));
    h.intake.submit_intake(diabetes_intake("patient001")).await.unwrap();
    let draft = h.orchestrator.generate_draft("patient001", false).await.unwrap();

    let report = h.orchestrator.safety_check(&draft.careplan_id).await.unwrap();
    assert!(report.contraindications.is_empty());

    let err = h.orchestrator.safety_check("cp_missing").await.unwrap_err();
    assert!(matches!(err, CareError::NotFound(_)));
}
