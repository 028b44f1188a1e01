//! Demonstration binary for the carepath workflow.
//!
//! Wires the in-memory collaborators together and walks one patient through
//! the full cycle: intake, draft generation, clinician review, approval and
//! patient delivery. With `OPENAI_API_KEY` set, drafts come from the
//! configured model; without it, generation runs against an offline stub and
//! the rule-based fallback produces the draft.
//!
//! # Environment Variables
//! - `OPENAI_API_KEY`: API key for the chat-completions endpoint (optional)
//! - `OPENAI_BASE_URL`: endpoint base URL (default: "https://api.openai.com")
//! - `CAREPATH_MODEL`: model name (default: "gpt-4-turbo-preview")

use std::sync::Arc;

use anyhow::Context;
use carepath_core::{
    ApprovalRequest, AuditSink, BagOfWordsEmbedder, CarePlanOrchestrator, CarePlanRepository,
    CoreConfig, InMemoryCarePlans, InMemoryGuidelineIndex, InMemoryIntakes, IntakeService,
    PlanLocks, PortalDelivery, QueryEmbedder, ReviewRequest, ReviewService, StaticEhrGateway,
    TracingAuditSink,
};
use carepath_llm::{DraftGenerator, GenerationError, GenerationOutcome, OpenAiGenerator, SafetyReport};
use carepath_types::{
    CarePlanSection, ConditionStatus, Diagnosis, DiagnosisStatus, EhrRecord, Guideline,
    MedicalHistoryEntry, Medication, Modification, ModificationOp, PatientIntake, ReviewVerdict,
    Symptom,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stand-in generator used when no API key is configured; every call fails
/// so the orchestrator exercises its fallback path.
struct OfflineGenerator;

#[async_trait::async_trait]
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

const EMBEDDING_DIMENSION: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carepath=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::default();

    let generator: Arc<dyn DraftGenerator> = match std::env::var("OPENAI_API_KEY") {
        Ok(api_key) if !api_key.is_empty() => {
            let base_url = std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".into());
            let model = std::env::var("CAREPATH_MODEL")
                .unwrap_or_else(|_| "gpt-4-turbo-preview".into());
            tracing::info!(%model, "using chat-completions generator");
            Arc::new(
                OpenAiGenerator::new(base_url, api_key, model, config.llm_timeout())
                    .context("failed to build LLM client")?,
            )
        }
        _ => {
            tracing::info!("OPENAI_API_KEY not set, drafts will use the rule-based fallback");
            Arc::new(OfflineGenerator)
        }
    };

    let plans: Arc<dyn CarePlanRepository> = Arc::new(InMemoryCarePlans::new());
    let locks = Arc::new(PlanLocks::new());
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let intake = Arc::new(IntakeService::new(
        Arc::new(InMemoryIntakes::new()),
        Arc::clone(&audit),
    ));

    let embedder = Arc::new(BagOfWordsEmbedder::new(EMBEDDING_DIMENSION));
    let guidelines = Arc::new(InMemoryGuidelineIndex::new(EMBEDDING_DIMENSION));
    seed_guidelines(&embedder, &guidelines).await?;

    let ehr = Arc::new(StaticEhrGateway::new());
    ehr.insert(sample_ehr_record()).await;

    let orchestrator = CarePlanOrchestrator::new(
        Arc::clone(&intake),
        ehr,
        embedder,
        guidelines,
        generator,
        Arc::clone(&plans),
        Arc::clone(&locks),
        Arc::clone(&audit),
        config,
    );

    let review = ReviewService::new(
        Arc::clone(&plans),
        locks,
        Arc::new(PortalDelivery),
        audit,
    );

    // 1. Intake
    let receipt = intake.submit_intake(sample_intake()).await?;
    tracing::info!(intake_id = %receipt.intake_id, "intake submitted");

    let completeness = intake.validate_completeness("patient001").await?;
    tracing::info!(
        score = completeness.completeness_score,
        complete = completeness.is_complete,
        "intake completeness"
    );

    // 2. Draft generation
    let draft = orchestrator.generate_draft("patient001", false).await?;
    tracing::info!(
        careplan_id = %draft.careplan_id,
        model = %draft.model_used,
        confidence = draft.confidence_score,
        "draft generated"
    );

    // 3. Review cycle: revision with one edit, then approval.
    let revision = review
        .submit_review(
            &draft.careplan_id,
            ReviewRequest {
                reviewer_id: "dr_chen".into(),
                reviewer_name: "Dr. Chen".into(),
                status: ReviewVerdict::NeedsRevision,
                comments: Some("Summary needs the medication context.".into()),
                modifications: vec![Modification {
                    field: "clinical_summary".into(),
                    operation: ModificationOp::Replace,
                    new_value: json!(
                        "Glucose control deteriorating despite Metformin 500mg twice daily."
                    ),
                }],
            },
        )
        .await?;
    tracing::info!(
        status = %revision.status,
        applied = revision.modifications_applied,
        "revision review recorded"
    );

    let approval = review
        .approve_careplan(
            &draft.careplan_id,
            ApprovalRequest {
                approver_id: "dr_patel".into(),
                approver_name: "Dr. Patel".into(),
                final_comments: Some("Revised summary accepted.".into()),
            },
        )
        .await?;
    tracing::info!(version = approval.version, "care plan approved");

    // 4. Delivery
    let outcome = review.send_to_patient(&draft.careplan_id).await?;
    tracing::info!(
        confirmation_id = %outcome.receipt.confirmation_id,
        status = %outcome.status,
        "care plan delivered"
    );

    let history = review.get_review_history(&draft.careplan_id).await?;
    tracing::info!(reviews = history.len(), "workflow complete");

    Ok(())
}

async fn seed_guidelines(
    embedder: &BagOfWordsEmbedder,
    index: &InMemoryGuidelineIndex,
) -> anyhow::Result<()> {
    let texts = [
        (
            "guideline_diabetes_t2",
            "Type 2 diabetes management: metformin first line, lifestyle modification, \
             HbA1c target below 7%, quarterly monitoring for most adults.",
        ),
        (
            "guideline_hypertension",
            "Hypertension treatment: ACE inhibitors or ARBs first line, sodium restriction, \
             target blood pressure below 130/80 mmHg.",
        ),
        (
            "guideline_lipids",
            "Lipid management in diabetic patients: moderate-intensity statin therapy for \
             adults aged 40-75 with diabetes.",
        ),
    ];

    for (id, content) in texts {
        let embedding = embedder.embed(content).await?;
        index
            .add(Guideline::new(id, content).with_embedding(embedding))
            .await?;
    }
    Ok(())
}

fn sample_intake() -> PatientIntake {
    PatientIntake {
        patient_id: "patient001".into(),
        intake_date: Utc::now(),
        age: 54,
        gender: "F".into(),
        weight_kg: Some(82.0),
        height_cm: Some(165.0),
        chief_complaint: "elevated blood sugar, diabetes follow-up".into(),
        symptoms: vec![
            Symptom {
                description: "increased thirst".into(),
                severity: 4,
                duration_days: Some(21),
                onset_date: None,
            },
            Symptom {
                description: "fatigue".into(),
                severity: 3,
                duration_days: Some(30),
                onset_date: None,
            },
        ],
        medical_history: vec![MedicalHistoryEntry {
            condition: "Type 2 diabetes".into(),
            status: ConditionStatus::Chronic,
            diagnosis_date: None,
            notes: Some("Diagnosed 2019".into()),
        }],
        family_history: vec!["Father: coronary artery disease".into()],
        allergies: vec!["penicillin".into()],
        current_medications: vec![Medication {
            name: "Metformin".into(),
            dosage: "500mg".into(),
            frequency: "twice daily".into(),
            start_date: None,
            prescribing_physician: Some("Dr. Chen".into()),
            active: true,
        }],
        smoking_status: Some("never".into()),
        alcohol_consumption: Some("occasional".into()),
        exercise_frequency: Some("1-2 times per week".into()),
        additional_notes: None,
    }
}

fn sample_ehr_record() -> EhrRecord {
    EhrRecord {
        patient_id: "patient001".into(),
        record_id: "ehr_patient001".into(),
        last_updated: Utc::now(),
        mrn: Some("MRN-448291".into()),
        date_of_birth: None,
        gender: Some("F".into()),
        diagnoses: vec![Diagnosis {
            icd_10_code: Some("E11.9".into()),
            description: "Type 2 diabetes mellitus without complications".into(),
            diagnosis_date: Utc::now() - chrono::Duration::days(365 * 5),
            status: DiagnosisStatus::Primary,
            provider: Some("Dr. Chen".into()),
        }],
        procedures: vec![],
        lab_results: vec![],
        vital_signs: vec![],
    }
}
