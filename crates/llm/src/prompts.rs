//! Prompt assembly and completeness scoring.
//!
//! Prompts are built in a fixed order (demographics, symptoms, history,
//! medications, EHR data, guidelines) so the same patient context always
//! yields the same prompt. Temperatures stay low; consistency matters more
//! than creativity in a medical draft.

use carepath_types::{CarePlanSection, EhrRecord, Guideline, PatientIntake};
use serde_json::Value;

/// How many recent EHR diagnoses and lab results to include.
const EHR_RECENT_LIMIT: usize = 5;

/// How many retrieved guidelines to include, by relevance.
const GUIDELINE_LIMIT: usize = 3;

/// How much guideline text to quote per guideline.
const GUIDELINE_EXCERPT_CHARS: usize = 200;

/// System prompt for full care-plan generation.
pub const SYSTEM_PROMPT: &str = r#"You are an expert clinical AI assistant that drafts personalised care plans for clinician review.

Analyse the patient intake, medical history and any EHR data provided, weigh the supplied clinical guidelines, and produce a comprehensive, evidence-based draft with concrete monitoring and follow-up steps.

Respond with a single JSON object containing exactly these sections:
- primary_diagnosis
- secondary_diagnoses
- clinical_summary
- actions (each with type, description, priority, timeline, rationale)
- short_term_goals
- long_term_goals
- success_metrics
- patient_instructions
- educational_resources

The output is a draft for clinician review, never final medical advice."#;

/// System prompt for the independent safety-validation pass.
pub const VALIDATION_SYSTEM_PROMPT: &str = r#"You are a medical safety validator. Review the care plan for:
1. Drug interactions and contraindications
2. Dosage appropriateness
3. Missing critical assessments
4. Safety concerns

Respond with a JSON object containing "contraindications", "missing_assessments" and "concerns" (each concern has "severity" and "description"), plus a boolean "safe_to_proceed"."#;

/// Builds the user prompt for full care-plan generation.
///
/// Ordering is deterministic: demographics, symptoms, history, medications,
/// EHR diagnoses and labs (most recent five each), then the top guidelines.
pub fn build_care_plan_prompt(
    intake: &PatientIntake,
    ehr: Option<&EhrRecord>,
    guidelines: &[Guideline],
) -> String {
    let mut parts = vec![
        "Generate a personalised care plan based on the following patient information:".to_owned(),
        String::new(),
        "PATIENT INTAKE DATA:".to_owned(),
        format!("Patient ID: {}", intake.patient_id),
        format!("Age: {}, Gender: {}", intake.age, intake.gender),
        format!("Chief Complaint: {}", intake.chief_complaint),
        String::new(),
    ];

    if !intake.symptoms.is_empty() {
        parts.push("SYMPTOMS:".to_owned());
        for symptom in &intake.symptoms {
            parts.push(format!(
                "- {} (severity: {}/10)",
                symptom.description, symptom.severity
            ));
        }
        parts.push(String::new());
    }

    if !intake.medical_history.is_empty() {
        parts.push("MEDICAL HISTORY:".to_owned());
        for entry in &intake.medical_history {
            parts.push(format!(
                "- {} ({})",
                entry.condition,
                serde_json::to_value(entry.status)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .unwrap_or_default()
            ));
        }
        parts.push(String::new());
    }

    if !intake.current_medications.is_empty() {
        parts.push("CURRENT MEDICATIONS:".to_owned());
        for medication in &intake.current_medications {
            parts.push(format!(
                "- {} {} {}",
                medication.name, medication.dosage, medication.frequency
            ));
        }
        parts.push(String::new());
    }

    if let Some(record) = ehr {
        parts.push("EHR DATA:".to_owned());
        if !record.diagnoses.is_empty() {
            parts.push("Recent Diagnoses:".to_owned());
            for diagnosis in recent(&record.diagnoses, EHR_RECENT_LIMIT) {
                parts.push(format!(
                    "- {} ({})",
                    diagnosis.description,
                    diagnosis.diagnosis_date.format("%Y-%m-%d")
                ));
            }
        }
        if !record.lab_results.is_empty() {
            parts.push("Recent Lab Results:".to_owned());
            for lab in recent(&record.lab_results, EHR_RECENT_LIMIT) {
                let status = lab
                    .status
                    .and_then(|s| serde_json::to_value(s).ok())
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .unwrap_or_else(|| "unreported".to_owned());
                parts.push(format!(
                    "- {}: {} {} ({})",
                    lab.test_name,
                    lab.value,
                    lab.unit.as_deref().unwrap_or(""),
                    status
                ));
            }
        }
        parts.push(String::new());
    }

    if !guidelines.is_empty() {
        parts.push("RELEVANT CLINICAL GUIDELINES:".to_owned());
        for guideline in guidelines.iter().take(GUIDELINE_LIMIT) {
            parts.push(format!("- {}...", excerpt(&guideline.content)));
        }
        parts.push(String::new());
    }

    parts.push("Please generate a comprehensive care plan in JSON format.".to_owned());
    parts.join("\n")
}

/// System prompt for regenerating a single section.
pub fn section_system_prompt(section: CarePlanSection) -> String {
    format!(
        "You are a clinical AI assistant refining a care plan. Regenerate the \
         '{section}' section while staying consistent with the rest of the plan."
    )
}

/// User prompt for regenerating a single section.
pub fn build_section_prompt(
    section: CarePlanSection,
    existing_plan: &Value,
    additional_context: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Current care plan: {}\n\nRegenerate only the '{section}' section.\n",
        serde_json::to_string_pretty(existing_plan).unwrap_or_else(|_| existing_plan.to_string()),
    );
    if let Some(context) = additional_context {
        prompt.push_str(&format!("Additional context: {context}\n"));
    }
    prompt.push_str("Return the updated section as a JSON object keyed by the section name.");
    prompt
}

/// User prompt for the safety-validation pass.
pub fn build_validation_prompt(plan: &Value) -> String {
    format!(
        "Care plan to validate: {}",
        serde_json::to_string_pretty(plan).unwrap_or_else(|_| plan.to_string())
    )
}

/// Completeness-based confidence score.
///
/// Score = (number of the 8 required sections present and non-empty) / 8.
/// This is a deterministic completeness proxy, reproduced exactly for
/// testability; it is not a model-confidence signal.
pub fn completeness_confidence(plan: &Value) -> f32 {
    let populated = CarePlanSection::ALL
        .iter()
        .filter(|section| section_populated(plan.get(section.as_str())))
        .count();
    populated as f32 / CarePlanSection::ALL.len() as f32
}

fn section_populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

fn recent<T>(items: &[T], limit: usize) -> &[T] {
    &items[items.len().saturating_sub(limit)..]
}

fn excerpt(content: &str) -> &str {
    match content.char_indices().nth(GUIDELINE_EXCERPT_CHARS) {
        Some((index, _)) => &content[..index],
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carepath_types::Symptom;
    use chrono::Utc;
    use serde_json::json;

    fn sample_intake() -> PatientIntake {
        PatientIntake {
            patient_id: "patient001".into(),
            intake_date: Utc::now(),
            age: 54,
            gender: "F".into(),
            weight_kg: None,
            height_cm: None,
            chief_complaint: "elevated blood sugar".into(),
            symptoms: vec![Symptom {
                description: "increased thirst".into(),
                severity: 4,
                duration_days: Some(21),
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
    fn prompt_sections_appear_in_fixed_order() {
        let prompt = build_care_plan_prompt(&sample_intake(), None, &[]);
        let intake_pos = prompt.find("PATIENT INTAKE DATA:").unwrap();
        let symptoms_pos = prompt.find("SYMPTOMS:").unwrap();
        assert!(intake_pos < symptoms_pos);
        assert!(prompt.contains("increased thirst (severity: 4/10)"));
        // Absent context contributes nothing.
        assert!(!prompt.contains("MEDICAL HISTORY:"));
        assert!(!prompt.contains("EHR DATA:"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let intake = sample_intake();
        assert_eq!(
            build_care_plan_prompt(&intake, None, &[]),
            build_care_plan_prompt(&intake, None, &[])
        );
    }

    #[test]
    fn guidelines_are_capped_at_three() {
        let guidelines: Vec<Guideline> = (0..5)
            .map(|i| Guideline::new(format!("g{i}"), format!("guideline text {i}")))
            .collect();
        let prompt = build_care_plan_prompt(&sample_intake(), None, &guidelines);
        assert!(prompt.contains("guideline text 2"));
        assert!(!prompt.contains("guideline text 3"));
    }

    #[test]
    fn confidence_counts_populated_sections() {
        let full = json!({
            "primary_diagnosis": "Type 2 Diabetes Mellitus",
            "clinical_summary": "summary",
            "actions": [{"type": "medication"}],
            "short_term_goals": ["goal"],
            "long_term_goals": ["goal"],
            "success_metrics": ["metric"],
            "patient_instructions": "instructions",
            "educational_resources": ["resource"],
        });
        assert_eq!(completeness_confidence(&full), 1.0);

        let partial = json!({
            "primary_diagnosis": "Type 2 Diabetes Mellitus",
            "clinical_summary": "",
            "actions": [],
            "short_term_goals": ["goal"],
        });
        assert_eq!(completeness_confidence(&partial), 2.0 / 8.0);

        assert_eq!(completeness_confidence(&json!({})), 0.0);
    }

    #[test]
    fn confidence_is_always_bounded() {
        let score = completeness_confidence(&json!({"primary_diagnosis": "x"}));
        assert!((0.0..=1.0).contains(&score));
    }
}
