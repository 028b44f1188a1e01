//! Patient delivery seam and patient-facing formatting.
//!
//! The delivery channel (patient portal, email) is an external
//! collaborator. Formatting renames clinical fields to patient-friendly
//! labels while keeping the original ordering of actions and goals.

use async_trait::async_trait;
use carepath_types::CarePlan;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Errors raised by patient delivery.
///
/// A failed delivery is surfaced to the caller; the plan stays `approved`.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("delivery transport error: {0}")]
    Transport(String),
}

/// Confirmation returned by a successful delivery.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReceipt {
    pub method: String,
    pub confirmation_id: String,
    pub delivered_at: DateTime<Utc>,
}

/// One actionable item in the patient-facing view.
#[derive(Debug, Clone, Serialize)]
pub struct PatientAction {
    pub action: String,
    pub priority: String,
    pub when: String,
    pub why: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientGoals {
    pub short_term: Vec<String>,
    pub long_term: Vec<String>,
}

/// Simplified care plan formatted for patient consumption.
#[derive(Debug, Clone, Serialize)]
pub struct PatientFacingPlan {
    pub summary: String,
    pub primary_condition: String,
    pub what_you_need_to_do: Vec<PatientAction>,
    pub your_goals: PatientGoals,
    pub how_we_measure_success: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub helpful_resources: Vec<String>,
    pub care_plan_date: String,
}

impl PatientFacingPlan {
    /// Builds the patient view from an approved plan, preserving ordering.
    pub fn from_care_plan(plan: &CarePlan) -> Self {
        Self {
            summary: plan.clinical_summary.clone(),
            primary_condition: plan.primary_diagnosis.clone(),
            what_you_need_to_do: plan
                .actions
                .iter()
                .map(|action| PatientAction {
                    action: action.description.clone(),
                    priority: enum_label(&action.priority),
                    when: action.timeline.clone(),
                    why: action.rationale.clone(),
                })
                .collect(),
            your_goals: PatientGoals {
                short_term: plan.short_term_goals.clone(),
                long_term: plan.long_term_goals.clone(),
            },
            how_we_measure_success: plan.success_metrics.clone(),
            instructions: plan.patient_instructions.clone(),
            helpful_resources: plan.educational_resources.clone(),
            care_plan_date: plan.created_date.format("%B %d, %Y").to_string(),
        }
    }
}

fn enum_label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

/// Delivers a formatted plan to the patient.
#[async_trait]
pub trait PatientDelivery: Send + Sync {
    async fn deliver(
        &self,
        patient_id: &str,
        plan: &PatientFacingPlan,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Development delivery channel standing in for the patient portal.
#[derive(Debug, Default, Clone)]
pub struct PortalDelivery;

#[async_trait]
impl PatientDelivery for PortalDelivery {
    async fn deliver(
        &self,
        patient_id: &str,
        _plan: &PatientFacingPlan,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        Ok(DeliveryReceipt {
            method: "patient_portal".to_owned(),
            confirmation_id: format!("delivery_{}_{}", patient_id, Uuid::new_v4().simple()),
            delivered_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carepath_types::{
        ActionPriority, ActionType, CarePlanAction, CarePlanStatus, ConfidenceScore,
    };

    fn sample_plan() -> CarePlan {
        let now = Utc::now();
        CarePlan {
            careplan_id: "cp_patient001_1700000000".into(),
            patient_id: "patient001".into(),
            created_date: now,
            last_modified: now,
            status: CarePlanStatus::Approved,
            version: 3,
            primary_diagnosis: "Essential hypertension".into(),
            secondary_diagnoses: vec![],
            chief_complaint: "high blood pressure".into(),
            clinical_summary: "Elevated readings over three visits.".into(),
            actions: vec![
                CarePlanAction {
                    action_id: "a0".into(),
                    action_type: ActionType::Medication,
                    description: "Start Lisinopril 10mg daily".into(),
                    priority: ActionPriority::High,
                    timeline: "immediately".into(),
                    rationale: "First-line treatment".into(),
                    evidence_source: None,
                    contraindications: vec![],
                },
                CarePlanAction {
                    action_id: "a1".into(),
                    action_type: ActionType::Monitoring,
                    description: "Home blood pressure log twice daily".into(),
                    priority: ActionPriority::Medium,
                    timeline: "daily".into(),
                    rationale: "Track treatment response".into(),
                    evidence_source: None,
                    contraindications: vec![],
                },
            ],
            short_term_goals: vec!["BP below 140/90".into()],
            long_term_goals: vec!["BP below 130/80".into()],
            success_metrics: vec!["Readings in range for 4 weeks".into()],
            clinician_reviews: vec![],
            final_approver: Some("dr_chen".into()),
            approval_date: Some(now),
            patient_instructions: Some("Take medication each morning.".into()),
            educational_resources: vec!["Understanding blood pressure".into()],
            llm_model_used: None,
            generation_timestamp: None,
            confidence_score: ConfidenceScore::new(0.75).ok(),
        }
    }

    #[test]
    fn patient_view_uses_friendly_labels_and_keeps_order() {
        let view = PatientFacingPlan::from_care_plan(&sample_plan());
        assert_eq!(view.primary_condition, "Essential hypertension");
        assert_eq!(view.what_you_need_to_do.len(), 2);
        assert_eq!(view.what_you_need_to_do[0].action, "Start Lisinopril 10mg daily");
        assert_eq!(view.what_you_need_to_do[0].priority, "high");
        assert_eq!(view.what_you_need_to_do[1].when, "daily");

        let json = serde_json::to_value(&view).expect("serialize");
        assert!(json.get("what_you_need_to_do").is_some());
        assert!(json.get("clinical_summary").is_none());
    }

    #[tokio::test]
    async fn portal_delivery_returns_confirmation() {
        let receipt = PortalDelivery
            .deliver("patient001", &PatientFacingPlan::from_care_plan(&sample_plan()))
            .await
            .expect("deliver");
        assert_eq!(receipt.method, "patient_portal");
        assert!(receipt.confirmation_id.starts_with("delivery_patient001_"));
    }
}
