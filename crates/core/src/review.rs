//! Clinician review and approval workflow.
//!
//! The review service owns every status transition after draft creation.
//! Reviews are append-only; a plan is never physically deleted and its
//! version counter increases on every accepted mutation. All read-modify-
//! write sequences run under the plan's mutation lock.

use std::sync::Arc;

use carepath_types::{
    CarePlan, CarePlanStatus, ClinicianReview, Modification, ReviewVerdict,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditEvent, AuditSink};
use crate::delivery::{DeliveryReceipt, PatientDelivery, PatientFacingPlan};
use crate::error::{CareError, CareResult};
use crate::repository::{CarePlanRepository, PlanLocks};

/// One clinician's submitted review.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub reviewer_id: String,
    pub reviewer_name: String,
    pub status: ReviewVerdict,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub modifications: Vec<Modification>,
}

/// Final sign-off on a reviewed plan.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalRequest {
    pub approver_id: String,
    pub approver_name: String,
    #[serde(default)]
    pub final_comments: Option<String>,
}

/// Outcome of a submitted review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewReceipt {
    pub careplan_id: String,
    pub status: CarePlanStatus,
    pub version: u32,
    pub review_count: usize,
    pub modifications_applied: usize,
}

/// Outcome of final approval.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalReceipt {
    pub careplan_id: String,
    pub status: CarePlanStatus,
    pub version: u32,
    pub approved_by: String,
    pub approval_date: DateTime<Utc>,
}

/// Outcome of a successful patient delivery.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub careplan_id: String,
    pub status: CarePlanStatus,
    pub version: u32,
    pub receipt: DeliveryReceipt,
}

/// Summary of a plan awaiting clinician attention.
#[derive(Debug, Clone, Serialize)]
pub struct PendingReview {
    pub careplan_id: String,
    pub patient_id: String,
    pub status: CarePlanStatus,
    pub primary_diagnosis: String,
    pub created_date: DateTime<Utc>,
    pub version: u32,
    pub review_count: usize,
}

/// Drives the clinician review state machine over stored plans.
pub struct ReviewService {
    plans: Arc<dyn CarePlanRepository>,
    locks: Arc<PlanLocks>,
    delivery: Arc<dyn PatientDelivery>,
    audit: Arc<dyn AuditSink>,
}

impl ReviewService {
    pub fn new(
        plans: Arc<dyn CarePlanRepository>,
        locks: Arc<PlanLocks>,
        delivery: Arc<dyn PatientDelivery>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            plans,
            locks,
            delivery,
            audit,
        }
    }

    /// Records one clinician review and applies its verdict.
    ///
    /// Verdicts move the plan to `approved`, back to `draft` (rejected) or
    /// to `under_review` (needs revision, after applying the requested
    /// modifications). Plans already sent to the patient or beyond reject
    /// further reviews.
    pub async fn submit_review(
        &self,
        careplan_id: &str,
        request: ReviewRequest,
    ) -> CareResult<ReviewReceipt> {
        if request.reviewer_id.trim().is_empty() {
            return Err(CareError::validation("reviewer_id cannot be empty"));
        }

        let _guard = self.locks.acquire(careplan_id).await;
        let mut plan = self.load(careplan_id).await?;

        if !matches!(
            plan.status,
            CarePlanStatus::Draft | CarePlanStatus::UnderReview | CarePlanStatus::Approved
        ) {
            return Err(CareError::InvalidState {
                operation: "submit_review",
                status: plan.status,
            });
        }

        plan.clinician_reviews.push(ClinicianReview {
            reviewer_id: request.reviewer_id.clone(),
            reviewer_name: request.reviewer_name,
            review_date: Utc::now(),
            status: request.status,
            comments: request.comments,
            modifications: request.modifications.clone(),
        });

        // Modifications apply regardless of verdict: a rejecting reviewer's
        // edits still land on the draft the next reviewer sees.
        let mut modifications_applied = 0;
        for modification in &request.modifications {
            if plan.apply_modification(modification) {
                modifications_applied += 1;
            }
        }

        plan.status = match request.status {
            ReviewVerdict::Approved => CarePlanStatus::Approved,
            ReviewVerdict::NeedsRevision => CarePlanStatus::UnderReview,
            ReviewVerdict::Rejected => CarePlanStatus::Draft,
        };

        if modifications_applied < request.modifications.len() {
            tracing::debug!(
                careplan_id,
                requested = request.modifications.len(),
                applied = modifications_applied,
                "some requested modifications were skipped"
            );
        }

        plan.touch();
        self.plans.put(plan.clone()).await?;

        self.audit.record(
            AuditEvent::new("review_submitted")
                .patient(&plan.patient_id)
                .careplan(careplan_id)
                .actor(&request.reviewer_id)
                .details(json!({
                    "verdict": request.status,
                    "new_status": plan.status,
                    "modifications_requested": request.modifications.len(),
                    "modifications_applied": modifications_applied,
                    "version": plan.version,
                })),
        );

        Ok(ReviewReceipt {
            careplan_id: careplan_id.to_owned(),
            status: plan.status,
            version: plan.version,
            review_count: plan.clinician_reviews.len(),
            modifications_applied,
        })
    }

    /// Records final sign-off, moving the plan to `approved`.
    ///
    /// Allowed from `approved` (a reviewer already approved) or
    /// `under_review` (the approver accepts the revised plan directly).
    pub async fn approve_careplan(
        &self,
        careplan_id: &str,
        request: ApprovalRequest,
    ) -> CareResult<ApprovalReceipt> {
        if request.approver_id.trim().is_empty() {
            return Err(CareError::validation("approver_id cannot be empty"));
        }

        let _guard = self.locks.acquire(careplan_id).await;
        let mut plan = self.load(careplan_id).await?;

        if !matches!(
            plan.status,
            CarePlanStatus::Approved | CarePlanStatus::UnderReview
        ) {
            return Err(CareError::InvalidState {
                operation: "approve_careplan",
                status: plan.status,
            });
        }

        // Approval from under_review carries an implicit approved review so
        // the trail shows who accepted the revision.
        if plan.status == CarePlanStatus::UnderReview {
            plan.clinician_reviews.push(ClinicianReview {
                reviewer_id: request.approver_id.clone(),
                reviewer_name: request.approver_name.clone(),
                review_date: Utc::now(),
                status: ReviewVerdict::Approved,
                comments: request.final_comments.clone(),
                modifications: Vec::new(),
            });
        }

        let approval_date = Utc::now();
        plan.status = CarePlanStatus::Approved;
        plan.final_approver = Some(request.approver_id.clone());
        plan.approval_date = Some(approval_date);
        plan.touch();
        self.plans.put(plan.clone()).await?;

        self.audit.record(
            AuditEvent::new("careplan_approved")
                .patient(&plan.patient_id)
                .careplan(careplan_id)
                .actor(&request.approver_id)
                .details(json!({
                    "final_comments": request.final_comments,
                    "version": plan.version,
                })),
        );

        Ok(ApprovalReceipt {
            careplan_id: careplan_id.to_owned(),
            status: plan.status,
            version: plan.version,
            approved_by: request.approver_id,
            approval_date,
        })
    }

    /// Formats and delivers an approved plan to the patient.
    ///
    /// Only legal from `approved`; a second send is rejected the same way.
    /// A delivery failure propagates and the plan stays `approved`, so the
    /// caller may retry.
    pub async fn send_to_patient(&self, careplan_id: &str) -> CareResult<DeliveryOutcome> {
        let _guard = self.locks.acquire(careplan_id).await;
        let mut plan = self.load(careplan_id).await?;

        if plan.status != CarePlanStatus::Approved {
            return Err(CareError::InvalidState {
                operation: "send_to_patient",
                status: plan.status,
            });
        }

        let view = PatientFacingPlan::from_care_plan(&plan);
        let receipt = self.delivery.deliver(&plan.patient_id, &view).await?;

        plan.status = CarePlanStatus::SentToPatient;
        plan.touch();
        self.plans.put(plan.clone()).await?;

        self.audit.record(
            AuditEvent::new("careplan_sent")
                .patient(&plan.patient_id)
                .careplan(careplan_id)
                .details(json!({
                    "method": receipt.method,
                    "confirmation_id": receipt.confirmation_id,
                    "version": plan.version,
                })),
        );

        Ok(DeliveryOutcome {
            careplan_id: careplan_id.to_owned(),
            status: plan.status,
            version: plan.version,
            receipt,
        })
    }

    /// Review trail for a plan, ordered by review date ascending.
    ///
    /// Ordering is applied to the returned copy; stored reviews keep their
    /// submission order.
    pub async fn get_review_history(&self, careplan_id: &str) -> CareResult<Vec<ClinicianReview>> {
        let plan = self.load(careplan_id).await?;
        let mut history = plan.clinician_reviews;
        history.sort_by_key(|review| review.review_date);
        Ok(history)
    }

    /// All plans currently awaiting clinician attention.
    ///
    /// With a `reviewer_id`, plans that reviewer has already reviewed are
    /// excluded.
    pub async fn pending_reviews(
        &self,
        reviewer_id: Option<&str>,
    ) -> CareResult<Vec<PendingReview>> {
        Ok(self
            .plans
            .list()
            .await?
            .into_iter()
            .filter(|plan| {
                matches!(
                    plan.status,
                    CarePlanStatus::Draft | CarePlanStatus::UnderReview
                )
            })
            .filter(|plan| match reviewer_id {
                Some(reviewer) => !plan
                    .clinician_reviews
                    .iter()
                    .any(|review| review.reviewer_id == reviewer),
                None => true,
            })
            .map(|plan| PendingReview {
                careplan_id: plan.careplan_id,
                patient_id: plan.patient_id,
                status: plan.status,
                primary_diagnosis: plan.primary_diagnosis,
                created_date: plan.created_date,
                version: plan.version,
                review_count: plan.clinician_reviews.len(),
            })
            .collect())
    }

    async fn load(&self, careplan_id: &str) -> CareResult<CarePlan> {
        self.plans
            .get(careplan_id)
            .await?
            .ok_or_else(|| CareError::not_found(format!("care plan {careplan_id}")))
    }
}
