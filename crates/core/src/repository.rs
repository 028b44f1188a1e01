//! Injected storage abstraction.
//!
//! Care plans and intakes are reached only through these traits so a real
//! datastore can be substituted without touching the workflow code. The
//! in-memory implementations back the binary and the tests; seeding happens
//! through the same `put` path as regular writes - there is no secondary
//! fixture lookup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use carepath_types::{CarePlan, PatientIntake};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::CareResult;

/// Storage for care-plan documents, keyed by `careplan_id`.
#[async_trait]
pub trait CarePlanRepository: Send + Sync {
    async fn get(&self, careplan_id: &str) -> CareResult<Option<CarePlan>>;

    /// Inserts or replaces the plan under its `careplan_id`.
    async fn put(&self, plan: CarePlan) -> CareResult<()>;

    /// Most recently created plan for a patient, if any.
    async fn find_by_patient(&self, patient_id: &str) -> CareResult<Option<CarePlan>>;

    async fn list(&self) -> CareResult<Vec<CarePlan>>;
}

/// Storage for submitted intakes, keyed by derived `intake_id`.
#[async_trait]
pub trait IntakeRepository: Send + Sync {
    /// Most recently submitted intake for a patient, if any.
    async fn latest_for_patient(&self, patient_id: &str) -> CareResult<Option<PatientIntake>>;

    async fn put(&self, intake_id: String, intake: PatientIntake) -> CareResult<()>;

    /// All submissions for a patient in insertion order, with their ids.
    async fn history_for_patient(
        &self,
        patient_id: &str,
    ) -> CareResult<Vec<(String, PatientIntake)>>;
}

/// In-memory care-plan repository.
#[derive(Debug, Default)]
pub struct InMemoryCarePlans {
    plans: RwLock<HashMap<String, CarePlan>>,
}

impl InMemoryCarePlans {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CarePlanRepository for InMemoryCarePlans {
    async fn get(&self, careplan_id: &str) -> CareResult<Option<CarePlan>> {
        Ok(self.plans.read().await.get(careplan_id).cloned())
    }

    async fn put(&self, plan: CarePlan) -> CareResult<()> {
        self.plans
            .write()
            .await
            .insert(plan.careplan_id.clone(), plan);
        Ok(())
    }

    async fn find_by_patient(&self, patient_id: &str) -> CareResult<Option<CarePlan>> {
        Ok(self
            .plans
            .read()
            .await
            .values()
            .filter(|plan| plan.patient_id == patient_id)
            .max_by_key(|plan| plan.created_date)
            .cloned())
    }

    async fn list(&self) -> CareResult<Vec<CarePlan>> {
        let mut plans: Vec<CarePlan> = self.plans.read().await.values().cloned().collect();
        plans.sort_by_key(|plan| plan.created_date);
        Ok(plans)
    }
}

/// In-memory intake repository. Submissions are kept in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryIntakes {
    intakes: RwLock<Vec<(String, PatientIntake)>>,
}

impl InMemoryIntakes {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntakeRepository for InMemoryIntakes {
    async fn latest_for_patient(&self, patient_id: &str) -> CareResult<Option<PatientIntake>> {
        Ok(self
            .intakes
            .read()
            .await
            .iter()
            .rev()
            .find(|(_, intake)| intake.patient_id == patient_id)
            .map(|(_, intake)| intake.clone()))
    }

    async fn put(&self, intake_id: String, intake: PatientIntake) -> CareResult<()> {
        self.intakes.write().await.push((intake_id, intake));
        Ok(())
    }

    async fn history_for_patient(
        &self,
        patient_id: &str,
    ) -> CareResult<Vec<(String, PatientIntake)>> {
        Ok(self
            .intakes
            .read()
            .await
            .iter()
            .filter(|(_, intake)| intake.patient_id == patient_id)
            .cloned()
            .collect())
    }
}

/// Per-care-plan mutation locks.
///
/// Guarantees at-most-one concurrent mutation per `careplan_id`: every
/// read-modify-write in the review service and section regeneration holds
/// the plan's lock for the duration, so concurrent calls on the same id
/// cannot interleave partial writes.
#[derive(Debug, Default)]
pub struct PlanLocks {
    inner: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PlanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for one care plan, creating it on first use.
    pub async fn acquire(&self, careplan_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(
                map.entry(careplan_id.to_owned())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carepath_types::{CarePlanStatus, ConfidenceScore};
    use chrono::Utc;

    fn plan(careplan_id: &str, patient_id: &str) -> CarePlan {
        let now = Utc::now();
        CarePlan {
            careplan_id: careplan_id.into(),
            patient_id: patient_id.into(),
            created_date: now,
            last_modified: now,
            status: CarePlanStatus::Draft,
            version: 1,
            primary_diagnosis: "Hypertension".into(),
            secondary_diagnoses: vec![],
            chief_complaint: "high blood pressure".into(),
            clinical_summary: "summary".into(),
            actions: vec![],
            short_term_goals: vec![],
            long_term_goals: vec![],
            success_metrics: vec![],
            clinician_reviews: vec![],
            final_approver: None,
            approval_date: None,
            patient_instructions: None,
            educational_resources: vec![],
            llm_model_used: None,
            generation_timestamp: None,
            confidence_score: ConfidenceScore::new(0.5).ok(),
        }
    }

    #[tokio::test]
    async fn find_by_patient_returns_most_recent() {
        let repo = InMemoryCarePlans::new();
        let older = plan("cp_a", "patient001");
        let mut newer = plan("cp_b", "patient001");
        newer.created_date = older.created_date + chrono::Duration::seconds(5);
        repo.put(older).await.unwrap();
        repo.put(newer.clone()).await.unwrap();

        let found = repo.find_by_patient("patient001").await.unwrap().unwrap();
        assert_eq!(found.careplan_id, "cp_b");
        assert!(repo.find_by_patient("patient999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn plan_locks_serialise_mutations() {
        let locks = Arc::new(PlanLocks::new());
        let counter = Arc::new(std::sync::Mutex::new(0u32));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("cp_a").await;
                let current = *counter.lock().unwrap();
                tokio::task::yield_now().await;
                *counter.lock().unwrap() = current + 1;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*counter.lock().unwrap(), 8);
    }
}
