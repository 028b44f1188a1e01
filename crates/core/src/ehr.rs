//! EHR gateway seam.
//!
//! The gateway is an external collaborator (Epic, Cerner, ...). Transient
//! failures and timeouts are typed here; the orchestrator logs them and
//! proceeds as if no EHR data exists.

use std::collections::HashMap;

use async_trait::async_trait;
use carepath_types::EhrRecord;
use tokio::sync::RwLock;

/// Errors raised by an EHR fetch.
#[derive(Debug, thiserror::Error)]
pub enum EhrError {
    #[error("ehr transport error: {0}")]
    Transport(String),

    #[error("ehr fetch timed out")]
    Timeout,

    #[error("no ehr record for patient {0}")]
    NotFound(String),
}

/// Fetches diagnoses, labs and vitals for a patient.
///
/// Implementations with their own request deadline report it as
/// [`EhrError::Timeout`]; callers treat that like any other transient
/// failure and continue without EHR data.
#[async_trait]
pub trait EhrGateway: Send + Sync {
    async fn patient_record(&self, patient_id: &str) -> Result<EhrRecord, EhrError>;
}

/// In-memory gateway backed by pre-loaded records.
#[derive(Debug, Default)]
pub struct StaticEhrGateway {
    records: RwLock<HashMap<String, EhrRecord>>,
}

impl StaticEhrGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: EhrRecord) {
        self.records
            .write()
            .await
            .insert(record.patient_id.clone(), record);
    }
}

#[async_trait]
impl EhrGateway for StaticEhrGateway {
    async fn patient_record(&self, patient_id: &str) -> Result<EhrRecord, EhrError> {
        self.records
            .read()
            .await
            .get(patient_id)
            .cloned()
            .ok_or_else(|| EhrError::NotFound(patient_id.to_owned()))
    }
}
