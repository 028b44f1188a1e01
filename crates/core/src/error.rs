//! Core error taxonomy.

use carepath_llm::GenerationError;
use carepath_types::CarePlanStatus;

use crate::delivery::DeliveryError;

/// Errors surfaced by the core services.
///
/// Only [`CareError::Generation`] is recovered internally (the orchestrator
/// falls back to a rule-based template); every other variant propagates to
/// the boundary as a typed failure with no retry. Review actions are never
/// retried automatically - the clinician resubmits.
#[derive(Debug, thiserror::Error)]
pub enum CareError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{operation} is not allowed while the care plan is {status}")]
    InvalidState {
        operation: &'static str,
        status: CarePlanStatus,
    },

    #[error("care plan generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("patient delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("repository failure: {0}")]
    Repository(String),
}

pub type CareResult<T> = std::result::Result<T, CareError>;

impl CareError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        CareError::NotFound(what.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CareError::Validation(message.into())
    }
}
