//! # Carepath Types
//!
//! Shared domain model for the carepath care-plan system.
//!
//! This crate holds the serialisable aggregates exchanged between services:
//! patient intake, EHR records, retrieved guidelines and the central
//! [`CarePlan`] document, together with the closed vocabularies used by the
//! review workflow (sections, modification operations, statuses).
//!
//! **No service concerns**: orchestration, storage and collaborator seams
//! belong in `carepath-core`; LLM access belongs in `carepath-llm`.

pub mod careplan;
pub mod ehr;
pub mod guideline;
pub mod intake;
pub mod score;
pub mod section;

pub use careplan::{
    ActionPriority, ActionType, CarePlan, CarePlanAction, CarePlanStatus, ClinicianReview,
    ModifiableField, Modification, ModificationOp, ReviewVerdict,
};
pub use ehr::{Diagnosis, DiagnosisStatus, EhrRecord, LabResult, LabStatus, Procedure, VitalSigns};
pub use guideline::Guideline;
pub use intake::{
    ConditionStatus, Medication, MedicalHistoryEntry, PatientIntake, Symptom,
};
pub use score::{ConfidenceScore, ScoreError};
pub use section::{CarePlanSection, UnknownSection};
