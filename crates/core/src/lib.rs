//! # Carepath Core
//!
//! Business logic for the carepath care-plan system: patient intake
//! processing, LLM-backed draft orchestration and the clinician review
//! state machine.
//!
//! Storage and external systems are reached through injected seams so a
//! real datastore, EHR integration or delivery channel can be substituted
//! without touching the workflow code:
//! - [`repository`] — care-plan and intake repositories plus per-plan locks
//! - [`ehr`] — EHR gateway
//! - [`retrieval`] — guideline embedding and nearest-neighbour search
//! - [`delivery`] — patient-facing delivery channel
//! - [`audit`] — append-only compliance trail
//!
//! **No API concerns**: HTTP routing, authentication and session handling
//! live outside this crate.

pub mod audit;
pub mod config;
pub mod delivery;
pub mod ehr;
pub mod error;
pub mod intake;
pub mod orchestrator;
pub mod repository;
pub mod retrieval;
pub mod review;

pub use audit::{AuditEvent, AuditSink, RecordingAuditSink, TracingAuditSink};
pub use config::CoreConfig;
pub use delivery::{DeliveryError, DeliveryReceipt, PatientDelivery, PatientFacingPlan, PortalDelivery};
pub use ehr::{EhrError, EhrGateway, StaticEhrGateway};
pub use error::{CareError, CareResult};
pub use intake::{CompletenessReport, IntakeReceipt, IntakeService};
pub use orchestrator::{CarePlanOrchestrator, DraftReceipt, SectionReceipt};
pub use repository::{
    CarePlanRepository, InMemoryCarePlans, InMemoryIntakes, IntakeRepository, PlanLocks,
};
pub use retrieval::{
    BagOfWordsEmbedder, GuidelineIndex, InMemoryGuidelineIndex, QueryEmbedder, RetrievalError,
    ScoredGuideline,
};
pub use review::{
    ApprovalReceipt, ApprovalRequest, DeliveryOutcome, PendingReview, ReviewReceipt,
    ReviewRequest, ReviewService,
};
