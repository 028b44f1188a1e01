//! # Carepath LLM
//!
//! Draft generation against an OpenAI-compatible chat-completions API.
//!
//! The [`DraftGenerator`] trait is the seam the orchestrator programs
//! against; [`OpenAiGenerator`] is the HTTP implementation. Prompt assembly
//! is deterministic so identical patient context always produces identical
//! prompts.

pub mod client;
pub mod error;
pub mod prompts;

pub use client::{
    DraftGenerator, GenerationOutcome, OpenAiGenerator, SafetyConcern, SafetyReport,
};
pub use error::GenerationError;
pub use prompts::completeness_confidence;
