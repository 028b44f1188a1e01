//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into the
//! services. Request handling never reads process-wide environment
//! variables; that keeps behaviour consistent across runtimes and test
//! harnesses.

use std::time::Duration;

use crate::error::{CareError, CareResult};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    llm_timeout: Duration,
    ehr_timeout: Duration,
    retrieval_k: usize,
    relevance_threshold: f32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        llm_timeout: Duration,
        ehr_timeout: Duration,
        retrieval_k: usize,
        relevance_threshold: f32,
    ) -> CareResult<Self> {
        if llm_timeout.is_zero() || ehr_timeout.is_zero() {
            return Err(CareError::validation("timeouts must be non-zero"));
        }
        if retrieval_k == 0 {
            return Err(CareError::validation("retrieval_k must be at least 1"));
        }
        if !(0.0..=1.0).contains(&relevance_threshold) {
            return Err(CareError::validation(
                "relevance_threshold must be within [0.0, 1.0]",
            ));
        }

        Ok(Self {
            llm_timeout,
            ehr_timeout,
            retrieval_k,
            relevance_threshold,
        })
    }

    /// Upper bound for a single LLM completion call.
    pub fn llm_timeout(&self) -> Duration {
        self.llm_timeout
    }

    /// Upper bound for an EHR fetch.
    pub fn ehr_timeout(&self) -> Duration {
        self.ehr_timeout
    }

    /// Number of guideline neighbours requested from the index.
    pub fn retrieval_k(&self) -> usize {
        self.retrieval_k
    }

    /// Minimum cosine score for a retrieved guideline to be used.
    pub fn relevance_threshold(&self) -> f32 {
        self.relevance_threshold
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            llm_timeout: Duration::from_secs(30),
            ehr_timeout: Duration::from_secs(10),
            retrieval_k: 5,
            relevance_threshold: 0.7,
        }
    }
}
