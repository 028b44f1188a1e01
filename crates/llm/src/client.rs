//! Draft generator trait and OpenAI-compatible HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use carepath_types::{CarePlanSection, EhrRecord, Guideline, PatientIntake};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::GenerationError;
use crate::prompts;

/// Result of a full care-plan generation call.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Raw JSON care plan as produced by the model.
    pub care_plan: Value,
    pub model_used: String,
    pub tokens_used: u64,
    /// Completeness proxy in `[0.0, 1.0]`.
    pub confidence_score: f32,
}

/// One finding from the safety-validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyConcern {
    #[serde(default)]
    pub severity: String,
    pub description: String,
}

/// Structured report from the safety-validation pass.
///
/// An unsafe plan is a report, not an error: callers decide what to do with
/// the findings. Fields default to empty so a terse model response still
/// parses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyReport {
    #[serde(default)]
    pub contraindications: Vec<String>,
    #[serde(default)]
    pub missing_assessments: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<SafetyConcern>,
    #[serde(default)]
    pub safe_to_proceed: Option<bool>,
}

/// Turns patient context into a structured care-plan payload.
///
/// Implementations must fail with [`GenerationError`] on transport or parse
/// failure; the orchestrator owns the fallback.
#[async_trait]
pub trait DraftGenerator: Send + Sync {
    /// Generates a full care plan from intake, optional EHR data and
    /// retrieved guidelines.
    async fn generate_care_plan(
        &self,
        intake: &PatientIntake,
        ehr: Option<&EhrRecord>,
        guidelines: &[Guideline],
    ) -> Result<GenerationOutcome, GenerationError>;

    /// Re-derives a single section using the existing plan as context.
    ///
    /// Returns the model's JSON, expected to be keyed by the section name.
    async fn regenerate_section(
        &self,
        section: CarePlanSection,
        existing_plan: &Value,
        additional_context: Option<&str>,
    ) -> Result<Value, GenerationError>;

    /// Runs an independent low-temperature safety pass over a plan.
    async fn validate_care_plan(&self, plan: &Value) -> Result<SafetyReport, GenerationError>;
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

const SECTION_MAX_TOKENS: u32 = 1500;
const VALIDATION_MAX_TOKENS: u32 = 1000;
const VALIDATION_TEMPERATURE: f32 = 0.1;

impl OpenAiGenerator {
    /// Creates a client. `timeout` bounds every completion call; elapsed
    /// timeouts surface as [`GenerationError::Timeout`].
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4000,
            // Lower temperature biases toward consistent medical output.
            temperature: 0.3,
        })
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<(Value, u64), GenerationError> {
        let body = chat_request_body(&self.model, system_prompt, user_prompt, max_tokens, temperature);

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let payload: Value = response.json().await?;
        parse_completion(&payload)
    }
}

#[async_trait]
impl DraftGenerator for OpenAiGenerator {
    async fn generate_care_plan(
        &self,
        intake: &PatientIntake,
        ehr: Option<&EhrRecord>,
        guidelines: &[Guideline],
    ) -> Result<GenerationOutcome, GenerationError> {
        let user_prompt = prompts::build_care_plan_prompt(intake, ehr, guidelines);
        let (care_plan, tokens_used) = self
            .complete(
                prompts::SYSTEM_PROMPT,
                &user_prompt,
                self.max_tokens,
                self.temperature,
            )
            .await?;

        let confidence_score = prompts::completeness_confidence(&care_plan);
        tracing::debug!(
            model = %self.model,
            tokens_used,
            confidence_score,
            "care plan generated"
        );

        Ok(GenerationOutcome {
            care_plan,
            model_used: self.model.clone(),
            tokens_used,
            confidence_score,
        })
    }

    async fn regenerate_section(
        &self,
        section: CarePlanSection,
        existing_plan: &Value,
        additional_context: Option<&str>,
    ) -> Result<Value, GenerationError> {
        let system_prompt = prompts::section_system_prompt(section);
        let user_prompt = prompts::build_section_prompt(section, existing_plan, additional_context);
        let (value, _) = self
            .complete(&system_prompt, &user_prompt, SECTION_MAX_TOKENS, self.temperature)
            .await?;
        Ok(value)
    }

    async fn validate_care_plan(&self, plan: &Value) -> Result<SafetyReport, GenerationError> {
        let user_prompt = prompts::build_validation_prompt(plan);
        let (value, _) = self
            .complete(
                prompts::VALIDATION_SYSTEM_PROMPT,
                &user_prompt,
                VALIDATION_MAX_TOKENS,
                VALIDATION_TEMPERATURE,
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Builds the chat-completions request body.
fn chat_request_body(
    model: &str,
    system_prompt: &str,
    user_prompt: &str,
    max_tokens: u32,
    temperature: f32,
) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": user_prompt},
        ],
        "max_tokens": max_tokens,
        "temperature": temperature,
        "response_format": {"type": "json_object"},
    })
}

/// Extracts the message content and token usage from a completion payload.
fn parse_completion(payload: &Value) -> Result<(Value, u64), GenerationError> {
    let content = payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or(GenerationError::MissingContent)?;

    let tokens_used = payload
        .pointer("/usage/total_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Ok((extract_json_object(content)?, tokens_used))
}

/// Parses a JSON object out of the completion text.
///
/// Some models wrap the object in prose or code fences; take the outermost
/// brace-delimited slice before parsing.
fn extract_json_object(content: &str) -> Result<Value, GenerationError> {
    let start = content.find('{').ok_or(GenerationError::MissingContent)?;
    let end = content.rfind('}').ok_or(GenerationError::MissingContent)?;
    if end < start {
        return Err(GenerationError::MissingContent);
    }
    Ok(serde_json::from_str(&content[start..=end])?)
}
