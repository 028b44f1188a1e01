//! Generation errors.

/// Errors raised by the draft generator.
///
/// A "plan is unsafe" finding from the validation pass is data, not an
/// error; only transport and parse failures surface here.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("llm transport error: {0}")]
    Transport(reqwest::Error),

    #[error("llm call timed out")]
    Timeout,

    #[error("completion is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("completion contained no message content")]
    MissingContent,

    #[error("llm api returned status {status}: {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::Transport(err)
        }
    }
}
