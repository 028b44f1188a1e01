//! Clinical guideline model used by vector retrieval.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A retrievable fragment of clinical-guideline text.
///
/// `metadata` carries filterable attributes (condition codes, specialty,
/// patient population); `embedding` is populated when the guideline is
/// indexed and omitted from API payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guideline {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Guideline {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: Map::new(),
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}
