//! Guideline retrieval seam.
//!
//! Nearest-neighbour search over embedded clinical-guideline text. The
//! production index is an external vector store; the in-memory
//! implementation here scores by cosine similarity over L2-normalised
//! vectors, ordered descending. The relevance threshold is applied by the
//! caller, not the index.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use carepath_types::Guideline;
use tokio::sync::RwLock;

/// Errors raised by embedding or search.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("retrieval backend error: {0}")]
    Backend(String),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },

    #[error("guideline {0} has no embedding vector")]
    MissingEmbedding(String),
}

/// A guideline with its similarity score for one query.
#[derive(Debug, Clone)]
pub struct ScoredGuideline {
    pub guideline: Guideline,
    pub score: f32,
}

/// Embeds free text into the index's vector space.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

/// Top-k nearest-neighbour search over indexed guidelines.
#[async_trait]
pub trait GuidelineIndex: Send + Sync {
    /// Returns up to `k` guidelines ordered by descending cosine score.
    async fn search(&self, embedding: &[f32], k: usize)
        -> Result<Vec<ScoredGuideline>, RetrievalError>;
}

/// In-memory cosine-similarity index.
#[derive(Debug)]
pub struct InMemoryGuidelineIndex {
    dimension: usize,
    entries: RwLock<Vec<(Guideline, Vec<f32>)>>,
}

impl InMemoryGuidelineIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Adds a guideline; its embedding is normalised on insertion.
    pub async fn add(&self, guideline: Guideline) -> Result<(), RetrievalError> {
        let embedding = guideline
            .embedding
            .clone()
            .ok_or_else(|| RetrievalError::MissingEmbedding(guideline.id.clone()))?;
        if embedding.len() != self.dimension {
            return Err(RetrievalError::Dimension {
                expected: self.dimension,
                got: embedding.len(),
            });
        }
        let normalised = normalise(embedding);
        self.entries.write().await.push((guideline, normalised));
        Ok(())
    }
}

#[async_trait]
impl GuidelineIndex for InMemoryGuidelineIndex {
    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredGuideline>, RetrievalError> {
        if embedding.len() != self.dimension {
            return Err(RetrievalError::Dimension {
                expected: self.dimension,
                got: embedding.len(),
            });
        }

        let query = normalise(embedding.to_vec());
        let entries = self.entries.read().await;
        let mut scored: Vec<ScoredGuideline> = entries
            .iter()
            .map(|(guideline, vector)| ScoredGuideline {
                guideline: guideline.clone(),
                score: dot(&query, vector),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Deterministic token-hashing embedder for development and tests.
///
/// Each lowercase token is hashed into a bucket; the resulting bag-of-words
/// vector is L2-normalised. Not a semantic embedding - a stand-in for the
/// external embedding service behind the same trait.
#[derive(Debug, Clone)]
pub struct BagOfWordsEmbedder {
    dimension: usize,
}

impl BagOfWordsEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl QueryEmbedder for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        Ok(normalise(vector))
    }
}

fn normalise(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_orders_by_descending_similarity() {
        let index = InMemoryGuidelineIndex::new(3);
        index
            .add(Guideline::new("g1", "diabetes management").with_embedding(vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        index
            .add(Guideline::new("g2", "hypertension treatment").with_embedding(vec![0.0, 1.0, 0.0]))
            .await
            .unwrap();
        index
            .add(
                Guideline::new("g3", "mixed cardiometabolic care")
                    .with_embedding(vec![0.7, 0.7, 0.0]),
            )
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 3).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.guideline.id.as_str()).collect();
        assert_eq!(ids, vec!["g1", "g3", "g2"]);
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn search_truncates_to_k() {
        let index = InMemoryGuidelineIndex::new(2);
        for i in 0..4 {
            index
                .add(Guideline::new(format!("g{i}"), "text").with_embedding(vec![1.0, i as f32]))
                .await
                .unwrap();
        }
        let results = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn rejects_dimension_mismatch() {
        let index = InMemoryGuidelineIndex::new(3);
        let err = index
            .add(Guideline::new("g1", "text").with_embedding(vec![1.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Dimension { .. }));
    }

    #[tokio::test]
    async fn embedder_is_deterministic() {
        let embedder = BagOfWordsEmbedder::new(64);
        let a = embedder.embed("chief complaint: diabetes").await.unwrap();
        let b = embedder.embed("chief complaint: diabetes").await.unwrap();
        assert_eq!(a, b);
    }
}
