//! Embedding models and vector helpers.

use std::sync::Arc;

use async_trait::async_trait;

use super::IndexError;
use crate::llm::LlmClient;

/// Turns texts into dense vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every input, returning one vector per input in order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;
}

/// `Embedder` backed by Ollama's embed endpoint.
pub struct OllamaEmbedder {
    client: Arc<LlmClient>,
    model: String,
}

impl OllamaEmbedder {
    /// Use the client's configured embedding model.
    pub fn new(client: Arc<LlmClient>) -> Self {
        let model = client.config().embedding_model.clone();
        Self { client, model }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        self.client
            .embed(&self.model, inputs)
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))
    }
}

/// L2 normalize a vector in place. Zero vectors are left alone.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Dot product; equals cosine similarity on normalized vectors.
pub fn dot_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity of two arbitrary vectors, 0 when either is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_similarity(a, b) / (norm_a * norm_b)
}
