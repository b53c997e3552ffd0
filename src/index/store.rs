//! In-memory vector index and the retriever seam used by analysis.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::chunker::{chunk_corpus, ChunkStrategy};
use super::embedding::{dot_similarity, normalize, Embedder};
use super::IndexError;

/// One retrieved fragment of the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedChunk {
    pub body: String,
}

impl RetrievedChunk {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// Returns the chunks most relevant to a query, best first.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, IndexError>;
}

/// Chunk bodies with their normalized embeddings.
pub struct VectorIndex {
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

impl VectorIndex {
    /// Chunk and embed `corpus`.
    pub async fn build(
        corpus: &str,
        strategy: &ChunkStrategy,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, IndexError> {
        let chunks = chunk_corpus(corpus, strategy, embedder.as_ref()).await?;
        let mut vectors = embedder.embed(&chunks).await?;
        if vectors.len() != chunks.len() {
            return Err(IndexError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }
        vectors.iter_mut().for_each(|v| normalize(v));

        info!("Indexed {} chunks", chunks.len());
        Ok(Self {
            chunks,
            vectors,
            embedder,
        })
    }

    /// Read the corpus file at `path` and build an index over it.
    pub async fn from_corpus_file(
        path: &Path,
        strategy: &ChunkStrategy,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, IndexError> {
        let corpus = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| IndexError::CorpusUnreadable {
                path: path.display().to_string(),
                source,
            })?;
        Self::build(&corpus, strategy, embedder).await
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Top `k` chunk indices for a normalized query vector, ties in chunk order.
    fn top_k(&self, query: &[f32], k: usize) -> Vec<usize> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot_similarity(query, v)))
            .collect();
        // Stable sort keeps chunk order among equal scores.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().take(k).map(|(i, _)| i).collect()
    }
}

#[async_trait]
impl Retriever for VectorIndex {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, IndexError> {
        let mut embedded = self.embedder.embed(&[query.to_string()]).await?;
        let mut query_vector = embedded
            .pop()
            .ok_or_else(|| IndexError::Embedding("no embedding returned for query".into()))?;
        normalize(&mut query_vector);

        Ok(self
            .top_k(&query_vector, k)
            .into_iter()
            .map(|i| RetrievedChunk::new(self.chunks[i].clone()))
            .collect())
    }
}
