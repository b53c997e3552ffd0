//! Document index over the OCR corpus.
//!
//! The corpus is chunked (semantically or by fixed-size windows), each chunk
//! is embedded, and queries are answered by cosine similarity.

pub mod chunker;
pub mod embedding;
pub mod store;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chunker::{chunk_corpus, ChunkStrategy};
pub use embedding::{Embedder, OllamaEmbedder};
pub use store::{RetrievedChunk, Retriever, VectorIndex};

/// Errors from building or querying the index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to read corpus {path}: {source}")]
    CorpusUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corpus is empty")]
    EmptyCorpus,

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Invalid retrieval configuration: {0}")]
    InvalidConfig(String),
}

/// Retrieval and chunking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks returned per query
    #[serde(default = "default_k")]
    pub k: usize,
    /// `semantic` or `recursive`
    #[serde(default = "default_splitter")]
    pub splitter: String,
    /// Characters per chunk for the `recursive` splitter
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared by neighbouring chunks for the `recursive` splitter
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Distance percentile above which the `semantic` splitter cuts
    #[serde(default = "default_breakpoint_percentile")]
    pub breakpoint_percentile: f32,
}

fn default_k() -> usize {
    3
}

fn default_splitter() -> String {
    "semantic".to_string()
}

fn default_chunk_size() -> usize {
    300
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_breakpoint_percentile() -> f32 {
    95.0
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl RetrievalConfig {
    fn base_default() -> Self {
        Self {
            k: default_k(),
            splitter: default_splitter(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            breakpoint_percentile: default_breakpoint_percentile(),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `RETRIEVER_K`: chunks returned per query
    /// - `TEXT_SPLITTER`: `semantic` or `recursive`
    /// - `CHUNK_SIZE`, `CHUNK_OVERLAP`: fixed-size window settings
    ///
    /// Values that fail to parse are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(k) = env_parse("RETRIEVER_K") {
            self.k = k;
        }
        if let Ok(val) = std::env::var("TEXT_SPLITTER") {
            self.splitter = val.trim().to_lowercase();
        }
        if let Some(size) = env_parse("CHUNK_SIZE") {
            self.chunk_size = size;
        }
        if let Some(overlap) = env_parse("CHUNK_OVERLAP") {
            self.chunk_overlap = overlap;
        }
        self
    }

    /// Validate and resolve the configured chunking strategy.
    pub fn strategy(&self) -> Result<ChunkStrategy, IndexError> {
        if self.k == 0 {
            return Err(IndexError::InvalidConfig("k must be at least 1".into()));
        }

        match self.splitter.as_str() {
            "semantic" => {
                let p = self.breakpoint_percentile;
                if !(0.0..=100.0).contains(&p) {
                    return Err(IndexError::InvalidConfig(format!(
                        "breakpoint_percentile must be within 0-100, got {}",
                        p
                    )));
                }
                Ok(ChunkStrategy::Semantic {
                    breakpoint_percentile: p,
                })
            }
            "recursive" | "fixed" => {
                if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
                    return Err(IndexError::InvalidConfig(format!(
                        "chunk_overlap ({}) must be smaller than chunk_size ({})",
                        self.chunk_overlap, self.chunk_size
                    )));
                }
                Ok(ChunkStrategy::FixedSize {
                    chunk_size: self.chunk_size,
                    chunk_overlap: self.chunk_overlap,
                })
            }
            other => Err(IndexError::InvalidConfig(format!(
                "unknown splitter '{}', expected 'semantic' or 'recursive'",
                other
            ))),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strategy_is_semantic() {
        let strategy = RetrievalConfig::base_default().strategy().unwrap();
        assert_eq!(
            strategy,
            ChunkStrategy::Semantic {
                breakpoint_percentile: 95.0
            }
        );
    }

    #[test]
    fn test_recursive_strategy() {
        let config = RetrievalConfig {
            splitter: "recursive".into(),
            ..RetrievalConfig::base_default()
        };
        assert_eq!(
            config.strategy().unwrap(),
            ChunkStrategy::FixedSize {
                chunk_size: 300,
                chunk_overlap: 100
            }
        );
    }

    #[test]
    fn test_invalid_configs() {
        let base = RetrievalConfig::base_default();
        let cases = [
            RetrievalConfig { k: 0, ..base.clone() },
            RetrievalConfig { splitter: "magic".into(), ..base.clone() },
            RetrievalConfig {
                splitter: "recursive".into(),
                chunk_overlap: 300,
                ..base.clone()
            },
            RetrievalConfig { breakpoint_percentile: 120.0, ..base.clone() },
        ];
        for config in cases {
            assert!(matches!(config.strategy(), Err(IndexError::InvalidConfig(_))));
        }
    }
}
