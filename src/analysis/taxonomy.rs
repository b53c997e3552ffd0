//! Distortion reference data embedded into every analysis prompt.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Cognitive distortions file not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The distortion taxonomy as loaded from disk.
///
/// Kept as an untyped JSON value so whatever the file contains is passed to
/// the model unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct DistortionTaxonomy {
    value: serde_json::Value,
}

impl DistortionTaxonomy {
    pub fn from_value(value: serde_json::Value) -> Self {
        Self { value }
    }

    pub async fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TaxonomyError::NotFound(path.to_path_buf()))
            }
            Err(source) => {
                return Err(TaxonomyError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let value = serde_json::from_str(&text).map_err(|source| TaxonomyError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { value })
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Pretty-printed JSON for prompt embedding.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.value).unwrap_or_else(|_| self.value.to_string())
    }
}
