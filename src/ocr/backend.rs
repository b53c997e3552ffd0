//! Vision model abstraction and shared OCR types.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::prompts::DEFAULT_OCR_PROMPT;

/// Errors from the page OCR pipeline.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("No images found in {}", .0.display())]
    NoImagesFound(PathBuf),

    #[error("No gutter found: {0}")]
    NoGutter(String),

    #[error("Gutter at column {column} is not inside an image {width} px wide")]
    DegenerateGutter { column: u32, width: u32 },

    #[error("Invalid OCR configuration: {0}")]
    InvalidConfig(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    /// Whether this is a missing or empty image directory.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OcrError::DirectoryNotFound(_) | OcrError::NoImagesFound(_)
        )
    }
}

/// A vision-capable model that reads text out of an image file.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Extract text from the image at `image_path` following `prompt`.
    async fn extract_text(&self, image_path: &Path, prompt: &str) -> Result<String, OcrError>;
}

/// Settings for the column OCR step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrOptions {
    /// Vision model name
    #[serde(default = "default_model")]
    pub model: String,
    /// Output cap per column
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Discourages the model from looping on one line
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
    /// Instruction sent with each column image
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Subdirectory of the images directory that receives split halves
    #[serde(default = "default_splits_subdir")]
    pub splits_subdir: String,
}

fn default_model() -> String {
    "qwen2.5vl:7b".to_string()
}

fn default_max_tokens() -> u32 {
    300
}

fn default_repeat_penalty() -> f32 {
    2.0
}

fn default_prompt() -> String {
    DEFAULT_OCR_PROMPT.to_string()
}

fn default_splits_subdir() -> String {
    "splits".to_string()
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl OcrOptions {
    fn base_default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            repeat_penalty: default_repeat_penalty(),
            prompt: default_prompt(),
            splits_subdir: default_splits_subdir(),
        }
    }

    /// Apply `OCR_LLM_MODEL` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("OCR_LLM_MODEL") {
            if !val.trim().is_empty() {
                self.model = val;
            }
        }
        self
    }
}

/// Read an image file and encode it as base64.
pub fn encode_image_base64(image_path: &Path) -> Result<String, OcrError> {
    use base64::Engine;

    let image_bytes = std::fs::read(image_path)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&image_bytes))
}
