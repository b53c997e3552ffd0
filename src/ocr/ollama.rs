//! Ollama vision adapter.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::backend::{encode_image_base64, OcrError, OcrOptions, VisionModel};
use crate::llm::{GenerateRequest, GenerationOptions, LlmClient};

/// `VisionModel` that sends each column image to Ollama's generate endpoint.
pub struct OllamaVisionModel {
    client: Arc<LlmClient>,
    model: String,
    options: GenerationOptions,
}

impl OllamaVisionModel {
    pub fn new(client: Arc<LlmClient>, options: &OcrOptions) -> Self {
        Self {
            client,
            model: options.model.clone(),
            options: GenerationOptions {
                num_predict: Some(options.max_tokens),
                repeat_penalty: Some(options.repeat_penalty),
                temperature: None,
            },
        }
    }
}

#[async_trait]
impl VisionModel for OllamaVisionModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn extract_text(&self, image_path: &Path, prompt: &str) -> Result<String, OcrError> {
        let image = encode_image_base64(image_path)?;
        debug!(
            "Sending {} ({} base64 bytes) to {}",
            image_path.display(),
            image.len(),
            self.model
        );

        let request = GenerateRequest::new(self.model.as_str(), prompt)
            .with_image(image)
            .with_options(self.options.clone());

        self.client
            .generate(&request)
            .await
            .map_err(|e| OcrError::Model(e.to_string()))
    }
}
