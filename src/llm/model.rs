//! Text generation seam used by the analysis pipelines.

use std::sync::Arc;

use async_trait::async_trait;

use super::client::{GenerateRequest, GenerationOptions, LlmClient, LlmError};

/// A model that turns a prompt into free-form text.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Generate a completion for the prompt.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// `TextModel` backed by Ollama's generate endpoint.
pub struct OllamaTextModel {
    client: Arc<LlmClient>,
    model: String,
    options: GenerationOptions,
}

impl OllamaTextModel {
    /// Build from the client's configured analysis model and options.
    pub fn new(client: Arc<LlmClient>) -> Self {
        let config = client.config();
        let model = config.model.clone();
        let options = GenerationOptions {
            num_predict: config.max_tokens,
            repeat_penalty: None,
            temperature: config.temperature,
        };
        Self {
            client,
            model,
            options,
        }
    }
}

#[async_trait]
impl TextModel for OllamaTextModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request =
            GenerateRequest::new(self.model.as_str(), prompt).with_options(self.options.clone());
        self.client.generate(&request).await
    }
}
