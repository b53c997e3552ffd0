//! LLM integration for OCR, embeddings and distortion analysis.
//!
//! Talks to a local Ollama service for vision OCR, text generation and
//! embeddings.

mod client;
mod model;

pub use client::prompts;
pub use client::{GenerateRequest, GenerationOptions, LlmClient, LlmConfig, LlmError};
pub use model::{OllamaTextModel, TextModel};
