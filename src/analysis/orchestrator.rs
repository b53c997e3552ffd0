//! Entry point for distortion analysis in either mode.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info};

use super::extract::parse_structured;
use super::pipeline::{ContextFreePipeline, LazyPipeline, PipelineBuilder, PipelineState, RetrievalPipeline};
use super::types::{AnalysisMode, AnalysisOutcome, AnalysisResult, DistortionAnalysis, DistortionComparison, ResultShape};
use crate::index::IndexError;
use crate::llm::LlmError;

/// Errors from analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Issue text is empty")]
    EmptyIssue,

    #[error("Failed to set up {mode} pipeline: {message}")]
    Setup { mode: AnalysisMode, message: String },

    #[error("{mode} pipeline unavailable: {source}")]
    PipelineUnavailable {
        mode: AnalysisMode,
        #[source]
        source: Arc<AnalysisError>,
    },

    #[error("{mode} model call failed: {source}")]
    Model {
        mode: AnalysisMode,
        #[source]
        source: LlmError,
    },

    #[error("Retrieval failed: {0}")]
    Retrieval(#[source] IndexError),

    #[error("Invalid {mode} output: {source}")]
    InvalidOutput {
        mode: AnalysisMode,
        /// The prepared text that failed to parse.
        content: String,
        /// Retrieved context, empty in context-free mode.
        source_content: String,
        #[source]
        source: serde_json::Error,
    },
}

impl AnalysisError {
    pub(crate) fn setup(mode: AnalysisMode, err: impl std::fmt::Display) -> Self {
        AnalysisError::Setup {
            mode,
            message: err.to_string(),
        }
    }

    /// Retrieved context attached to the error, if any.
    pub fn source_content(&self) -> Option<&str> {
        match self {
            AnalysisError::InvalidOutput { source_content, .. } if !source_content.is_empty() => {
                Some(source_content)
            }
            _ => None,
        }
    }
}

/// Runs context-free or retrieval-augmented analysis.
///
/// Each mode's pipeline is built on first use and shared by all later calls.
pub struct AnalysisOrchestrator {
    builder: Arc<dyn PipelineBuilder>,
    context_free: LazyPipeline<ContextFreePipeline>,
    retrieval: LazyPipeline<RetrievalPipeline>,
}

impl AnalysisOrchestrator {
    pub fn new(builder: Arc<dyn PipelineBuilder>) -> Self {
        Self {
            builder,
            context_free: LazyPipeline::new(AnalysisMode::ContextFree),
            retrieval: LazyPipeline::new(AnalysisMode::Contextual),
        }
    }

    pub fn state(&self, mode: AnalysisMode) -> PipelineState {
        match mode {
            AnalysisMode::ContextFree => self.context_free.state(),
            AnalysisMode::Contextual => self.retrieval.state(),
        }
    }

    /// Build a mode's pipeline ahead of the first request.
    pub async fn warm_up(&self, mode: AnalysisMode) -> Result<(), AnalysisError> {
        match mode {
            AnalysisMode::ContextFree => self.context_free_pipeline().await.map(|_| ()),
            AnalysisMode::Contextual => self.retrieval_pipeline().await.map(|_| ()),
        }
    }

    async fn context_free_pipeline(&self) -> Result<Arc<ContextFreePipeline>, AnalysisError> {
        self.context_free
            .get_or_init(|| self.builder.build_context_free())
            .await
    }

    async fn retrieval_pipeline(&self) -> Result<Arc<RetrievalPipeline>, AnalysisError> {
        self.retrieval
            .get_or_init(|| self.builder.build_retrieval())
            .await
    }

    /// Analyse `issue`, grounding it in retrieved journal context when `use_context` is set.
    pub async fn analyse(
        &self,
        issue: &str,
        use_context: bool,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        if issue.trim().is_empty() {
            return Err(AnalysisError::EmptyIssue);
        }

        let mode = AnalysisMode::from_use_context(use_context);
        info!(
            "Analysing issue ({}): {}...",
            mode,
            issue.chars().take(100).collect::<String>()
        );

        match mode {
            AnalysisMode::ContextFree => {
                let pipeline = self.context_free_pipeline().await?;
                let started = Instant::now();
                let raw = pipeline.invoke(issue).await?;
                info!(
                    "Context-free chain took {:.2}s",
                    started.elapsed().as_secs_f64()
                );

                let analysis: DistortionAnalysis = validate(mode, &raw, String::new())?;
                Ok(AnalysisOutcome {
                    result: AnalysisResult::ContextFree(analysis),
                    source_content: String::new(),
                })
            }
            AnalysisMode::Contextual => {
                let pipeline = self.retrieval_pipeline().await?;
                let started = Instant::now();
                let run = pipeline.invoke(issue).await?;
                info!(
                    "Retrieval chain took {:.2}s",
                    started.elapsed().as_secs_f64()
                );

                let source_content = run.source_content();
                let comparison: DistortionComparison =
                    validate(mode, &run.raw, source_content.clone())?;
                Ok(AnalysisOutcome {
                    result: AnalysisResult::Contextual(comparison),
                    source_content,
                })
            }
        }
    }
}

fn validate<T: ResultShape>(
    mode: AnalysisMode,
    raw: &str,
    source_content: String,
) -> Result<T, AnalysisError> {
    parse_structured(raw).map_err(|(content, source)| {
        error!("JSON parsing error ({}): {}", mode, source);
        error!("JSON content ({}): {}", mode, content);
        AnalysisError::InvalidOutput {
            mode,
            content,
            source_content,
            source,
        }
    })
}
