//! Analysis pipelines and their lazily built, cached cells.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use super::orchestrator::AnalysisError;
use super::taxonomy::DistortionTaxonomy;
use super::types::{AnalysisMode, DistortionAnalysis, DistortionComparison, ResultShape};
use crate::index::{OllamaEmbedder, RetrievalConfig, RetrievedChunk, Retriever, VectorIndex};
use crate::llm::prompts::{fill, CONTEXTUAL_PROMPT, CONTEXT_FREE_PROMPT};
use crate::llm::{LlmClient, OllamaTextModel, TextModel};

/// Analysis of the issue alone.
pub struct ContextFreePipeline {
    model: Arc<dyn TextModel>,
    distortions: String,
    format_instructions: String,
}

impl ContextFreePipeline {
    pub fn new(model: Arc<dyn TextModel>, taxonomy: &DistortionTaxonomy) -> Self {
        Self {
            model,
            distortions: taxonomy.to_prompt_json(),
            format_instructions: DistortionAnalysis::format_instructions(),
        }
    }

    pub fn render_prompt(&self, issue: &str) -> String {
        fill(
            CONTEXT_FREE_PROMPT,
            &[
                ("distortions", self.distortions.as_str()),
                ("format_instructions", self.format_instructions.as_str()),
                ("question", issue),
            ],
        )
    }

    /// Raw model output for `issue`.
    pub async fn invoke(&self, issue: &str) -> Result<String, AnalysisError> {
        let prompt = self.render_prompt(issue);
        debug!("Context-free prompt is {} chars", prompt.len());
        self.model
            .complete(&prompt)
            .await
            .map_err(|source| AnalysisError::Model {
                mode: AnalysisMode::ContextFree,
                source,
            })
    }
}

/// Raw output of a retrieval-augmented run with the chunks it used.
#[derive(Debug, Clone)]
pub struct RetrievalRun {
    pub raw: String,
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievalRun {
    /// Chunk bodies joined by blank lines.
    pub fn source_content(&self) -> String {
        join_chunks(&self.chunks)
    }
}

fn join_chunks(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.body.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Analysis of retrieved journal context against the issue.
pub struct RetrievalPipeline {
    model: Arc<dyn TextModel>,
    retriever: Arc<dyn Retriever>,
    k: usize,
    distortions: String,
    format_instructions: String,
}

impl RetrievalPipeline {
    pub fn new(
        model: Arc<dyn TextModel>,
        retriever: Arc<dyn Retriever>,
        k: usize,
        taxonomy: &DistortionTaxonomy,
    ) -> Self {
        Self {
            model,
            retriever,
            k,
            distortions: taxonomy.to_prompt_json(),
            format_instructions: DistortionComparison::format_instructions(),
        }
    }

    pub fn render_prompt(&self, issue: &str, context: &str) -> String {
        fill(
            CONTEXTUAL_PROMPT,
            &[
                ("distortions", self.distortions.as_str()),
                ("format_instructions", self.format_instructions.as_str()),
                ("question", issue),
                ("context", context),
            ],
        )
    }

    /// Retrieve the top chunks for `issue` and run the model over them.
    pub async fn invoke(&self, issue: &str) -> Result<RetrievalRun, AnalysisError> {
        let chunks = self
            .retriever
            .retrieve(issue, self.k)
            .await
            .map_err(AnalysisError::Retrieval)?;
        debug!("Retrieved {} chunks", chunks.len());

        let prompt = self.render_prompt(issue, &join_chunks(&chunks));
        let raw = self
            .model
            .complete(&prompt)
            .await
            .map_err(|source| AnalysisError::Model {
                mode: AnalysisMode::Contextual,
                source,
            })?;
        Ok(RetrievalRun { raw, chunks })
    }
}

/// Lifecycle of a lazily built pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// A pipeline built at most once, on first use.
///
/// Concurrent callers wait on the same build. A failed build is cached and
/// every later call fails fast with the original error.
pub struct LazyPipeline<P> {
    mode: AnalysisMode,
    cell: OnceCell<Result<Arc<P>, Arc<AnalysisError>>>,
    initializing: AtomicBool,
}

impl<P> LazyPipeline<P> {
    pub fn new(mode: AnalysisMode) -> Self {
        Self {
            mode,
            cell: OnceCell::new(),
            initializing: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> PipelineState {
        match self.cell.get() {
            Some(Ok(_)) => PipelineState::Ready,
            Some(Err(_)) => PipelineState::Failed,
            None if self.initializing.load(Ordering::Acquire) => PipelineState::Initializing,
            None => PipelineState::Uninitialized,
        }
    }

    /// The ready pipeline, building it with `init` if nobody has yet.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<Arc<P>, AnalysisError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<P, AnalysisError>>,
    {
        let slot = self
            .cell
            .get_or_init(|| async {
                let building = BuildFlag::raise(&self.initializing);
                let started = Instant::now();
                let built = init().await;
                drop(building);

                match built {
                    Ok(pipeline) => {
                        info!(
                            "{} pipeline initialized in {:.2}s",
                            self.mode,
                            started.elapsed().as_secs_f64()
                        );
                        Ok(Arc::new(pipeline))
                    }
                    Err(e) => {
                        error!("Failed to initialize {} pipeline: {}", self.mode, e);
                        Err(Arc::new(e))
                    }
                }
            })
            .await;

        match slot {
            Ok(pipeline) => Ok(Arc::clone(pipeline)),
            Err(e) => Err(AnalysisError::PipelineUnavailable {
                mode: self.mode,
                source: Arc::clone(e),
            }),
        }
    }
}

/// Raises the initializing flag for the life of a build. Dropping it lowers
/// the flag, also when the building caller is cancelled mid-build.
struct BuildFlag<'a>(&'a AtomicBool);

impl<'a> BuildFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for BuildFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Builds the two pipelines on demand.
#[async_trait]
pub trait PipelineBuilder: Send + Sync {
    async fn build_context_free(&self) -> Result<ContextFreePipeline, AnalysisError>;

    async fn build_retrieval(&self) -> Result<RetrievalPipeline, AnalysisError>;
}

/// Builds pipelines over Ollama models, the taxonomy file and the corpus file.
pub struct OllamaPipelineBuilder {
    client: Arc<LlmClient>,
    distortions_path: PathBuf,
    corpus_path: PathBuf,
    retrieval: RetrievalConfig,
}

impl OllamaPipelineBuilder {
    pub fn new(
        client: Arc<LlmClient>,
        distortions_path: PathBuf,
        corpus_path: PathBuf,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            client,
            distortions_path,
            corpus_path,
            retrieval,
        }
    }

    async fn taxonomy(&self, mode: AnalysisMode) -> Result<DistortionTaxonomy, AnalysisError> {
        DistortionTaxonomy::load(&self.distortions_path)
            .await
            .map_err(|e| AnalysisError::setup(mode, e))
    }
}

#[async_trait]
impl PipelineBuilder for OllamaPipelineBuilder {
    async fn build_context_free(&self) -> Result<ContextFreePipeline, AnalysisError> {
        let taxonomy = self.taxonomy(AnalysisMode::ContextFree).await?;
        let model = Arc::new(OllamaTextModel::new(Arc::clone(&self.client)));
        Ok(ContextFreePipeline::new(model, &taxonomy))
    }

    async fn build_retrieval(&self) -> Result<RetrievalPipeline, AnalysisError> {
        let mode = AnalysisMode::Contextual;
        let taxonomy = self.taxonomy(mode).await?;
        let strategy = self
            .retrieval
            .strategy()
            .map_err(|e| AnalysisError::setup(mode, e))?;

        let embedder = Arc::new(OllamaEmbedder::new(Arc::clone(&self.client)));
        let index = VectorIndex::from_corpus_file(&self.corpus_path, &strategy, embedder)
            .await
            .map_err(|e| AnalysisError::setup(mode, e))?;
        info!(
            "Indexed {} into {} chunks",
            self.corpus_path.display(),
            index.len()
        );

        let model = Arc::new(OllamaTextModel::new(Arc::clone(&self.client)));
        Ok(RetrievalPipeline::new(
            model,
            Arc::new(index),
            self.retrieval.k,
            &taxonomy,
        ))
    }
}
