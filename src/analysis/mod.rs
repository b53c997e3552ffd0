//! Cognitive distortion analysis.
//!
//! Two pipelines share one entry point: a context-free pipeline that sees
//! only the issue, and a retrieval pipeline that also sees the journal
//! entries most similar to it. Model output is extracted from any markdown
//! fence, quote-normalized and validated against the mode's result shape.

pub mod extract;
mod orchestrator;
pub mod pipeline;
pub mod taxonomy;
pub mod types;

pub use orchestrator::{AnalysisError, AnalysisOrchestrator};
pub use pipeline::{
    ContextFreePipeline, LazyPipeline, OllamaPipelineBuilder, PipelineBuilder, PipelineState,
    RetrievalPipeline, RetrievalRun,
};
pub use taxonomy::{DistortionTaxonomy, TaxonomyError};
pub use types::{
    AnalysisMode, AnalysisOutcome, AnalysisResult, DistortionAnalysis, DistortionComparison,
    DistortionFinding,
};
