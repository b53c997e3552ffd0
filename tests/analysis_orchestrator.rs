//! Orchestrator behaviour over scripted models and retrievers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Semaphore;

use cbt_journal::analysis::{
    AnalysisError, AnalysisMode, AnalysisOrchestrator, AnalysisResult, ContextFreePipeline,
    DistortionTaxonomy, PipelineBuilder, PipelineState, RetrievalPipeline,
};
use cbt_journal::index::{IndexError, RetrievedChunk, Retriever};
use cbt_journal::llm::{LlmError, TextModel};

const ISSUE: &str = "I always ruin everything at work";

/// Returns the same reply to every prompt and remembers what it was asked.
struct ScriptedModel {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

struct FixedRetriever(Vec<&'static str>);

#[async_trait]
impl Retriever for FixedRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<RetrievedChunk>, IndexError> {
        Ok(self.0.iter().take(k).map(|c| RetrievedChunk::new(*c)).collect())
    }
}

/// Counts builds; optionally fails one mode, optionally waits on a gate first.
struct TestBuilder {
    model: Arc<ScriptedModel>,
    chunks: Vec<&'static str>,
    fail_mode: Option<AnalysisMode>,
    gate: Option<Arc<Semaphore>>,
    builds: AtomicUsize,
}

impl TestBuilder {
    fn new(model: Arc<ScriptedModel>) -> Self {
        Self {
            model,
            chunks: vec![
                "--- p1.jpg --- Boss praised my report",
                "--- p2.jpg --- Missed the bus, day ruined",
                "--- p3.jpg --- Dinner with friends",
                "--- p4.jpg --- unrelated",
            ],
            fail_mode: None,
            gate: None,
            builds: AtomicUsize::new(0),
        }
    }

    fn taxonomy() -> DistortionTaxonomy {
        DistortionTaxonomy::from_value(json!({
            "Overgeneralization": "Drawing broad conclusions from a single event",
            "Catastrophizing": "Expecting the worst possible outcome"
        }))
    }

    async fn enter(&self, mode: AnalysisMode) -> Result<(), AnalysisError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        if self.fail_mode == Some(mode) {
            return Err(AnalysisError::Setup {
                mode,
                message: "corpus file not found".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineBuilder for TestBuilder {
    async fn build_context_free(&self) -> Result<ContextFreePipeline, AnalysisError> {
        self.enter(AnalysisMode::ContextFree).await?;
        Ok(ContextFreePipeline::new(self.model.clone(), &Self::taxonomy()))
    }

    async fn build_retrieval(&self) -> Result<RetrievalPipeline, AnalysisError> {
        self.enter(AnalysisMode::Contextual).await?;
        Ok(RetrievalPipeline::new(
            self.model.clone(),
            Arc::new(FixedRetriever(self.chunks.clone())),
            3,
            &Self::taxonomy(),
        ))
    }
}

const FENCED_CURLY: &str = "Here is my analysis:\n```json\n{\u{201c}cognitive_distortions_issue\u{201d}: [{\u{201c}name\u{201d}: \u{201c}Overgeneralization\u{201d}, \u{201c}explanation\u{201d}: \u{201c}One bad day becomes \u{2018}always\u{2019}\u{201d}, \u{201c}questions\u{201d}: [\u{201c}Is that always true?\u{201d}]}]}\n```\nHope this helps.";

const COMPARISON: &str = r#"{"cognitive_distortions_context": [{"name": "Catastrophizing", "explanation": "A missed bus ruined the day", "questions": null}], "comparison": "Both jump to sweeping conclusions"}"#;

#[tokio::test]
async fn context_free_parses_fenced_curly_quoted_output() {
    let model = ScriptedModel::new(FENCED_CURLY);
    let orchestrator = AnalysisOrchestrator::new(Arc::new(TestBuilder::new(model.clone())));

    let outcome = orchestrator.analyse(ISSUE, false).await.unwrap();

    assert_eq!(outcome.result.mode(), AnalysisMode::ContextFree);
    assert!(outcome.source_content.is_empty());
    let findings = outcome.result.findings();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].name, "Overgeneralization");
    assert_eq!(findings[0].explanation, "One bad day becomes 'always'");
    assert_eq!(findings[0].questions, ["Is that always true?"]);
    assert!(outcome.result.comparison().is_none());

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(ISSUE));
    assert!(prompts[0].contains("Catastrophizing"));
    assert!(prompts[0].contains("cognitive_distortions_issue"));
}

#[tokio::test]
async fn contextual_returns_comparison_and_retrieved_source() {
    let model = ScriptedModel::new(COMPARISON);
    let orchestrator = AnalysisOrchestrator::new(Arc::new(TestBuilder::new(model.clone())));

    let outcome = orchestrator.analyse(ISSUE, true).await.unwrap();

    match &outcome.result {
        AnalysisResult::Contextual(comparison) => {
            assert_eq!(comparison.comparison, "Both jump to sweeping conclusions");
            assert_eq!(comparison.cognitive_distortions_context[0].name, "Catastrophizing");
            assert!(comparison.cognitive_distortions_context[0].questions.is_empty());
        }
        other => panic!("expected contextual result, got {:?}", other),
    }

    assert_eq!(
        outcome.source_content,
        "--- p1.jpg --- Boss praised my report\n\n--- p2.jpg --- Missed the bus, day ruined\n\n--- p3.jpg --- Dinner with friends"
    );
    assert!(!outcome.source_content.contains("unrelated"));

    let prompt = &model.prompts()[0];
    assert!(prompt.contains("Missed the bus, day ruined"));
    assert!(prompt.contains(ISSUE));
    assert!(prompt.contains("cognitive_distortions_context"));
}

#[tokio::test]
async fn unparsable_output_is_invalid_in_both_modes() {
    let model = ScriptedModel::new("I think you are catastrophizing.");
    let orchestrator = AnalysisOrchestrator::new(Arc::new(TestBuilder::new(model)));

    let err = orchestrator.analyse(ISSUE, false).await.unwrap_err();
    match &err {
        AnalysisError::InvalidOutput { mode, content, .. } => {
            assert_eq!(*mode, AnalysisMode::ContextFree);
            assert_eq!(content, "I think you are catastrophizing.");
        }
        other => panic!("expected invalid output, got {:?}", other),
    }
    assert!(err.source_content().is_none());

    let err = orchestrator.analyse(ISSUE, true).await.unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::InvalidOutput {
            mode: AnalysisMode::Contextual,
            ..
        }
    ));
    // Retrieved context survives a parse failure.
    assert!(err.source_content().unwrap().contains("Boss praised my report"));
}

#[tokio::test]
async fn wrong_shape_for_mode_is_invalid() {
    // A comparison payload is not a context-free result.
    let model = ScriptedModel::new(COMPARISON);
    let orchestrator = AnalysisOrchestrator::new(Arc::new(TestBuilder::new(model)));

    let err = orchestrator.analyse(ISSUE, false).await.unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidOutput { .. }));
}

#[tokio::test]
async fn pipelines_build_once_and_repeat_calls_agree() {
    let model = ScriptedModel::new(FENCED_CURLY);
    let builder = Arc::new(TestBuilder::new(model.clone()));
    let orchestrator = AnalysisOrchestrator::new(builder.clone());

    assert_eq!(orchestrator.state(AnalysisMode::ContextFree), PipelineState::Uninitialized);
    assert_eq!(orchestrator.state(AnalysisMode::Contextual), PipelineState::Uninitialized);

    let first = orchestrator.analyse(ISSUE, false).await.unwrap();
    let second = orchestrator.analyse(ISSUE, false).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(model.prompts()[0], model.prompts()[1]);

    assert_eq!(builder.builds.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.state(AnalysisMode::ContextFree), PipelineState::Ready);
    assert_eq!(orchestrator.state(AnalysisMode::Contextual), PipelineState::Uninitialized);
}

#[tokio::test]
async fn failed_build_is_cached() {
    let mut builder = TestBuilder::new(ScriptedModel::new(COMPARISON));
    builder.fail_mode = Some(AnalysisMode::Contextual);
    let builder = Arc::new(builder);
    let orchestrator = AnalysisOrchestrator::new(builder.clone());

    for _ in 0..3 {
        let err = orchestrator.analyse(ISSUE, true).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::PipelineUnavailable {
                mode: AnalysisMode::Contextual,
                ..
            }
        ));
        assert!(err.to_string().contains("corpus file not found"));
    }

    assert_eq!(builder.builds.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.state(AnalysisMode::Contextual), PipelineState::Failed);
}

#[tokio::test]
async fn failed_build_leaves_other_mode_working() {
    let mut builder = TestBuilder::new(ScriptedModel::new(FENCED_CURLY));
    builder.fail_mode = Some(AnalysisMode::Contextual);
    let builder = Arc::new(builder);
    let orchestrator = AnalysisOrchestrator::new(builder.clone());

    assert!(orchestrator.analyse(ISSUE, true).await.is_err());
    assert_eq!(orchestrator.state(AnalysisMode::Contextual), PipelineState::Failed);

    let outcome = orchestrator.analyse(ISSUE, false).await.unwrap();
    assert_eq!(outcome.result.findings()[0].name, "Overgeneralization");
    assert_eq!(orchestrator.state(AnalysisMode::ContextFree), PipelineState::Ready);
    assert_eq!(orchestrator.state(AnalysisMode::Contextual), PipelineState::Failed);
    assert_eq!(builder.builds.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_first_calls_share_one_build() {
    let gate = Arc::new(Semaphore::new(0));
    let mut builder = TestBuilder::new(ScriptedModel::new(COMPARISON));
    builder.gate = Some(gate.clone());
    let builder = Arc::new(builder);
    let orchestrator = Arc::new(AnalysisOrchestrator::new(builder.clone()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.analyse(ISSUE, true).await })
        })
        .collect();

    while orchestrator.state(AnalysisMode::Contextual) != PipelineState::Initializing {
        tokio::task::yield_now().await;
    }
    gate.add_permits(1);

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(builder.builds.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.state(AnalysisMode::Contextual), PipelineState::Ready);
}

#[tokio::test]
async fn warm_up_builds_without_calling_model() {
    let model = ScriptedModel::new(FENCED_CURLY);
    let orchestrator = AnalysisOrchestrator::new(Arc::new(TestBuilder::new(model.clone())));

    orchestrator.warm_up(AnalysisMode::Contextual).await.unwrap();
    assert_eq!(orchestrator.state(AnalysisMode::Contextual), PipelineState::Ready);
    assert!(model.prompts().is_empty());
}

#[tokio::test]
async fn empty_issue_is_rejected_before_building() {
    let builder = Arc::new(TestBuilder::new(ScriptedModel::new(FENCED_CURLY)));
    let orchestrator = AnalysisOrchestrator::new(builder.clone());

    let err = orchestrator.analyse("   \n", false).await.unwrap_err();
    assert!(matches!(err, AnalysisError::EmptyIssue));
    assert_eq!(builder.builds.load(Ordering::SeqCst), 0);
}
