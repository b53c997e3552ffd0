//! Result shapes returned by the analysis model.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::llm::prompts::{fill, FORMAT_INSTRUCTIONS};

/// Which pipeline handled a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Issue only.
    ContextFree,
    /// Issue plus retrieved journal context.
    Contextual,
}

impl AnalysisMode {
    pub fn from_use_context(use_context: bool) -> Self {
        if use_context {
            AnalysisMode::Contextual
        } else {
            AnalysisMode::ContextFree
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::ContextFree => "context-free",
            AnalysisMode::Contextual => "contextual",
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One identified cognitive distortion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistortionFinding {
    pub name: String,
    pub explanation: String,
    /// Challenge questions; absent or null in model output means none.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub questions: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Context-free result: distortions found in the issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistortionAnalysis {
    pub cognitive_distortions_issue: Vec<DistortionFinding>,
}

/// Contextual result: distortions found in past entries plus a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistortionComparison {
    pub cognitive_distortions_context: Vec<DistortionFinding>,
    pub comparison: String,
}

/// A shape the model is asked to emit, with its JSON schema.
pub trait ResultShape: DeserializeOwned {
    const SCHEMA: &'static str;

    /// Instructions embedded in the prompt telling the model how to answer.
    fn format_instructions() -> String {
        fill(FORMAT_INSTRUCTIONS, &[("schema", Self::SCHEMA)])
    }
}

macro_rules! finding_schema {
    () => {
        r#"{"title": "CognitiveDistortion", "type": "object", "properties": {"name": {"title": "Name", "description": "Name of the cognitive distortion", "type": "string"}, "explanation": {"title": "Explanation", "description": "Explanation of how cognitive distortion relates in this instance", "type": "string"}, "questions": {"title": "Questions", "description": "Questions to challenge the cognitive distortion", "anyOf": [{"type": "array", "items": {"type": "string"}}, {"type": "null"}]}}, "required": ["name", "explanation", "questions"]}"#
    };
}

impl ResultShape for DistortionAnalysis {
    const SCHEMA: &'static str = concat!(
        r##"{"$defs": {"CognitiveDistortion": "##,
        finding_schema!(),
        r##"}, "properties": {"cognitive_distortions_issue": {"title": "Cognitive Distortions Issue", "description": "Cognitive distortions identified in the issue", "type": "array", "items": {"$ref": "#/$defs/CognitiveDistortion"}}}, "required": ["cognitive_distortions_issue"]}"##
    );
}

impl ResultShape for DistortionComparison {
    const SCHEMA: &'static str = concat!(
        r##"{"$defs": {"CognitiveDistortion": "##,
        finding_schema!(),
        r##"}, "properties": {"cognitive_distortions_context": {"title": "Cognitive Distortions Context", "description": "Cognitive distortions identified in the context", "type": "array", "items": {"$ref": "#/$defs/CognitiveDistortion"}}, "comparison": {"title": "Comparison", "description": "A summary of situations or events that are similar between the context and the issue that seem to trigger these cognitive distortions as well as overall themes", "type": "string"}}, "required": ["cognitive_distortions_context", "comparison"]}"##
    );
}

/// Validated model output, one variant per mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "result", rename_all = "snake_case")]
pub enum AnalysisResult {
    ContextFree(DistortionAnalysis),
    Contextual(DistortionComparison),
}

impl AnalysisResult {
    pub fn mode(&self) -> AnalysisMode {
        match self {
            AnalysisResult::ContextFree(_) => AnalysisMode::ContextFree,
            AnalysisResult::Contextual(_) => AnalysisMode::Contextual,
        }
    }

    /// Findings for the issue (context-free) or the context (contextual).
    pub fn findings(&self) -> &[DistortionFinding] {
        match self {
            AnalysisResult::ContextFree(a) => &a.cognitive_distortions_issue,
            AnalysisResult::Contextual(c) => &c.cognitive_distortions_context,
        }
    }

    pub fn comparison(&self) -> Option<&str> {
        match self {
            AnalysisResult::ContextFree(_) => None,
            AnalysisResult::Contextual(c) => Some(&c.comparison),
        }
    }
}

/// A completed analysis with the journal text it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    /// Retrieved chunk bodies joined by blank lines; empty in context-free mode.
    pub source_content: String,
}
