//! Query classifier — picks a retrieval strategy for a free-text query.
//!
//! The LLM-backed implementation shells out to the `claude` CLI and parses
//! the JSON object in its reply.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::ClassifierConfig;
use crate::constants::truncate_safe;
use crate::retrieval::StrategyKind;
use crate::{RecallError, RecallResult};

const MAX_QUERY_CHARS: usize = 2_000;

/// Optional strategy parameters suggested alongside the strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationParams {
    pub keywords: Vec<String>,
    pub categories: Vec<String>,
    pub relative_time: Option<String>,
    /// Memory id the query is about, for the graph strategy.
    pub relationship_focus: Option<String>,
    pub weights: Option<HashMap<StrategyKind, f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub strategy: StrategyKind,
    /// In [0,1].
    pub confidence: f64,
    pub explanation: String,
    pub params: ClassificationParams,
}

impl Classification {
    /// Parse the first `{` .. last `}` span of a model reply.
    ///
    /// Unknown strategy names become `Semantic`; confidence is clamped.
    /// Weight keys must name known strategies.
    pub fn from_llm_output(raw: &str) -> RecallResult<Self> {
        let json_str = match (raw.find('{'), raw.rfind('}')) {
            (Some(start), Some(end)) if end > start => &raw[start..=end],
            _ => {
                return Err(RecallError::Classifier(
                    "No JSON object in classifier output".into(),
                ))
            }
        };
        let parsed: RawClassification = serde_json::from_str(json_str)
            .map_err(|e| RecallError::Classifier(format!("Failed to parse classification: {}", e)))?;

        let weights = match parsed.parameters.weights {
            Some(raw_weights) => {
                let mut weights = HashMap::with_capacity(raw_weights.len());
                for (name, w) in raw_weights {
                    let kind: StrategyKind = name.parse().map_err(RecallError::Classifier)?;
                    weights.insert(kind, w);
                }
                Some(weights)
            }
            None => None,
        };

        let confidence = if parsed.confidence.is_finite() {
            parsed.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Ok(Self {
            strategy: StrategyKind::parse_or_semantic(&parsed.strategy),
            confidence,
            explanation: parsed.explanation,
            params: ClassificationParams {
                keywords: parsed.parameters.keywords,
                categories: parsed.parameters.categories,
                relative_time: parsed.parameters.relative_time.filter(|s| !s.trim().is_empty()),
                relationship_focus: parsed
                    .parameters
                    .relationship_focus
                    .filter(|s| !s.trim().is_empty()),
                weights,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default)]
    strategy: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    parameters: RawParams,
}

#[derive(Debug, Default, Deserialize)]
struct RawParams {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default, alias = "time_range")]
    relative_time: Option<String>,
    #[serde(default)]
    relationship_focus: Option<String>,
    #[serde(default)]
    weights: Option<HashMap<String, f64>>,
}

pub trait QueryClassifier: Send + Sync {
    fn classify(&self, query: &str, cancel: &CancelToken) -> RecallResult<Classification>;
}

/// Classifier backed by the `claude` CLI.
pub struct LlmClassifier {
    config: ClassifierConfig,
}

impl LlmClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }
}

impl QueryClassifier for LlmClassifier {
    fn classify(&self, query: &str, cancel: &CancelToken) -> RecallResult<Classification> {
        let prompt = build_classification_prompt(truncate_safe(query, MAX_QUERY_CHARS));
        let response = super::llm_subprocess::call_claude_with_model(
            &prompt,
            &self.config.model,
            Duration::from_secs(self.config.timeout_secs),
            self.config.max_retries,
            cancel,
        )?;
        let classification = Classification::from_llm_output(&response)?;
        tracing::info!(
            strategy = %classification.strategy,
            confidence = classification.confidence,
            "Query classified"
        );
        Ok(classification)
    }
}

fn build_classification_prompt(query: &str) -> String {
    format!(
        r#"You route memory-retrieval queries. Pick the single best search strategy for the query and return JSON only.

## Strategies
- semantic: meaning-based similarity (default)
- keyword: exact terms, names, identifiers
- categorical: the user asks for a category or tag of memories
- temporal: the query is about a time period ("last week", "3 days")
- graph: the query is about memories related to one specific memory
- hybrid: a weighted mix; give weights over the other strategies summing to 1.0

## Output format (JSON only, no markdown)
{{"strategy":"...","confidence":0.0-1.0,"explanation":"...","parameters":{{"keywords":["..."],"categories":["..."],"relative_time":"<integer> <hours|days|weeks|months>","relationship_focus":"<memory id>","weights":{{"semantic":0.7,"keyword":0.3}}}}}}
Omit parameters that do not apply.

## Query
{query}"#
    )
}
