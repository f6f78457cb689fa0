use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// How the per-call scores of one feedback are combined into its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Mean,
    Min,
    Max,
}

impl Aggregation {
    /// `None` for an empty slice.
    pub fn aggregate(&self, scores: &[f64]) -> Option<f64> {
        if scores.is_empty() {
            return None;
        }
        let value = match self {
            Aggregation::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
            Aggregation::Min => scores.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };
        Some(value)
    }
}

impl FromStr for Aggregation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" | "avg" | "average" => Ok(Aggregation::Mean),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            other => anyhow::bail!("Unknown aggregation: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Groundedness,
    AnswerRelevance,
    ContextRelevance,
}

/// A named feedback function: what to select from a record, how to score
/// it and how to combine the scores.
#[derive(Debug, Clone)]
pub struct FeedbackDefinition {
    pub name: String,
    pub kind: FeedbackKind,
    pub aggregation: Aggregation,
    pub higher_is_better: bool,
}

impl FeedbackDefinition {
    pub fn groundedness() -> Self {
        Self {
            name: "Groundedness".into(),
            kind: FeedbackKind::Groundedness,
            aggregation: Aggregation::Mean,
            higher_is_better: true,
        }
    }

    pub fn answer_relevance() -> Self {
        Self {
            name: "Answer Relevance".into(),
            kind: FeedbackKind::AnswerRelevance,
            aggregation: Aggregation::Mean,
            higher_is_better: true,
        }
    }

    pub fn context_relevance(aggregation: Aggregation) -> Self {
        Self {
            name: "Context Relevance".into(),
            kind: FeedbackKind::ContextRelevance,
            aggregation,
            higher_is_better: true,
        }
    }

    /// The three feedbacks attached to every record.
    pub fn default_set(context_aggregation: Aggregation) -> Vec<Self> {
        vec![
            Self::groundedness(),
            Self::answer_relevance(),
            Self::context_relevance(context_aggregation),
        ]
    }

    /// Argument maps for each provider call this feedback makes on a record.
    ///
    /// Groundedness scores each response sentence against the joined context;
    /// context relevance scores each retrieved chunk against the prompt.
    pub fn select(&self, input: &str, output: &str, contexts: &[String]) -> Vec<BTreeMap<String, String>> {
        match self.kind {
            FeedbackKind::Groundedness => {
                let source = contexts.join("\n\n");
                split_sentences(output)
                    .into_iter()
                    .map(|statement| args(&[("source", &source), ("statement", &statement)]))
                    .collect()
            }
            FeedbackKind::AnswerRelevance => vec![args(&[("prompt", input), ("response", output)])],
            FeedbackKind::ContextRelevance => contexts
                .iter()
                .map(|ctx| args(&[("question", input), ("context", ctx)]))
                .collect(),
        }
    }
}

fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Split text into sentences on `.`, `!` or `?` followed by whitespace, and
/// on line breaks. Code fences are kept as one unit.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut in_fence = false;
    let mut fence = String::new();

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            fence.push_str(line);
            fence.push('\n');
            if in_fence {
                sentences.push(fence.trim().to_string());
                fence.clear();
            }
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            fence.push_str(line);
            fence.push('\n');
            continue;
        }

        let mut current = String::new();
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            current.push(c);
            if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
                push_sentence(&mut sentences, &current);
                current.clear();
            }
        }
        push_sentence(&mut sentences, &current);
    }
    if !fence.trim().is_empty() {
        sentences.push(fence.trim().to_string());
    }

    sentences
}

fn push_sentence(out: &mut Vec<String>, s: &str) {
    let s = s.trim();
    if s.chars().any(|c| c.is_alphanumeric()) {
        out.push(s.to_string());
    }
}
