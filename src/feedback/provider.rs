use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::definition::FeedbackKind;
use super::record::FeedbackCall;
use crate::llm::ChatModel;
use crate::models::ChatMessage;

const GRADER_SYSTEM: &str = "You are a meticulous evaluator. Think step by step, cite the \
     evidence you relied on, and finish with a line of the form `Score: <0-10>`.";

/// LLM-backed grader for the built-in feedback kinds. Every call asks for
/// chain-of-thought reasons and a 0-10 score, normalized to `[0, 1]`.
pub struct FeedbackProvider {
    llm: Arc<dyn ChatModel>,
}

impl FeedbackProvider {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Score one selected argument set.
    pub async fn evaluate(&self, kind: FeedbackKind, args: BTreeMap<String, String>) -> Result<FeedbackCall> {
        let prompt = grader_prompt(kind, &args)?;
        let reply = self
            .llm
            .complete(vec![ChatMessage::system(GRADER_SYSTEM), ChatMessage::user(prompt)])
            .await?;

        let (line, score) = score_line(&reply)
            .with_context(|| format!("No score found in grader reply: {}", truncate(&reply, 200)))?;

        Ok(FeedbackCall {
            args,
            score,
            reason: extract_reason(&reply, line),
        })
    }
}

fn arg<'a>(args: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str> {
    args.get(key)
        .map(String::as_str)
        .with_context(|| format!("Missing feedback argument: {key}"))
}

fn grader_prompt(kind: FeedbackKind, args: &BTreeMap<String, String>) -> Result<String> {
    let prompt = match kind {
        FeedbackKind::Groundedness => format!(
            "SOURCE:\n{}\n\nSTATEMENT:\n{}\n\n\
             Rate how well the SOURCE supports the STATEMENT on a scale of 0 to 10, \
             where 0 means no support and 10 means every claim is directly supported. \
             List the supporting evidence under `Supporting Evidence:` before the score.",
            arg(args, "source")?,
            arg(args, "statement")?
        ),
        FeedbackKind::AnswerRelevance => format!(
            "PROMPT:\n{}\n\nRESPONSE:\n{}\n\n\
             Rate how relevant the RESPONSE is to the PROMPT on a scale of 0 to 10, \
             where 0 is unrelated and 10 fully answers every part of the prompt. \
             Explain your judgement under `Criteria:` and `Supporting Evidence:` before the score.",
            arg(args, "prompt")?,
            arg(args, "response")?
        ),
        FeedbackKind::ContextRelevance => format!(
            "QUESTION:\n{}\n\nCONTEXT:\n{}\n\n\
             Rate how relevant the CONTEXT is to answering the QUESTION on a scale of 0 to 10, \
             where 0 is irrelevant and 10 contains everything needed. \
             Explain your judgement under `Criteria:` and `Supporting Evidence:` before the score.",
            arg(args, "question")?,
            arg(args, "context")?
        ),
    };
    Ok(prompt)
}

/// Find the last `Score: N` (or `N/10`) in a grader reply, normalized from
/// 0-10 to `[0, 1]` and clamped.
pub fn parse_score(reply: &str) -> Option<f64> {
    score_line(reply).map(|(_, score)| score)
}

/// Index of the line the score was read from, with the normalized score.
fn score_line(reply: &str) -> Option<(usize, f64)> {
    let lines: Vec<&str> = reply.lines().collect();
    lines.iter().enumerate().rev().find_map(|(idx, line)| {
        let lower = line.to_lowercase();
        let number = match lower.rfind("score") {
            Some(pos) => leading_number(
                lower[pos + "score".len()..]
                    .trim_start_matches(|c: char| c == ':' || c == '*' || c.is_whitespace()),
            )?,
            // A bare number on its own line
            None => lower.trim().trim_end_matches("/10").parse().ok()?,
        };
        Some((idx, (number / 10.0).clamp(0.0, 1.0)))
    })
}

fn leading_number(s: &str) -> Option<f64> {
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-'))
        .map_or(s.len(), |(i, _)| i);
    let token = s[..end].trim_end_matches('.');
    if token.is_empty() {
        return None;
    }
    token.parse().ok()
}

/// Every line except the one the score was parsed from, trimmed.
fn extract_reason(reply: &str, score_line: usize) -> String {
    reply
        .lines()
        .enumerate()
        .filter(|(idx, _)| *idx != score_line)
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct ScriptedGrader(&'static str);

    #[async_trait]
    impl ChatModel for ScriptedGrader {
        async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String> {
            Ok(self.0.to_string())
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn test_parse_score_normalizes() {
        assert_eq!(parse_score("Score: 7"), Some(0.7));
        assert_eq!(parse_score("**Score:** 10"), Some(1.0));
        assert_eq!(parse_score("Reasons...\nScore: 3/10"), Some(0.3));
    }

    #[test]
    fn test_parse_score_clamps() {
        assert_eq!(parse_score("Score: 14"), Some(1.0));
        assert_eq!(parse_score("Score: -2"), Some(0.0));
    }

    #[test]
    fn test_parse_score_uses_last_score_line() {
        let reply = "Score: 2 for the first claim\nOverall\nScore: 8";
        assert_eq!(parse_score(reply), Some(0.8));
    }

    #[test]
    fn test_parse_score_missing() {
        assert_eq!(parse_score("I cannot decide."), None);
    }

    #[test]
    fn test_extract_reason() {
        let reply = "Criteria: relevant\nSupporting Evidence: mentions st.columns\nScore: 9";
        assert_eq!(
            extract_reason(reply, 2),
            "Criteria: relevant\nSupporting Evidence: mentions st.columns"
        );
    }

    #[tokio::test]
    async fn test_reason_keeps_text_after_score_line() {
        let provider = FeedbackProvider::new(Arc::new(ScriptedGrader(
            "Score: 8\nThis score reflects the evidence.",
        )));
        let args = BTreeMap::from([
            ("prompt".to_string(), "q".to_string()),
            ("response".to_string(), "a".to_string()),
        ]);
        let call = provider
            .evaluate(FeedbackKind::AnswerRelevance, args)
            .await
            .unwrap();
        assert!((call.score - 0.8).abs() < 1e-9);
        assert_eq!(call.reason, "This score reflects the evidence.");
    }

    #[test]
    fn test_prompt_requires_arguments() {
        let args = BTreeMap::from([("prompt".to_string(), "q".to_string())]);
        assert!(grader_prompt(FeedbackKind::AnswerRelevance, &args).is_err());
    }

    #[tokio::test]
    async fn test_evaluate_builds_call() {
        let provider = FeedbackProvider::new(Arc::new(ScriptedGrader("Criteria: on topic\nScore: 6")));
        let args = BTreeMap::from([
            ("question".to_string(), "what is st.write?".to_string()),
            ("context".to_string(), "st.write prints anything".to_string()),
        ]);
        let call = provider
            .evaluate(FeedbackKind::ContextRelevance, args)
            .await
            .unwrap();
        assert!((call.score - 0.6).abs() < 1e-9);
        assert_eq!(call.reason, "Criteria: on topic");
        assert_eq!(call.args["question"], "what is st.write?");
    }

    #[tokio::test]
    async fn test_evaluate_unparseable_reply_errors() {
        let provider = FeedbackProvider::new(Arc::new(ScriptedGrader("no idea")));
        let args = BTreeMap::from([
            ("prompt".to_string(), "q".to_string()),
            ("response".to_string(), "a".to_string()),
        ]);
        assert!(provider.evaluate(FeedbackKind::AnswerRelevance, args).await.is_err());
    }
}
