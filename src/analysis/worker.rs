// src/analysis/worker.rs
use super::latex::render_document;
use super::prompts::{build_analysis_prompt, SYSTEM_PROMPT};
use super::AnalysisResult;
use crate::core::llm_client::CompletionProvider;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Total attempts per job, the first call included.
pub const MAX_ATTEMPTS: u32 = 2;

const CONTENT_PLACEHOLDER: &str = "Error: Content not generated.";

pub struct AnalysisWorker {
    provider: Arc<dyn CompletionProvider>,
    retry_delay: Duration,
}

impl AnalysisWorker {
    pub fn new(provider: Arc<dyn CompletionProvider>, retry_delay: Duration) -> Self {
        Self {
            provider,
            retry_delay,
        }
    }

    /// Never fails: the last attempt's error is folded into [`AnalysisResult::Error`].
    pub async fn analyze(&self, job_desc: &str, resume_text: &str) -> AnalysisResult {
        let prompt = build_analysis_prompt(job_desc, resume_text);
        let mut last_error = anyhow!("analysis was not attempted");

        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(&prompt).await {
                Ok(result) => {
                    debug!(attempt, model = self.provider.model_name(), "Analysis succeeded");
                    return result;
                }
                Err(e) => {
                    warn!(attempt, "Analysis attempt failed: {:#}", e);
                    last_error = e;
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        AnalysisResult::error(format!(
            "An error occurred during analysis after multiple retries. Details: {:#}",
            last_error
        ))
    }

    async fn attempt(&self, prompt: &str) -> Result<AnalysisResult> {
        let raw = self
            .provider
            .complete(SYSTEM_PROMPT, prompt)
            .await
            .context("LLM request failed")?;
        parse_analysis_response(&raw)
    }
}

/// Decodes the model's reply and renders both generated documents.
///
/// The reply must be a single JSON object carrying a score and a match analysis.
/// Missing generated content falls back to a placeholder inside the document.
pub fn parse_analysis_response(raw: &str) -> Result<AnalysisResult> {
    let value: Value =
        serde_json::from_str(raw.trim()).context("Response is not valid JSON")?;
    let object = value
        .as_object()
        .context("Response JSON is not an object")?;

    let resume_match_score = object
        .get("resume_match_score")
        .context("Response is missing resume_match_score")
        .and_then(coerce_score)?;

    let match_analysis = object
        .get("match_analysis")
        .and_then(Value::as_str)
        .context("Response is missing match_analysis")?
        .to_string();

    Ok(AnalysisResult::Success {
        resume_match_score,
        match_analysis,
        updated_resume_latex: render_document(generated_text(
            object.get("updated_resume_content"),
        )),
        cover_letter_latex: render_document(generated_text(object.get("cover_letter_content"))),
    })
}

fn generated_text(value: Option<&Value>) -> &str {
    match value {
        None => CONTENT_PLACEHOLDER,
        Some(Value::String(text)) => text,
        Some(_) => "",
    }
}

/// Accepts 87, 87.4 or "87"; anything else numeric is clamped into 0..=100.
fn coerce_score(value: &Value) -> Result<u8> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|score| score.is_finite())
    .with_context(|| format!("resume_match_score is not a number: {}", value))?;

    Ok(score.round().clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm_client::LlmError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    const VALID_REPLY: &str = r#"{
        "resume_match_score": 78,
        "match_analysis": "Good overlap on Rust and async.",
        "updated_resume_content": "Jane Doe & Co_Lead",
        "cover_letter_content": "Dear team, 100% motivated."
    }"#;

    /// Replays canned replies in order and counts every call.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyContent))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn worker_for(provider: Arc<ScriptedProvider>) -> AnalysisWorker {
        AnalysisWorker::new(provider, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_decode_failure_then_success_retries_once() {
        let provider = ScriptedProvider::new(vec![
            Ok("Sure! Here is your JSON: {".to_string()),
            Ok(VALID_REPLY.to_string()),
        ]);
        let result = worker_for(provider.clone()).analyze("job", "resume").await;

        assert!(result.is_success());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_two_failures_give_error_after_exactly_two_attempts() {
        let provider = ScriptedProvider::new(vec![
            Err(LlmError::Api {
                status: 503,
                message: "overloaded".to_string(),
            }),
            Ok("not json".to_string()),
            Ok(VALID_REPLY.to_string()),
        ]);
        let result = worker_for(provider.clone()).analyze("job", "resume").await;

        assert_eq!(provider.calls(), MAX_ATTEMPTS);
        match result {
            AnalysisResult::Error { match_analysis } => {
                assert!(match_analysis
                    .starts_with("An error occurred during analysis after multiple retries."));
                assert!(match_analysis.contains("not valid JSON"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_success_makes_one_attempt() {
        let provider = ScriptedProvider::new(vec![Ok(VALID_REPLY.to_string())]);
        let result = worker_for(provider.clone()).analyze("job", "resume").await;

        assert!(result.is_success());
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_parse_renders_escaped_documents() {
        match parse_analysis_response(VALID_REPLY).unwrap() {
            AnalysisResult::Success {
                resume_match_score,
                match_analysis,
                updated_resume_latex,
                cover_letter_latex,
            } => {
                assert_eq!(resume_match_score, 78);
                assert_eq!(match_analysis, "Good overlap on Rust and async.");
                assert!(updated_resume_latex.contains(r"Jane Doe \& Co\_Lead"));
                assert!(cover_letter_latex.contains(r"100\% motivated"));
                assert!(cover_letter_latex.contains(r"\begin{document}"));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_content_uses_placeholder() {
        let reply = r#"{"resume_match_score": 40, "match_analysis": "Weak"}"#;
        match parse_analysis_response(reply).unwrap() {
            AnalysisResult::Success {
                updated_resume_latex,
                cover_letter_latex,
                ..
            } => {
                assert!(updated_resume_latex.contains("Error: Content not generated."));
                assert!(cover_letter_latex.contains("Error: Content not generated."));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_fields_fail() {
        assert!(parse_analysis_response(r#"{"match_analysis": "x"}"#).is_err());
        assert!(parse_analysis_response(r#"{"resume_match_score": 50}"#).is_err());
        assert!(parse_analysis_response(r#"[1, 2]"#).is_err());
        assert!(parse_analysis_response("").is_err());
    }

    #[test]
    fn test_score_coercion() {
        let score = |raw: &str| match parse_analysis_response(&format!(
            r#"{{"resume_match_score": {}, "match_analysis": ""}}"#,
            raw
        )) {
            Ok(AnalysisResult::Success {
                resume_match_score, ..
            }) => Some(resume_match_score),
            _ => None,
        };

        assert_eq!(score("64"), Some(64));
        assert_eq!(score("64.6"), Some(65));
        assert_eq!(score(r#""72""#), Some(72));
        assert_eq!(score(r#""90%""#), Some(90));
        assert_eq!(score("140"), Some(100));
        assert_eq!(score("-3"), Some(0));
        assert_eq!(score(r#""high""#), None);
        assert_eq!(score("null"), None);
    }
}
