//! Grounded answer generation.
//!
//! The generator renders the dual-source prompt, calls the provider at a
//! fixed near-zero temperature, cleans the output and retries degenerate or
//! transiently failed calls with exponential backoff. It never returns an
//! error: a final failure becomes a labeled fallback result.

use crate::output::{clean_output, is_malformed};
use crate::query::count_citations;
use crate::types::{FallbackKind, GenerationRequest, GenerationResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use veritas_core::settings::GenerationSettings;
use veritas_core::{AppError, AppResult, Backoff, PipelineSettings};
use veritas_llm::{ChatMessage, LlmClient, LlmRequest};
use veritas_prompt::{build_prompt, PromptDefinition};

const CONTEXT_TRUNCATED: &str = "\n\n[Context truncated]";

/// Something that turns a generation request into an answer.
///
/// The admission queue dispatches to this; the concrete implementation is
/// chosen when the pipeline is assembled.
#[async_trait::async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> GenerationResult;
}

/// Provider-backed [`GenerationService`].
pub struct AnswerGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    settings: GenerationSettings,
    institution: String,
    short_name: String,
    help_url: Option<String>,
    backoff: Backoff,
}

impl AnswerGenerator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompt: PromptDefinition,
        settings: &PipelineSettings,
    ) -> Self {
        let generation = settings.generation.clone();
        let backoff = Backoff::from_millis(generation.backoff_base_ms, generation.backoff_max_ms);
        Self {
            client,
            model: model.into(),
            prompt,
            settings: generation,
            institution: settings.institution.clone(),
            short_name: settings.institution_short_name.clone(),
            help_url: settings.help_url.clone(),
            backoff,
        }
    }

    /// Provider request for one generation attempt.
    pub fn build_request(&self, request: &GenerationRequest) -> AppResult<LlmRequest> {
        let mut variables = HashMap::new();
        variables.insert("institution".to_string(), self.institution.clone());
        variables.insert("shortName".to_string(), self.short_name.clone());
        if let Some(url) = &self.help_url {
            variables.insert("helpUrl".to_string(), url.clone());
        }
        variables.insert("question".to_string(), request.query.clone());
        variables.insert(
            "context".to_string(),
            truncate_context(&request.context.combined_text, self.settings.max_context_chars),
        );
        if !request.feedback.is_empty() {
            let feedback: Vec<String> = request.feedback.iter().map(|f| format!("- {}", f)).collect();
            variables.insert("feedback".to_string(), feedback.join("\n"));
        }

        let built = build_prompt(&self.prompt, variables)?;

        let keep = self.settings.history_messages;
        let history_start = request.history.len().saturating_sub(keep);

        let mut messages = Vec::with_capacity(keep + 2);
        if let Some(system) = built.system {
            messages.push(ChatMessage::system(system));
        }
        messages.extend(request.history[history_start..].iter().cloned());
        messages.push(ChatMessage::user(built.user));

        Ok(LlmRequest::new(self.model.clone(), messages)
            .with_temperature(self.settings.temperature)
            .with_top_p(self.settings.top_p)
            .with_max_tokens(self.settings.max_tokens)
            .with_timeout(Duration::from_secs(self.settings.timeout_secs)))
    }
}

#[async_trait::async_trait]
impl GenerationService for AnswerGenerator {
    #[tracing::instrument(skip_all, fields(provider = %self.client.provider_name()))]
    async fn generate(&self, request: GenerationRequest) -> GenerationResult {
        let llm_request = match self.build_request(&request) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Failed to build answer prompt: {}", e);
                return GenerationResult::fallback(FallbackKind::Generic, e.to_string());
            }
        };

        tracing::debug!(
            "Generating answer: {} messages, {} chars, {} feedback items",
            llm_request.messages.len(),
            llm_request.content_chars(),
            request.feedback.len()
        );

        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 0..max_attempts {
            let last = attempt + 1 == max_attempts;

            match self.client.complete(&llm_request).await {
                Ok(response) => {
                    let answer = clean_output(&response.content);
                    if is_malformed(&answer) {
                        tracing::warn!(
                            "Malformed output on attempt {}/{}",
                            attempt + 1,
                            max_attempts
                        );
                        if last {
                            return GenerationResult::fallback(
                                FallbackKind::Malformed,
                                "model output was malformed",
                            );
                        }
                        self.backoff.wait(attempt).await;
                        continue;
                    }

                    let citations = count_citations(&answer).total();
                    return GenerationResult::answered(answer, citations);
                }
                Err(e) => {
                    tracing::warn!(
                        "Generation failed on attempt {}/{}: {}",
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    // Only rate limits and timeouts can clear up by waiting
                    if last || !e.is_transient() {
                        return GenerationResult::fallback(fallback_kind(&e), e.to_string());
                    }
                    self.backoff.wait(attempt).await;
                }
            }
        }

        GenerationResult::fallback(FallbackKind::Generic, "no generation attempts made")
    }
}

fn fallback_kind(error: &AppError) -> FallbackKind {
    match error {
        AppError::RateLimited(_) => FallbackKind::RateLimit,
        AppError::Timeout(_) => FallbackKind::Timeout,
        _ => FallbackKind::Generic,
    }
}

fn truncate_context(context: &str, max_chars: usize) -> String {
    if context.chars().count() <= max_chars {
        return context.to_string();
    }
    let mut truncated: String = context.chars().take(max_chars).collect();
    truncated.push_str(CONTEXT_TRUNCATED);
    truncated
}
