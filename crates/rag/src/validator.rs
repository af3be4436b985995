//! Rule-based answer validation.
//!
//! Hard errors reject the answer and may trigger regeneration; warnings are
//! logged only. URLs are checked verbatim against the context the answer was
//! generated from.

use crate::query::count_citations;
use crate::rules::Rules;
use crate::types::{MergedContext, ValidationVerdict};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use veritas_core::settings::ValidationSettings;
use veritas_core::PipelineSettings;

static URL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).ok());

const URL_TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', '\'', '"'];

pub struct ResponseValidator {
    settings: ValidationSettings,
    rules: Arc<Rules>,
}

impl ResponseValidator {
    pub fn new(settings: ValidationSettings, rules: Arc<Rules>) -> Self {
        Self { settings, rules }
    }

    /// Check `answer` against the context it was generated from.
    pub fn validate(&self, answer: &str, context: &MergedContext, query: &str) -> ValidationVerdict {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let trimmed = answer.trim();
        let admits = self.rules.admits_missing_info(answer);
        let citations = count_citations(answer).total();

        if trimmed.chars().count() < self.settings.min_length {
            errors.push(format!(
                "Response too short (< {} chars)",
                self.settings.min_length
            ));
        }

        if self.rules.error_phrases.is_match(answer) {
            errors.push("Response contains error message".to_string());
        }

        if self.settings.dual_source_mode && !admits && citations < self.settings.min_citations {
            if citations == 0 {
                errors.push("No source citations found ([Local] or [Web] required)".to_string());
            } else {
                errors.push(format!(
                    "Insufficient citations (found {}, minimum {})",
                    citations, self.settings.min_citations
                ));
            }
        }

        for phrase in self.rules.forbidden.find_all(answer) {
            errors.push(format!("Contains forbidden phrase: '{}'", phrase));
        }

        for url in unsupported_urls(answer, &context.combined_text) {
            errors.push(format!("URL not found in context: {}", url));
        }

        let evidence_chars = context.vector_text.chars().count() + context.web_text.chars().count();

        if evidence_chars < self.settings.sparse_context_chars && !admits {
            warnings.push("Context lacks information but response doesn't admit it".to_string());
        }

        let answer_chars = answer.chars().count();
        if evidence_chars > self.settings.verbose_min_context
            && answer_chars as f32 > evidence_chars as f32 * self.settings.verbose_ratio
        {
            warnings.push(format!(
                "Response is suspiciously long compared to context (response: {}, context: {})",
                answer_chars, evidence_chars
            ));
        }

        let speculation = self.rules.speculation.find_all(answer);
        if !speculation.is_empty() {
            warnings.push(format!("Response contains speculation words: {:?}", speculation));
        }

        let is_valid = errors.is_empty();
        let can_retry = is_valid || errors.len() <= self.settings.max_retriable_errors;

        if is_valid {
            tracing::info!("Validation passed for '{}' ({} citations)", query, citations);
        } else {
            tracing::warn!("Validation failed for '{}': {:?}", query, errors);
        }
        if !warnings.is_empty() {
            tracing::debug!("Validation warnings: {:?}", warnings);
        }

        ValidationVerdict {
            is_valid,
            errors,
            warnings,
            can_retry,
            citation_count: citations,
        }
    }

    /// Whether a failed attempt (1-based) should be followed by another.
    pub fn should_regenerate(&self, verdict: &ValidationVerdict, attempt: u32) -> bool {
        !verdict.is_valid && verdict.can_retry && attempt < self.settings.max_regenerations
    }
}

/// URLs in `answer` that do not occur verbatim in `context`.
pub fn unsupported_urls(answer: &str, context: &str) -> Vec<String> {
    let Some(re) = URL_RE.as_ref() else {
        return Vec::new();
    };

    let mut invalid: Vec<String> = Vec::new();
    for m in re.find_iter(answer) {
        let url = m.as_str().trim_end_matches(URL_TRAILING);
        if url.is_empty() || context.contains(url) {
            continue;
        }
        if !invalid.iter().any(|u| u == url) {
            invalid.push(url.to_string());
        }
    }
    invalid
}

/// Safe answer used when validation keeps failing.
pub fn fallback_text(settings: &PipelineSettings) -> String {
    let website = settings
        .help_url
        .as_deref()
        .map(|url| format!("\n- Checking {}", url))
        .unwrap_or_default();

    format!(
        "I apologize, but I'm unable to provide a reliable answer to your question based on the information I have available. \
         This could mean:\n\n\
         1. The information isn't in my knowledge base\n\
         2. The current web search didn't return relevant results\n\
         3. I need more context to answer accurately\n\n\
         I'd recommend:\n\
         - Rephrasing your question with more details\n\
         - Contacting the relevant {} office directly{}\n\n\
         Would you like to try asking in a different way?",
        settings.institution_short_name, website
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ResponseValidator {
        ResponseValidator::new(
            ValidationSettings::default(),
            Arc::new(Rules::builtin().unwrap()),
        )
    }

    fn context(text: &str) -> MergedContext {
        MergedContext {
            combined_text: text.to_string(),
            vector_text: text.to_string(),
            ..MergedContext::default()
        }
    }

    const CPT_CONTEXT: &str = "CPT requires an offer letter. Apply at https://oip.sfsu.edu/cpt before the term starts.";

    #[test]
    fn test_grounded_answer_passes() {
        let verdict = validator().validate(
            "Submit your offer letter at https://oip.sfsu.edu/cpt. [Local]",
            &context(CPT_CONTEXT),
            "How do I apply for CPT?",
        );
        assert!(verdict.is_valid, "{:?}", verdict.errors);
        assert_eq!(verdict.citation_count, 1);
    }

    #[test]
    fn test_invented_url_rejected() {
        let verdict = validator().validate(
            "Apply at https://fake.sfsu.edu/cpt [Web].",
            &context(CPT_CONTEXT),
            "How do I apply for CPT?",
        );
        assert!(!verdict.is_valid);
        assert_eq!(
            verdict.errors,
            vec!["URL not found in context: https://fake.sfsu.edu/cpt".to_string()]
        );
        assert!(verdict.can_retry);
    }

    #[test]
    fn test_missing_citations_and_forbidden_phrases() {
        let verdict = validator().validate(
            "I think you probably need an offer letter for CPT.",
            &context(CPT_CONTEXT),
            "How do I apply for CPT?",
        );
        assert!(!verdict.is_valid);
        assert!(verdict.errors.iter().any(|e| e.starts_with("No source citations")));
        assert!(verdict
            .errors
            .contains(&"Contains forbidden phrase: 'i think'".to_string()));
        assert!(verdict
            .errors
            .contains(&"Contains forbidden phrase: 'probably'".to_string()));
        assert!(!verdict.can_retry);
        assert!(!verdict.warnings.is_empty());
    }

    #[test]
    fn test_admission_exempts_citation_floor() {
        let verdict = validator().validate(
            "I don't have that specific information in either my local knowledge base or current web results.",
            &MergedContext::default(),
            "What is the parking fee?",
        );
        assert!(verdict.is_valid, "{:?}", verdict.errors);
        assert!(verdict.warnings.is_empty());
    }

    #[test]
    fn test_short_answer_rejected() {
        let verdict = validator().validate("Yes [Local].", &context(CPT_CONTEXT), "Is CPT paid?");
        assert!(verdict.errors[0].starts_with("Response too short"));
    }

    #[test]
    fn test_should_regenerate_respects_ceiling() {
        let validator = validator();
        let retriable = ValidationVerdict {
            is_valid: false,
            errors: vec!["x".to_string()],
            can_retry: true,
            ..ValidationVerdict::default()
        };
        assert!(validator.should_regenerate(&retriable, 1));
        assert!(!validator.should_regenerate(&retriable, 2));

        let hopeless = ValidationVerdict {
            can_retry: false,
            ..retriable.clone()
        };
        assert!(!validator.should_regenerate(&hopeless, 1));

        let valid = ValidationVerdict {
            is_valid: true,
            ..ValidationVerdict::default()
        };
        assert!(!validator.should_regenerate(&valid, 1));
    }

    #[test]
    fn test_unsupported_urls_trims_punctuation() {
        let urls = unsupported_urls(
            "See (https://a.example.edu/x). Or https://b.example.edu, twice https://b.example.edu.",
            "source https://a.example.edu/x here",
        );
        assert_eq!(urls, vec!["https://b.example.edu".to_string()]);
    }

    #[test]
    fn test_fallback_text_mentions_office() {
        let text = fallback_text(&PipelineSettings::default());
        assert!(text.contains("relevant SFSU office"));
        assert!(!text.contains("Checking"));
    }
}
