//! Pipeline settings loaded from the `pipeline` section of `.veritas/config.yaml`.
//!
//! Every field has a default, so a config file only needs to name the values
//! it changes. Keys are camelCase in YAML.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Tunables for the whole answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Full institution name, used to scope web queries and in admissions
    pub institution: String,

    /// Short name appended to enhanced queries (e.g. "SFSU")
    pub institution_short_name: String,

    /// Lower-case names that mark a query as already scoped
    pub institution_aliases: Vec<String>,

    /// Office or page users are pointed at when information is missing
    pub help_url: Option<String>,

    pub retrieval: RetrievalSettings,
    pub merge: MergeSettings,
    pub generation: GenerationSettings,
    pub validation: ValidationSettings,
    pub queue: QueueSettings,
    pub cache: CacheSettings,

    /// Remove `[Local]`/`[Web]` tags from user-facing answers
    pub strip_citations: bool,

    pub knowledge: KnowledgeSettings,
    pub web: WebSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            institution: "San Francisco State University".to_string(),
            institution_short_name: "SFSU".to_string(),
            institution_aliases: vec!["sfsu".to_string(), "san francisco state".to_string()],
            help_url: None,
            retrieval: RetrievalSettings::default(),
            merge: MergeSettings::default(),
            generation: GenerationSettings::default(),
            validation: ValidationSettings::default(),
            queue: QueueSettings::default(),
            cache: CacheSettings::default(),
            strip_citations: true,
            knowledge: KnowledgeSettings::default(),
            web: WebSettings::default(),
        }
    }
}

/// Dual-source retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    pub vector_top_k: usize,
    pub vector_threshold: f32,
    pub web_top_results: usize,
    /// Upper bound on a single adapter call; a timed-out side counts as empty
    pub adapter_timeout_secs: u64,
    /// Verified facts above this confidence short-circuit retrieval
    pub verified_fact_threshold: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            vector_top_k: 15,
            vector_threshold: 0.15,
            web_top_results: 3,
            adapter_timeout_secs: 20,
            verified_fact_threshold: 0.75,
        }
    }
}

/// Context merge budget and confidence weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeSettings {
    pub max_total_tokens: usize,
    pub chars_per_token: usize,
    /// Share of the body budget reserved for local documents
    pub vector_ratio: f32,
    pub vector_weight: f32,
    pub web_weight: f32,
    pub single_source_discount: f32,
    /// Fixed confidence assigned to a non-empty web result set
    pub web_confidence: f32,
}

impl MergeSettings {
    /// Character budget for the whole merged context.
    pub fn max_chars(&self) -> usize {
        self.max_total_tokens.saturating_mul(self.chars_per_token)
    }
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            max_total_tokens: 7500,
            chars_per_token: 4,
            vector_ratio: 0.6,
            vector_weight: 0.6,
            web_weight: 0.4,
            single_source_discount: 0.8,
            web_confidence: 0.85,
        }
    }
}

/// Generation provider call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_context_chars: usize,
    pub history_messages: usize,
    /// Provider attempts per generation request (first call included)
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.9,
            max_tokens: 2000,
            timeout_secs: 45,
            max_context_chars: 30_000,
            history_messages: 6,
            max_attempts: 2,
            backoff_base_ms: 1000,
            backoff_max_ms: 8000,
        }
    }
}

/// Validator thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationSettings {
    pub dual_source_mode: bool,
    pub min_length: usize,
    pub min_citations: usize,
    pub max_regenerations: u32,
    /// Invalid answers with more errors than this are not worth regenerating
    pub max_retriable_errors: usize,
    pub sparse_context_chars: usize,
    pub verbose_ratio: f32,
    pub verbose_min_context: usize,
    /// Optional YAML file replacing the built-in rule tables
    pub rules_file: Option<PathBuf>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            dual_source_mode: true,
            min_length: 20,
            min_citations: 1,
            max_regenerations: 2,
            max_retriable_errors: 2,
            sparse_context_chars: 100,
            verbose_ratio: 1.5,
            verbose_min_context: 500,
            rules_file: None,
        }
    }
}

/// Admission queue and rate limiter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueSettings {
    pub requests_per_minute: u32,
    pub tokens_per_minute: u64,
    pub safety_factor: f32,
    /// Token estimate recorded for each provider call
    pub estimated_tokens: u64,
    pub wait_timeout_secs: u64,
    /// Minimum gap between dispatches; derived from the rpm when unset
    pub min_interval_ms: Option<u64>,
}

impl QueueSettings {
    /// Effective minimum interval between two dispatches, in milliseconds.
    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
            .unwrap_or_else(|| 60_000 / u64::from(self.requests_per_minute.max(1)))
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 14,
            tokens_per_minute: 14_400,
            safety_factor: 0.9,
            estimated_tokens: 1500,
            wait_timeout_secs: 120,
            min_interval_ms: None,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 100,
            ttl_secs: 3600,
        }
    }
}

/// Knowledge store backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KnowledgeSettings {
    /// "memory" or "supabase"
    pub backend: String,
    /// JSONL file of documents for the memory backend
    pub documents_path: Option<PathBuf>,
    /// JSONL file of verified facts for the memory backend
    pub verified_facts_path: Option<PathBuf>,
    pub supabase_url_env: String,
    pub supabase_key_env: String,
    pub embedding: EmbeddingSettings,
    /// Terms promoted to the front of the keyword list when present in a query
    pub important_terms: Vec<String>,
    pub keyword_limit: usize,
    pub keyword_candidates: usize,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        let important_terms = [
            "cpt", "opt", "f-1", "i-20", "gpa", "fafsa", "housing", "financial aid",
            "international", "student", "visa", "scholarship", "course", "cs", "degree",
            "graduate", "undergraduate", "registration", "professor", "faculty", "advisor",
            "office hours", "tuition",
        ];

        Self {
            backend: "memory".to_string(),
            documents_path: None,
            verified_facts_path: None,
            supabase_url_env: "SUPABASE_URL".to_string(),
            supabase_key_env: "SUPABASE_KEY".to_string(),
            embedding: EmbeddingSettings::default(),
            important_terms: important_terms.iter().map(|t| t.to_string()).collect(),
            keyword_limit: 5,
            keyword_candidates: 20,
        }
    }
}

/// Embedding provider used by the knowledge stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// "trigram" or "ollama"
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

/// Live web search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSettings {
    /// "auto", "tavily", "brave" or "none"
    pub provider: String,
    pub tavily_key_env: String,
    pub brave_key_env: String,
    pub fetch_timeout_secs: u64,
    pub max_page_chars: usize,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            provider: "auto".to_string(),
            tavily_key_env: "TAVILY_API_KEY".to_string(),
            brave_key_env: "BRAVE_API_KEY".to_string(),
            fetch_timeout_secs: 5,
            max_page_chars: 3000,
        }
    }
}

impl PipelineSettings {
    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> AppResult<()> {
        let unit = |name: &str, value: f32| -> AppResult<()> {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
            Ok(())
        };

        unit("merge.vectorRatio", self.merge.vector_ratio)?;
        unit("merge.vectorWeight", self.merge.vector_weight)?;
        unit("merge.webWeight", self.merge.web_weight)?;
        unit("merge.singleSourceDiscount", self.merge.single_source_discount)?;
        unit("merge.webConfidence", self.merge.web_confidence)?;
        unit("retrieval.verifiedFactThreshold", self.retrieval.verified_fact_threshold)?;

        if self.queue.safety_factor <= 0.0 || self.queue.safety_factor > 1.0 {
            return Err(AppError::Config(format!(
                "queue.safetyFactor must be in (0, 1], got {}",
                self.queue.safety_factor
            )));
        }

        if self.queue.requests_per_minute == 0 {
            return Err(AppError::Config(
                "queue.requestsPerMinute must be positive".to_string(),
            ));
        }

        if self.cache.capacity == 0 {
            return Err(AppError::Config("cache.capacity must be positive".to_string()));
        }

        if self.merge.max_chars() == 0 {
            return Err(AppError::Config("merge budget must be positive".to_string()));
        }

        // A merged context longer than the generator accepts would be cut
        // again from the end, losing the web section and conflict guidance
        if self.merge.max_chars() > self.generation.max_context_chars {
            return Err(AppError::Config(format!(
                "merge budget ({} chars) exceeds generation.maxContextChars ({})",
                self.merge.max_chars(),
                self.generation.max_context_chars
            )));
        }

        if self.generation.max_attempts == 0 {
            return Err(AppError::Config(
                "generation.maxAttempts must be at least 1".to_string(),
            ));
        }

        match self.knowledge.backend.as_str() {
            "memory" | "supabase" => {}
            other => {
                return Err(AppError::Config(format!(
                    "Unknown knowledge backend: {}. Supported: memory, supabase",
                    other
                )))
            }
        }

        match self.web.provider.as_str() {
            "auto" | "tavily" | "brave" | "none" => Ok(()),
            other => Err(AppError::Config(format!(
                "Unknown web provider: {}. Supported: auto, tavily, brave, none",
                other
            ))),
        }
    }

    /// Whether the query already names the institution.
    pub fn mentions_institution(&self, query: &str) -> bool {
        let lower = query.to_lowercase();
        lower.contains(&self.institution.to_lowercase())
            || self
                .institution_aliases
                .iter()
                .any(|alias| lower.contains(alias.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.retrieval.vector_top_k, 15);
        assert_eq!(settings.merge.max_chars(), 30_000);
        assert!(settings.merge.max_chars() <= settings.generation.max_context_chars);
        assert_eq!(settings.queue.min_interval_ms(), 60_000 / 14);
        assert_eq!(settings.cache.capacity, 100);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
institution: Example College
queue:
  requestsPerMinute: 10
merge:
  vectorRatio: 0.5
"#;
        let settings: PipelineSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.institution, "Example College");
        assert_eq!(settings.queue.requests_per_minute, 10);
        assert_eq!(settings.queue.wait_timeout_secs, 120);
        assert_eq!(settings.merge.vector_ratio, 0.5);
        assert_eq!(settings.merge.chars_per_token, 4);
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let mut settings = PipelineSettings::default();
        settings.merge.vector_ratio = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_backend() {
        let mut settings = PipelineSettings::default();
        settings.knowledge.backend = "sqlite".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_merge_budget_over_context_limit() {
        let mut settings = PipelineSettings::default();
        assert!(settings.validate().is_ok());

        settings.merge.max_total_tokens = 8000;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("generation.maxContextChars"));

        settings.generation.max_context_chars = 32_000;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_explicit_min_interval() {
        let mut settings = QueueSettings::default();
        settings.min_interval_ms = Some(250);
        assert_eq!(settings.min_interval_ms(), 250);
    }

    #[test]
    fn test_mentions_institution() {
        let settings = PipelineSettings::default();
        assert!(settings.mentions_institution("When does SFSU start?"));
        assert!(settings.mentions_institution("san francisco state university housing"));
        assert!(!settings.mentions_institution("Who chairs computer science?"));
    }
}
