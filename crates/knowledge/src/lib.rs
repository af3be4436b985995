//! Knowledge sources for grounded answering.
//!
//! Two independent sources feed every answer: a curated document store
//! (in-memory JSONL or Supabase, ranked by hybrid similarity + keyword
//! scoring) and a live web search adapter.

pub mod embeddings;
pub mod keywords;
pub mod memory;
pub mod store;
pub mod supabase;
pub mod types;
pub mod web;

pub use embeddings::{create_provider, EmbeddingProvider};
pub use keywords::KeywordExtractor;
pub use memory::MemoryIndex;
pub use store::{DocumentIndex, HybridStore, KnowledgeStore};
pub use supabase::SupabaseIndex;
pub use types::{Document, VerifiedFact, WebPage};
pub use web::{create_live_search, DisabledSearch, LiveSearch};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use veritas_core::settings::KnowledgeSettings;
use veritas_core::{AppError, AppResult};

/// Open the configured document store.
///
/// Relative JSONL paths are resolved against `workspace`.
pub async fn open_knowledge_store(
    settings: &KnowledgeSettings,
    workspace: &Path,
) -> AppResult<Arc<dyn KnowledgeStore>> {
    let embedder = create_provider(&settings.embedding)?;

    let index: Arc<dyn DocumentIndex> = match settings.backend.as_str() {
        "memory" => {
            let resolve = |p: &PathBuf| -> PathBuf {
                if p.is_absolute() {
                    p.clone()
                } else {
                    workspace.join(p)
                }
            };
            let documents = settings.documents_path.as_ref().map(resolve);
            let facts = settings.verified_facts_path.as_ref().map(resolve);
            Arc::new(MemoryIndex::load(embedder, documents.as_deref(), facts.as_deref()).await?)
        }
        "supabase" => Arc::new(SupabaseIndex::from_env(
            &settings.supabase_url_env,
            &settings.supabase_key_env,
            embedder,
        )?),
        other => {
            return Err(AppError::Config(format!(
                "Unknown knowledge backend: {}. Supported: memory, supabase",
                other
            )))
        }
    };

    tracing::info!("Knowledge store: {}", index.name());

    Ok(Arc::new(HybridStore::new(
        index,
        KeywordExtractor::new(settings.important_terms.clone()),
        settings.keyword_limit,
        settings.keyword_candidates,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_memory_store_relative_path() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("docs.jsonl"),
            r#"{"id": "opt", "content": "OPT applications are filed after the I-20 recommendation.", "source": "oip.example.edu/opt"}"#,
        )
        .unwrap();

        let settings = KnowledgeSettings {
            documents_path: Some(PathBuf::from("docs.jsonl")),
            ..KnowledgeSettings::default()
        };

        let store = open_knowledge_store(&settings, temp_dir.path())
            .await
            .unwrap();
        assert_eq!(store.name(), "memory");

        let docs = store.search("OPT applications", 5, 0.1).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "opt");
    }

    #[tokio::test]
    async fn test_unknown_backend() {
        let settings = KnowledgeSettings {
            backend: "pinecone".to_string(),
            ..KnowledgeSettings::default()
        };
        let result = open_knowledge_store(&settings, Path::new(".")).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
