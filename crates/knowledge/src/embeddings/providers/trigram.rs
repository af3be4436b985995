//! Offline embedding provider built from hashed character trigrams.

use crate::embeddings::EmbeddingProvider;
use std::collections::HashMap;
use veritas_core::AppResult;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "how", "who", "when", "where", "do", "does",
];

/// Deterministic feature-hashing embedder for development and offline use.
///
/// Each content word contributes to the slot of the whole word and to the
/// slots of its character trigrams. Not semantic, but stable and cheap, and
/// texts sharing vocabulary land close together.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn slot(&self, feature: &str, seed: u64) -> usize {
        let hash = feature
            .bytes()
            .fold(seed, |acc, b| acc.wrapping_mul(0x100_0000_01b3) ^ u64::from(b));
        (hash % self.dimensions as u64) as usize
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];
        let lower = text.to_lowercase();

        let mut counts: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        {
            *counts.entry(word).or_insert(0) += 1;
        }

        for (word, count) in counts {
            let weight = (count as f32).sqrt();
            vector[self.slot(word, 0xcbf2_9ce4_8422_2325)] += count as f32;

            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                vector[self.slot(&trigram, 0x8422_2325_cbf2_9ce4)] += weight;
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::cosine_similarity;

    #[tokio::test]
    async fn test_unit_length() {
        let provider = TrigramProvider::new(256);
        let embedding = provider.embed("curricular practical training").await.unwrap();
        assert_eq!(embedding.len(), 256);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = TrigramProvider::new(256);
        let a = provider.embed("housing deadline").await.unwrap();
        let b = provider.embed("housing deadline").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let provider = TrigramProvider::new(384);
        let query = provider.embed("apply for CPT authorization").await.unwrap();
        let related = provider
            .embed("CPT authorization requires an application to the international office")
            .await
            .unwrap();
        let unrelated = provider.embed("parking permits for the garage").await.unwrap();

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_stop_words_only_is_zero_vector() {
        let provider = TrigramProvider::new(64);
        let embedding = provider.embed("what is the").await.unwrap();
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_utf8_text() {
        let provider = TrigramProvider::new(64);
        let embedding = provider.embed("Matrícula estudiantes ñandú 🎓").await.unwrap();
        assert_eq!(embedding.len(), 64);
    }
}
