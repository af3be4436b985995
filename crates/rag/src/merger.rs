//! Context merging: formatting, budgeting, conflict flagging and confidence.

use crate::rules::Rules;
use crate::types::{EvidenceItem, MergedContext, RetrievalResult};
use std::sync::Arc;
use veritas_core::settings::MergeSettings;
use veritas_core::PipelineSettings;

const VECTOR_TRUNCATED: &str = "[... Vector DB context truncated for token limit ...]";
const WEB_TRUNCATED: &str = "[... Web search context truncated ...]";
const NO_DOCUMENTS: &str = "No relevant documents found.";
const NO_WEB_RESULTS: &str = "No web results found.";

/// Section framing that does not depend on the evidence text itself.
struct Framing {
    vector_count: usize,
    web_count: usize,
    vector_present: bool,
    web_present: bool,
    has_conflict: bool,
}

/// Combines the two retrieval results into one budgeted context.
pub struct ContextMerger {
    settings: MergeSettings,
    short_name: String,
    rules: Arc<Rules>,
}

impl ContextMerger {
    pub fn new(settings: &PipelineSettings, rules: Arc<Rules>) -> Self {
        Self {
            settings: settings.merge.clone(),
            short_name: settings.institution_short_name.clone(),
            rules,
        }
    }

    /// Merge both sources for `query`.
    ///
    /// `combined_text` never exceeds [`MergeSettings::max_chars`] characters:
    /// the framing is measured first, the rest of the budget is split by the
    /// vector ratio, and share left unused by one side goes to the other.
    pub fn merge(&self, vector: &RetrievalResult, web: &RetrievalResult, query: &str) -> MergedContext {
        let vector_block = format_vector(&vector.items);
        let web_block = format_web(&web.items);

        let has_conflict =
            !vector_block.is_empty() && !web_block.is_empty() && self.rules.is_time_sensitive(query);

        let framing = Framing {
            vector_count: vector.count(),
            web_count: web.count(),
            vector_present: !vector_block.is_empty(),
            web_present: !web_block.is_empty(),
            has_conflict,
        };

        let budget = self.settings.max_chars();
        let overhead = char_len(&self.assemble(&framing, "", ""));
        let available = budget.saturating_sub(overhead);

        let (vector_text, web_text) = self.balance(vector_block, web_block, available);

        let mut combined_text = self.assemble(&framing, &vector_text, &web_text);
        if char_len(&combined_text) > budget {
            combined_text = take_chars(&combined_text, budget);
        }

        let combined_confidence = self.combined_confidence(vector, web);

        tracing::debug!(
            "Merged context: vector {} chars, web {} chars, total {} of {} chars, confidence {:.2}",
            char_len(&vector_text),
            char_len(&web_text),
            char_len(&combined_text),
            budget,
            combined_confidence
        );
        if has_conflict {
            tracing::info!("Time-sensitive query with both sources; conflict guidance added");
        }

        MergedContext {
            combined_text,
            vector_text,
            web_text,
            vector_count: vector.count(),
            web_count: web.count(),
            vector_confidence: vector.confidence,
            web_confidence: web.confidence,
            combined_confidence,
            has_conflict,
        }
    }

    /// Weighted average when both sources contributed, a discounted single
    /// confidence when one did, zero otherwise.
    pub fn combined_confidence(&self, vector: &RetrievalResult, web: &RetrievalResult) -> f32 {
        let s = &self.settings;
        match (!vector.is_empty(), !web.is_empty()) {
            (true, true) => s.vector_weight * vector.confidence + s.web_weight * web.confidence,
            (true, false) => vector.confidence * s.single_source_discount,
            (false, true) => web.confidence * s.single_source_discount,
            (false, false) => 0.0,
        }
    }

    fn balance(&self, vector: String, web: String, available: usize) -> (String, String) {
        let vector_len = char_len(&vector);
        let web_len = char_len(&web);
        if vector_len + web_len <= available {
            return (vector, web);
        }

        tracing::debug!(
            "Balancing context: {} chars into {} chars",
            vector_len + web_len,
            available
        );

        let mut vector_cap = ((available as f32) * self.settings.vector_ratio).floor() as usize;
        vector_cap = vector_cap.min(available);
        let mut web_cap = available - vector_cap;

        if vector_len < vector_cap {
            web_cap += vector_cap - vector_len;
            vector_cap = vector_len;
        } else if web_len < web_cap {
            vector_cap += web_cap - web_len;
            web_cap = web_len;
        }

        (
            truncate_with_marker(vector, vector_cap, VECTOR_TRUNCATED),
            truncate_with_marker(web, web_cap, WEB_TRUNCATED),
        )
    }

    fn assemble(&self, framing: &Framing, vector_text: &str, web_text: &str) -> String {
        let short = &self.short_name;
        let mut parts: Vec<String> = Vec::with_capacity(4);

        parts.push(format!(
            "=== INFORMATION FROM TWO SOURCES ===\n\n\
             You have access to TWO independent information sources:\n\
             1. LOCAL KNOWLEDGE BASE: curated {short} documents (may be older)\n\
             2. LIVE WEB SEARCH: current information from {short} websites (most recent)\n\n\
             CRITICAL RULES:\n\
             - ALWAYS cite which source you're using: [Local] or [Web]\n\
             - If sources conflict, mention both perspectives\n\
             - Prioritize Web Search for time-sensitive information\n\
             - Use Local Knowledge Base for stable/established facts\n\
             - If NEITHER source has the information, say: \"I don't have that information in either source\"\n\
             - NEVER generate information not found in these sources"
        ));

        if framing.vector_present {
            parts.push(format!(
                "=== LOCAL KNOWLEDGE BASE ({} documents) ===\nSource: Curated {} documents\n{}",
                framing.vector_count, short, vector_text
            ));
        } else {
            parts.push(format!("=== LOCAL KNOWLEDGE BASE ===\n{}", NO_DOCUMENTS));
        }

        if framing.web_present {
            parts.push(format!(
                "=== LIVE WEB SEARCH RESULTS ({} results) ===\nSource: Current {} websites (fetched just now)\n{}",
                framing.web_count, short, web_text
            ));
        } else {
            parts.push(format!("=== LIVE WEB SEARCH RESULTS ===\n{}", NO_WEB_RESULTS));
        }

        if framing.has_conflict {
            parts.push(
                "POTENTIAL CONFLICT DETECTED:\n\
                 This query is time-sensitive. If Local and Web sources provide different information:\n\
                 - Prioritize Web Search (more current)\n\
                 - Mention that information may have changed\n\
                 - Cite both sources with their different information"
                    .to_string(),
            );
        }

        parts.join("\n\n")
    }
}

fn format_vector(items: &[EvidenceItem]) -> String {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.content.trim().is_empty())
        .map(|(i, item)| {
            format!(
                "[Local Document {}] (Relevance: {:.2}, Category: {})\nSource: {}\n{}",
                i + 1,
                item.score,
                item.category.as_deref().unwrap_or("general"),
                item.source_label,
                item.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

fn format_web(items: &[EvidenceItem]) -> String {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.content.trim().is_empty())
        .map(|(i, item)| {
            format!(
                "[Web Result {}]\nTitle: {}\nURL: {}\n{}",
                i + 1,
                item.title.as_deref().unwrap_or("Untitled"),
                item.source_label,
                item.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn take_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// Cut `text` to exactly `cap` characters, ending in `marker` when cut.
fn truncate_with_marker(text: String, cap: usize, marker: &str) -> String {
    if char_len(&text) <= cap {
        return text;
    }
    let suffix = format!("\n\n{}", marker);
    let suffix_len = char_len(&suffix);
    if cap <= suffix_len {
        return take_chars(marker, cap);
    }
    let mut truncated = take_chars(&text, cap - suffix_len);
    truncated.push_str(&suffix);
    truncated
}
