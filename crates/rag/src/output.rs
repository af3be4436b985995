//! Post-processing of raw model output.

use std::collections::HashMap;

const REASONING_CLOSE: &str = "</think>";

/// Visible answer: reasoning blocks dropped, decorative glyphs removed, trimmed.
pub fn clean_output(raw: &str) -> String {
    remove_decorative(strip_reasoning(raw)).trim().to_string()
}

/// Drop everything up to the last reasoning close tag.
pub fn strip_reasoning(text: &str) -> &str {
    match text.rfind(REASONING_CLOSE) {
        Some(idx) => &text[idx + REASONING_CLOSE.len()..],
        None => text,
    }
}

fn is_decorative(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1F5FF
            | 0x1F600..=0x1F64F
            | 0x1F680..=0x1F6FF
            | 0x1F1E0..=0x1F1FF
            | 0x1F900..=0x1F9FF
            | 0x1FA70..=0x1FAFF
            | 0x2600..=0x26FF
            | 0x2702..=0x27B0
            | 0xFE0F
            | 0x200D
    )
}

/// Remove emoji and pictographs.
pub fn remove_decorative(text: &str) -> String {
    text.chars().filter(|c| !is_decorative(*c)).collect()
}

/// Whether the output looks degenerate rather than like an answer.
///
/// Flags text under 10 characters, one character making up more than 60% of
/// a text over 50 characters, a 2-4 character opening repeated more than ten
/// times, or more than half underscores or 30% of either parenthesis.
pub fn is_malformed(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len < 10 {
        return true;
    }

    if len > 50 {
        let mut counts: HashMap<char, usize> = HashMap::new();
        for c in &chars {
            *counts.entry(*c).or_insert(0) += 1;
        }
        let max_count = counts.values().copied().max().unwrap_or(0);
        if max_count as f64 > len as f64 * 0.6 {
            return true;
        }
    }

    for pattern_len in 2..=4 {
        if len < pattern_len * 10 {
            continue;
        }
        let pattern = &chars[..pattern_len];
        let repeats = chars
            .chunks_exact(pattern_len)
            .take_while(|chunk| *chunk == pattern)
            .count();
        if repeats > 10 {
            return true;
        }
    }

    let share = |target: char| chars.iter().filter(|c| **c == target).count() as f64 / len as f64;
    share('_') > 0.5 || share('(') > 0.3 || share(')') > 0.3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_reasoning_keeps_last_segment() {
        assert_eq!(
            strip_reasoning("<think>plan</think>draft<think>more</think> Final [Local]."),
            " Final [Local]."
        );
        assert_eq!(strip_reasoning("No tags here."), "No tags here.");
    }

    #[test]
    fn test_clean_output_removes_emoji() {
        assert_eq!(
            clean_output("<think>x</think>  Apply online \u{1F393}\u{2705} [Web]. "),
            "Apply online  [Web]."
        );
    }

    #[test]
    fn test_malformed_patterns() {
        assert!(is_malformed("short"));
        assert!(is_malformed(&"Hh(".repeat(20)));
        assert!(is_malformed(&"ab".repeat(30)));
        assert!(is_malformed(&format!("{}{}", "H".repeat(50), " answer text")));
        assert!(is_malformed(&"__x".repeat(10)));
    }

    #[test]
    fn test_normal_answer_not_malformed() {
        assert!(!is_malformed(
            "To apply for CPT, get an offer letter and submit the CPT request form [Web]."
        ));
        assert!(!is_malformed("Room 1A (Library) [Local]"));
    }
}
