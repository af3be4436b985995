//! Checks that an answer addresses the question that was asked.
//!
//! A grounded answer can still miss the point: asked "who chairs the
//! department?", a model will happily describe the department. The checker
//! compares the question's shape with the answer and flags descriptive
//! answers to specific questions. An answer that admits missing information
//! is always relevant.

use crate::rules::{QuestionType, Rules};
use std::sync::Arc;
use veritas_core::PipelineSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceVerdict {
    pub is_relevant: bool,
    pub admits_missing: bool,
    pub question_type: QuestionType,
    pub issues: Vec<String>,
}

pub struct RelevanceChecker {
    rules: Arc<Rules>,
}

impl RelevanceChecker {
    pub fn new(rules: Arc<Rules>) -> Self {
        Self { rules }
    }

    /// Judge `answer` against the user's original `query`.
    pub fn check(&self, query: &str, answer: &str) -> RelevanceVerdict {
        let question_type = self.rules.question_type(query);

        if self.rules.admits_missing_info(answer) {
            return RelevanceVerdict {
                is_relevant: true,
                admits_missing: true,
                question_type,
                issues: Vec::new(),
            };
        }

        let mut issues = Vec::new();

        if !self.answers_question_type(answer, question_type) {
            issues.push(format!(
                "Response doesn't answer '{}' question. Query asks: '{}', but response provides general information.",
                question_type.as_str(),
                query
            ));
        }

        if matches!(question_type, QuestionType::Who | QuestionType::WhatSpecific)
            && !self.entity_mentioned(query, answer)
        {
            issues.push(
                "Query asks for specific entity/person, but response doesn't provide it".to_string(),
            );
        }

        if self.is_tangential(query, answer) {
            issues.push(
                "Response provides related information but doesn't answer the specific question"
                    .to_string(),
            );
        }

        if !issues.is_empty() {
            tracing::warn!("Answer not relevant to '{}': {:?}", query, issues);
        }

        RelevanceVerdict {
            is_relevant: issues.is_empty(),
            admits_missing: false,
            question_type,
            issues,
        }
    }

    fn answers_question_type(&self, answer: &str, question_type: QuestionType) -> bool {
        let matches = |re: &Option<regex::Regex>| re.as_ref().is_some_and(|re| re.is_match(answer));

        match question_type {
            QuestionType::Who => matches(&self.rules.person) || self.rules.role_words.is_match(answer),
            QuestionType::When => matches(&self.rules.date) || self.rules.time_words.is_match(answer),
            QuestionType::Where => self.rules.location_words.is_match(answer),
            _ => true,
        }
    }

    /// Whether the answer names the thing asked about, or at least some
    /// specific name or value. Queries without a recognizable entity pass.
    fn entity_mentioned(&self, query: &str, answer: &str) -> bool {
        let entity = self
            .rules
            .entity_patterns
            .iter()
            .find_map(|re| re.captures(query))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_lowercase());

        let Some(entity) = entity else {
            return true;
        };

        if !entity.is_empty() && answer.to_lowercase().contains(&entity) {
            return true;
        }

        self.rules
            .specific_value
            .as_ref()
            .is_some_and(|re| re.is_match(answer))
    }

    /// A descriptive opening is tangential unless the query itself asks
    /// what something offers or has.
    fn is_tangential(&self, query: &str, answer: &str) -> bool {
        let opening = answer.trim().to_lowercase();
        let descriptive = self
            .rules
            .tangential_openings
            .iter()
            .any(|o| opening.starts_with(o.as_str()));

        descriptive && !self.rules.topical_query_words.is_match(query)
    }
}

/// Text substituted for an answer that failed the relevance check.
pub fn admission_text(settings: &PipelineSettings) -> String {
    let mut text = format!(
        "I don't have that specific information in my knowledge base. Please contact the relevant {} office for accurate details.",
        settings.institution_short_name
    );
    if let Some(url) = &settings.help_url {
        text.push_str(&format!(" You can also check {}.", url));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> RelevanceChecker {
        RelevanceChecker::new(Arc::new(Rules::builtin().unwrap()))
    }

    #[test]
    fn test_tangential_who_answer() {
        let verdict = checker().check(
            "Who is the CS department chair?",
            "The CS department offers many courses in AI and systems [Local].",
        );
        assert!(!verdict.is_relevant);
        assert_eq!(verdict.question_type, QuestionType::Who);
        assert!(verdict.issues.len() >= 2);
    }

    #[test]
    fn test_named_person_is_relevant() {
        let verdict = checker().check(
            "Who is the CS department chair?",
            "The chair of Computer Science is Dr. Rivera [Local].",
        );
        assert!(verdict.is_relevant, "{:?}", verdict.issues);
    }

    #[test]
    fn test_admission_is_relevant() {
        let verdict = checker().check(
            "Who is the CS department chair?",
            "I don't have that specific information in my knowledge base.",
        );
        assert!(verdict.is_relevant);
        assert!(verdict.admits_missing);
    }

    #[test]
    fn test_when_needs_a_date() {
        let checker = checker();
        assert!(!checker
            .check("When does registration open?", "Registration is handled online [Web].")
            .is_relevant);
        assert!(checker
            .check("When does registration open?", "Registration opens April 3 [Web].")
            .is_relevant);
    }

    #[test]
    fn test_where_needs_a_location() {
        let checker = checker();
        assert!(!checker
            .check("Where can I get a parking permit?", "Permits cost $250 [Local].")
            .is_relevant);
        assert!(checker
            .check("Where can I get a parking permit?", "At the parking office in the garage [Local].")
            .is_relevant);
    }

    #[test]
    fn test_descriptive_answer_fits_topical_query() {
        let verdict = checker().check(
            "What programs does the department have?",
            "The department offers a BS and an MS in Computer Science [Local].",
        );
        assert!(verdict.is_relevant, "{:?}", verdict.issues);
    }

    #[test]
    fn test_admission_text_names_office() {
        let mut settings = PipelineSettings::default();
        assert!(admission_text(&settings).contains("relevant SFSU office"));

        settings.help_url = Some("https://help.example.edu".to_string());
        assert!(admission_text(&settings).ends_with("https://help.example.edu."));
    }
}
