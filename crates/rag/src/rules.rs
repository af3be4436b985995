//! Heuristic rule tables used by the merger, validator, relevance checker
//! and suggestion picker.
//!
//! Every phrase list and pattern is data: [`RuleSet`] carries the built-in
//! defaults and can be loaded from YAML, then compiled once into [`Rules`].
//! The matching is English-only and approximate. Phrase lists match
//! case-insensitively on word boundaries; patterns are compiled as written
//! and carry their own `(?i)` flag where case should not matter.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use veritas_core::{AppError, AppResult};

/// Expected answer shape of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Who,
    When,
    Where,
    Why,
    How,
    WhatSpecific,
    What,
    General,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Who => "who",
            QuestionType::When => "when",
            QuestionType::Where => "where",
            QuestionType::Why => "why",
            QuestionType::How => "how",
            QuestionType::WhatSpecific => "what specific",
            QuestionType::What => "what",
            QuestionType::General => "general",
        }
    }
}

/// Pattern mapping a question's surface form to its type. First match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRule {
    pub kind: QuestionType,
    pub pattern: String,
}

/// Follow-up questions offered when a query touches a topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestionTopic {
    /// Any of these (as word prefixes) selects the topic
    pub keywords: Vec<String>,

    /// When non-empty, one of these must also be present
    pub requires: Vec<String>,
    pub questions: Vec<String>,
}

/// Rule tables in their serializable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleSet {
    /// Phrases by which an answer admits it lacks the information
    pub admission_phrases: Vec<String>,
    pub forbidden_phrases: Vec<String>,
    pub speculation_words: Vec<String>,

    /// Phrases marking an answer that is itself an error message
    pub error_phrases: Vec<String>,
    pub recency_terms: Vec<String>,
    pub future_term_pattern: String,
    pub question_types: Vec<QuestionRule>,
    pub role_words: Vec<String>,
    pub person_pattern: String,
    pub date_pattern: String,
    pub time_words: Vec<String>,
    pub location_words: Vec<String>,

    /// Patterns whose first group is the entity a question asks about
    pub entity_patterns: Vec<String>,
    pub specific_value_pattern: String,

    /// Openings typical of answers that describe a topic instead of answering
    pub tangential_openings: Vec<String>,

    /// Query words that make a descriptive answer the right shape
    pub topical_query_words: Vec<String>,
    pub suggestions: Vec<SuggestionTopic>,
    pub default_suggestions: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn topic(keywords: &[&str], requires: &[&str], questions: &[&str]) -> SuggestionTopic {
    SuggestionTopic {
        keywords: strings(keywords),
        requires: strings(requires),
        questions: strings(questions),
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        let question = |kind: QuestionType, pattern: &str| QuestionRule {
            kind,
            pattern: pattern.to_string(),
        };

        Self {
            admission_phrases: strings(&[
                "don't have that information",
                "don't have that specific information",
                "don't have information about",
                "i don't have",
                "not available",
                "couldn't find",
                "no information about",
                "unable to find",
                "i don't know",
                "i'm not sure",
            ]),
            forbidden_phrases: strings(&[
                "according to the context",
                "the context states",
                "the context mentions",
                "based on my knowledge",
                "from my knowledge",
                "i know that",
                "from what i know",
                "i believe",
                "i think",
                "probably",
                "might be",
                "could be",
                "it seems",
            ]),
            speculation_words: strings(&[
                "probably",
                "likely",
                "perhaps",
                "maybe",
                "might",
                "could be",
                "possibly",
                "i think",
                "i believe",
                "it seems",
                "appears to be",
            ]),
            error_phrases: strings(&[
                "error processing",
                "trouble generating",
                "malformed",
                "corrupted",
            ]),
            recency_terms: strings(&[
                "current",
                "latest",
                "recent",
                "new",
                "upcoming",
                "this semester",
                "next semester",
            ]),
            future_term_pattern: r"(?i)\b(?:fall|spring|summer|winter)\s+20\d{2}\b".to_string(),
            question_types: vec![
                question(
                    QuestionType::Who,
                    r"(?i)^\s*(?:who\b|what\s+is\s+the\b.*\b(?:chair|director|head|dean)\b)",
                ),
                question(QuestionType::When, r"(?i)^\s*when\b"),
                question(QuestionType::Where, r"(?i)^\s*where\b"),
                question(QuestionType::Why, r"(?i)^\s*why\b"),
                question(QuestionType::How, r"(?i)^\s*how\b"),
                question(
                    QuestionType::WhatSpecific,
                    r"(?i)^\s*what\s+(?:is|are)\s+the\b.*\b(?:deadline|date|time|cost|price|fee|requirements?)\b",
                ),
                question(QuestionType::What, r"(?i)^\s*what\b"),
            ],
            role_words: strings(&["chair", "director", "head", "dean", "coordinator"]),
            person_pattern: r"\b(?:Dr\.?|Prof\.|Professor)\s+[A-Z][a-z]+".to_string(),
            date_pattern: r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\b|\b\d{1,2}/\d{1,2}\b|\b\d{4}\b".to_string(),
            time_words: strings(&["deadline", "date", "semester", "year", "month", "day"]),
            location_words: strings(&[
                "building", "room", "office", "floor", "campus", "location", "address",
            ]),
            entity_patterns: strings(&[
                r"(?i)who\s+is\s+the\s+([^?]+)",
                r"(?i)what\s+is\s+the\s+([^?]+)",
                r"(?i)who\s+are\s+the\s+([^?]+)",
            ]),
            specific_value_pattern: r"\b(?:Dr\.|Professor|[A-Z][a-z]+\s+[A-Z][a-z]+)".to_string(),
            tangential_openings: strings(&[
                "the cs department",
                "the computer science department",
                "the department offers",
                "the department provides",
                "the program includes",
                "there are many",
                "sfsu offers",
                "students can",
                "the university has",
            ]),
            topical_query_words: strings(&["offers", "provides", "has", "courses", "programs"]),
            suggestions: vec![
                topic(
                    &["cs", "course", "class", "csc"],
                    &["prerequisite", "requirement"],
                    &[
                        "What GPA do I need for CS courses?",
                        "Can I waive course prerequisites?",
                        "What are the core CS courses required for graduation?",
                    ],
                ),
                topic(
                    &["cs", "course", "class", "csc"],
                    &["665", "673", "601", "648"],
                    &[
                        "When is this course typically offered?",
                        "Who teaches this course?",
                        "What are the prerequisites for this course?",
                    ],
                ),
                topic(
                    &["cs", "course", "class", "csc"],
                    &[],
                    &[
                        "What CS electives are available?",
                        "How many units are CS courses?",
                        "Can I take CS courses pass/fail?",
                    ],
                ),
                topic(
                    &["financial aid", "fafsa", "scholarship", "tuition", "money", "fee"],
                    &[],
                    &[
                        "How do I apply for scholarships?",
                        "What is the FAFSA deadline?",
                        "Are there CS department-specific scholarships?",
                        "Can international students get financial aid?",
                    ],
                ),
                topic(
                    &["visa", "international", "f-1", "cpt", "opt", "i-20"],
                    &[],
                    &[
                        "How do I apply for CPT?",
                        "What is the difference between CPT and OPT?",
                        "How long can I work on OPT?",
                        "Where is the International Student Office?",
                    ],
                ),
                topic(
                    &["housing", "dorm", "apartment", "residence"],
                    &[],
                    &[
                        "How much does on-campus housing cost?",
                        "When is housing application due?",
                        "Are there graduate student housing options?",
                        "What amenities are included in housing?",
                    ],
                ),
                topic(
                    &["professor", "faculty", "teach", "instructor"],
                    &[],
                    &[
                        "How do I contact my professor?",
                        "What are professor office hours?",
                        "Who are the CS faculty members?",
                        "How do I schedule a meeting with my advisor?",
                    ],
                ),
                topic(
                    &["graduate", "masters", "ms", "grad", "thesis", "project"],
                    &[],
                    &[
                        "What are the MS in CS degree requirements?",
                        "Should I choose thesis or project option?",
                        "How long does the MS program take?",
                        "What is the minimum GPA requirement?",
                    ],
                ),
                topic(
                    &["admission", "apply", "application", "gre", "requirement"],
                    &[],
                    &[
                        "What are the CS program admission requirements?",
                        "Is the GRE required for CS admissions?",
                        "What is the application deadline?",
                        "What GPA do I need to get admitted?",
                    ],
                ),
            ],
            default_suggestions: strings(&[
                "What CS courses are offered this semester?",
                "How do I contact my academic advisor?",
                "What student resources are available?",
                "Tell me about the CS graduate program",
            ]),
        }
    }
}

impl RuleSet {
    /// Load a rule table from YAML. Keys left out keep their defaults.
    pub fn from_yaml_file(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Validation(format!("Failed to read rules file {:?}: {}", path, e))
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Validation(format!("Failed to parse rules file {:?}: {}", path, e))
        })
    }

    /// Compile every list and pattern.
    pub fn compile(&self) -> AppResult<Rules> {
        let question_types = self
            .question_types
            .iter()
            .map(|rule| Ok((rule.kind, compile_pattern(&rule.pattern)?)))
            .collect::<AppResult<Vec<_>>>()?
            .into_iter()
            .filter_map(|(kind, re)| re.map(|re| (kind, re)))
            .collect();

        let entity_patterns = self
            .entity_patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<AppResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        let suggestions = self
            .suggestions
            .iter()
            .map(|t| {
                Ok(CompiledTopic {
                    keywords: PhraseSet::prefixes(&t.keywords)?,
                    requires: PhraseSet::prefixes(&t.requires)?,
                    questions: t.questions.clone(),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Rules {
            admission: PhraseSet::words(&self.admission_phrases)?,
            forbidden: PhraseSet::words(&self.forbidden_phrases)?,
            speculation: PhraseSet::words(&self.speculation_words)?,
            error_phrases: PhraseSet::words(&self.error_phrases)?,
            recency: PhraseSet::words(&self.recency_terms)?,
            future_term: compile_pattern(&self.future_term_pattern)?,
            question_types,
            role_words: PhraseSet::words(&self.role_words)?,
            person: compile_pattern(&self.person_pattern)?,
            date: compile_pattern(&self.date_pattern)?,
            time_words: PhraseSet::words(&self.time_words)?,
            location_words: PhraseSet::words(&self.location_words)?,
            entity_patterns,
            specific_value: compile_pattern(&self.specific_value_pattern)?,
            tangential_openings: self
                .tangential_openings
                .iter()
                .map(|o| o.trim().to_lowercase())
                .filter(|o| !o.is_empty())
                .collect(),
            topical_query_words: PhraseSet::words(&self.topical_query_words)?,
            suggestions,
            default_suggestions: self.default_suggestions.clone(),
        })
    }
}

/// An empty pattern disables the check it feeds.
fn compile_pattern(pattern: &str) -> AppResult<Option<Regex>> {
    if pattern.trim().is_empty() {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|e| AppError::Validation(format!("Invalid rule pattern '{}': {}", pattern, e)))
}

/// A phrase list compiled into one case-insensitive alternation.
#[derive(Debug, Clone)]
pub struct PhraseSet {
    regex: Option<Regex>,
}

impl PhraseSet {
    /// Phrases matched as whole words.
    pub fn words(phrases: &[String]) -> AppResult<Self> {
        Self::build(phrases, true)
    }

    /// Phrases matched at the start of a word.
    pub fn prefixes(phrases: &[String]) -> AppResult<Self> {
        Self::build(phrases, false)
    }

    fn build(phrases: &[String], whole_word: bool) -> AppResult<Self> {
        let alternatives: Vec<String> = phrases
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| {
                let starts_word = p.chars().next().is_some_and(is_word_char);
                let ends_word = p.chars().last().is_some_and(is_word_char);
                format!(
                    "{}{}{}",
                    if starts_word { r"\b" } else { "" },
                    regex::escape(p),
                    if whole_word && ends_word { r"\b" } else { "" }
                )
            })
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { regex: None });
        }

        let pattern = format!("(?i)(?:{})", alternatives.join("|"));
        let regex = Regex::new(&pattern)
            .map_err(|e| AppError::Validation(format!("Invalid phrase list: {}", e)))?;
        Ok(Self { regex: Some(regex) })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(text))
    }

    /// Distinct matched phrases, lower-cased, in order of first appearance.
    pub fn find_all(&self, text: &str) -> Vec<String> {
        let Some(re) = &self.regex else {
            return Vec::new();
        };
        let mut found: Vec<String> = Vec::new();
        for m in re.find_iter(text) {
            let phrase = m.as_str().to_lowercase();
            if !found.contains(&phrase) {
                found.push(phrase);
            }
        }
        found
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[derive(Debug, Clone)]
struct CompiledTopic {
    keywords: PhraseSet,
    requires: PhraseSet,
    questions: Vec<String>,
}

/// Compiled rule tables, shared read-only by every stage.
#[derive(Debug, Clone)]
pub struct Rules {
    pub admission: PhraseSet,
    pub forbidden: PhraseSet,
    pub speculation: PhraseSet,
    pub error_phrases: PhraseSet,
    pub recency: PhraseSet,
    pub future_term: Option<Regex>,
    pub question_types: Vec<(QuestionType, Regex)>,
    pub role_words: PhraseSet,
    pub person: Option<Regex>,
    pub date: Option<Regex>,
    pub time_words: PhraseSet,
    pub location_words: PhraseSet,
    pub entity_patterns: Vec<Regex>,
    pub specific_value: Option<Regex>,
    pub tangential_openings: Vec<String>,
    pub topical_query_words: PhraseSet,
    suggestions: Vec<CompiledTopic>,
    default_suggestions: Vec<String>,
}

impl Rules {
    /// The built-in tables.
    pub fn builtin() -> AppResult<Self> {
        RuleSet::default().compile()
    }

    /// Built-in tables, or the YAML file at `path` when given.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => {
                tracing::info!("Loading rule tables from {:?}", path);
                RuleSet::from_yaml_file(path)?.compile()
            }
            None => Self::builtin(),
        }
    }

    pub fn admits_missing_info(&self, text: &str) -> bool {
        self.admission.is_match(text)
    }

    pub fn question_type(&self, query: &str) -> QuestionType {
        self.question_types
            .iter()
            .find(|(_, re)| re.is_match(query))
            .map(|(kind, _)| *kind)
            .unwrap_or(QuestionType::General)
    }

    /// Whether the query asks about something that may have changed recently.
    pub fn is_time_sensitive(&self, query: &str) -> bool {
        self.recency.is_match(query)
            || self.future_term.as_ref().is_some_and(|re| re.is_match(query))
    }

    /// Follow-up questions for the first matching topic, or the defaults.
    pub fn suggestions_for(&self, query: &str) -> Vec<String> {
        self.suggestions
            .iter()
            .find(|t| {
                t.keywords.is_match(query)
                    && (t.requires.regex.is_none() || t.requires.is_match(query))
            })
            .map(|t| t.questions.clone())
            .unwrap_or_else(|| self.default_suggestions.clone())
    }
}
