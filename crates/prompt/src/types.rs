//! Prompt types for Veritas.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Variables the caller must supply; rendering fails if any is missing
    #[serde(default)]
    pub required: Vec<String>,

    /// System message template with Handlebars syntax
    #[serde(default)]
    pub system: String,

    /// User message template with Handlebars syntax
    pub template: String,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (absent when the definition has no system template)
    pub system: Option<String>,

    /// User message
    pub user: String,

    /// ID of the definition this prompt was rendered from
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: test.prompt
title: Test Prompt
apiVersion: "1.0"
required: [question, context]
system: "You answer for {{institution}}."
template: "{{question}}"
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "test.prompt");
        assert_eq!(def.required, vec!["question", "context"]);
        assert_eq!(def.system, "You answer for {{institution}}.");
    }

    #[test]
    fn test_system_and_required_are_optional() {
        let yaml = r#"
id: bare
title: Bare
apiVersion: "1.0"
template: "{{question}}"
"#;
        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(def.system.is_empty());
        assert!(def.required.is_empty());
    }
}
