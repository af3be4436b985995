//! Prompt loader for YAML prompt definitions.
//!
//! Prompts ship inside the binary. A workspace can replace any of them by
//! placing `<id>.yml` in `.veritas/prompts/`.

use crate::types::PromptDefinition;
use std::path::Path;
use veritas_core::{AppError, AppResult};

/// Identifier of the grounded answer prompt.
pub const ANSWER_PROMPT_ID: &str = "answer.dual_source";

const BUILTIN_PROMPTS: &[(&str, &str)] = &[(
    ANSWER_PROMPT_ID,
    include_str!("../prompts/answer.dual_source.yml"),
)];

/// Load a prompt definition by ID.
///
/// The workspace override `.veritas/prompts/<id>.yml` wins over the
/// built-in definition of the same ID.
///
/// # Arguments
/// * `workspace_path` - Root workspace directory containing `.veritas/`
/// * `prompt_id` - Prompt identifier (e.g., "answer.dual_source")
///
/// # Returns
/// A parsed `PromptDefinition` or an error if not found/invalid.
///
/// # Example
/// ```no_run
/// use veritas_prompt::{load_prompt, ANSWER_PROMPT_ID};
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), ANSWER_PROMPT_ID)?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".veritas/prompts")
        .join(format!("{}.yml", prompt_id));

    let (contents, origin) = if prompt_file.exists() {
        tracing::debug!("Loading prompt override from: {:?}", prompt_file);
        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;
        (contents, prompt_file.display().to_string())
    } else {
        let builtin = BUILTIN_PROMPTS
            .iter()
            .find(|(id, _)| *id == prompt_id)
            .map(|(_, yaml)| yaml.to_string())
            .ok_or_else(|| AppError::Prompt(format!("Prompt not found: {}", prompt_id)))?;
        (builtin, "built-in".to_string())
    };

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML ({}): {}", origin, e))
    })?;

    validate_prompt(&definition, prompt_id)?;

    tracing::debug!("Loaded prompt: {} ({}, {})", definition.id, definition.title, origin);

    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition, expected_id: &str) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.id != expected_id {
        return Err(AppError::Prompt(format!(
            "Prompt file declares id '{}' but was loaded as '{}'",
            def.id, expected_id
        )));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_prompt;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn write_override(dir: &Path, id: &str, content: &str) {
        let prompts_dir = dir.join(".veritas/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(format!("{}.yml", id)), content).unwrap();
    }

    #[test]
    fn test_load_builtin_answer_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_prompt(temp_dir.path(), ANSWER_PROMPT_ID).unwrap();
        assert_eq!(prompt.id, ANSWER_PROMPT_ID);
        assert!(prompt.system.contains("[Local]"));
        assert!(prompt.template.contains("{{question}}"));
    }

    #[test]
    fn test_builtin_prompt_renders() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_prompt(temp_dir.path(), ANSWER_PROMPT_ID).unwrap();

        let mut vars = HashMap::new();
        vars.insert("institution".to_string(), "Example College".to_string());
        vars.insert("shortName".to_string(), "EC".to_string());
        vars.insert("question".to_string(), "When is the deadline?".to_string());
        vars.insert("context".to_string(), "LOCAL KNOWLEDGE BASE".to_string());

        let built = build_prompt(&prompt, vars).unwrap();
        let system = built.system.unwrap();
        assert!(system.contains("Example College"));
        assert!(!system.contains("{{"));
        assert!(built.user.contains("When is the deadline?"));
        assert!(!built.user.contains("previous answer was rejected"));
    }

    #[test]
    fn test_workspace_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            ANSWER_PROMPT_ID,
            r#"
id: answer.dual_source
title: "Custom"
apiVersion: "1.1"
template: "Q: {{question}}"
"#,
        );

        let prompt = load_prompt(temp_dir.path(), ANSWER_PROMPT_ID).unwrap();
        assert_eq!(prompt.title, "Custom");
        assert!(prompt.system.is_empty());
    }

    #[test]
    fn test_load_unknown_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "invalid", "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), "invalid").is_err());
    }

    #[test]
    fn test_mismatched_id_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            ANSWER_PROMPT_ID,
            r#"
id: something.else
title: "Other"
apiVersion: "1.0"
template: "Q: {{question}}"
"#,
        );
        assert!(load_prompt(temp_dir.path(), ANSWER_PROMPT_ID).is_err());
    }
}
