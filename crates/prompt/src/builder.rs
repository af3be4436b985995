//! Prompt builder for rendering system and user templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use std::collections::HashMap;
use veritas_core::{AppError, AppResult};

/// Build a prompt from a definition and input variables.
///
/// Both the system and the user template are rendered with the same
/// variables. An empty system template yields `system: None`. Every name in
/// `definition.required` must be present in `variables`.
///
/// # Arguments
/// * `definition` - Prompt definition loaded from YAML
/// * `variables` - Template variables (e.g., "question" -> user input)
///
/// # Example
/// ```no_run
/// use veritas_prompt::{build_prompt, PromptDefinition};
/// use std::collections::HashMap;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "When does registration open?".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let missing: Vec<&str> = definition
        .required
        .iter()
        .filter(|name| !variables.contains_key(name.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt {} is missing variables: {}",
            definition.id,
            missing.join(", ")
        )));
    }

    let system = if definition.system.trim().is_empty() {
        None
    } else {
        Some(render_template(&definition.system, &variables)?)
    };

    let user = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt {
        system,
        user,
        source_prompt_id: definition.id.clone(),
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
