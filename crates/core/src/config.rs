//! Configuration management for Veritas.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.veritas/config.yaml)
//!
//! The configuration is workspace-centric, with local state stored in `.veritas/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::settings::PipelineSettings;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .veritas/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Generation provider ("ollama", "openai", "groq")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key for the generation provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Answering pipeline settings
    pub pipeline: PipelineSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// OpenAI-compatible chat completions API (OpenAI, Groq)
    OpenAiCompatible {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model name configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAiCompatible { model, .. } | Self::Ollama { model, .. } => model,
        }
    }

    /// Custom endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenAiCompatible { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    pipeline: Option<PipelineSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

/// Providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "openai", "groq"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            llm: None,
            pipeline: PipelineSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, the YAML file and defaults.
    ///
    /// Environment variables:
    /// - `VERITAS_WORKSPACE`: Override workspace path
    /// - `VERITAS_CONFIG`: Path to config file
    /// - `VERITAS_PROVIDER`: Generation provider
    /// - `VERITAS_MODEL`: Model identifier
    /// - `VERITAS_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use veritas_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("VERITAS_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("VERITAS_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        config = config.reload_file()?;

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("VERITAS_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("VERITAS_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("VERITAS_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge the config file (explicit or `<workspace>/.veritas/config.yaml`) if present.
    pub fn reload_file(self) -> AppResult<Self> {
        let config_path = match self.config_file {
            Some(ref cf) => cf.clone(),
            None => self.veritas_dir().join("config.yaml"),
        };

        if config_path.exists() {
            self.merge_yaml(&config_path)
        } else if self.config_file.is_some() {
            Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )))
        } else {
            Ok(self)
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        tracing::debug!("Merged config file {:?}", path);

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        log_json: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if log_json {
            self.log_json = true;
        }

        self
    }

    /// Get the path to the .veritas directory.
    pub fn veritas_dir(&self) -> PathBuf {
        self.workspace.join(".veritas")
    }

    /// Resolve a possibly relative path against the workspace root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Get the configuration of a provider, if the config file declares one.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Resolve the API key: `VERITAS_API_KEY` first, then the provider's `apiKeyEnv`,
    /// then the conventional variable for the provider.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        if let Some(ProviderConfig::OpenAiCompatible { api_key_env, .. }) =
            self.get_provider_config(provider)
        {
            if let Ok(key) = std::env::var(api_key_env) {
                return Some(key);
            }
        }

        default_key_env(provider).and_then(|env| std::env::var(env).ok())
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.to_lowercase();

        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider != "ollama" && self.resolve_api_key(&provider).is_none() {
            let env_var = match self.get_provider_config(&provider) {
                Some(ProviderConfig::OpenAiCompatible { api_key_env, .. }) => api_key_env.clone(),
                _ => default_key_env(&provider).unwrap_or("VERITAS_API_KEY").to_string(),
            };
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                env_var
            )));
        }

        self.pipeline.validate()
    }
}

fn default_key_env(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        "groq" => Some("GROQ_API_KEY"),
        _ => None,
    }
}
