//! Configuration management for blogtrace.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent_core::{AnthropicProvider, LlmProvider, UnifiedProvider};
use serde::{Deserialize, Serialize};

use crate::core::search::{BraveSearch, SearchDefaults};

/// Provider API type.
///
/// Determines which API format to use for communication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderApiType {
    /// Anthropic Messages API
    #[default]
    Anthropic,
    /// `OpenAI` Chat Completions API (also used by compatible providers)
    OpenAi,
    /// Google Gemini API
    Google,
    /// Groq API
    Groq,
    /// Mistral API
    Mistral,
}

/// Individual provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type", default)]
    pub api_type: ProviderApiType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,

    /// Agent configuration.
    pub agent: AgentConfig,

    /// Web search configuration.
    pub search: SearchConfig,

    /// CLI client configuration.
    pub client: ClientConfig,
}

impl Config {
    /// Load configuration from the default paths.
    ///
    /// Loads global config first, then merges project-local config if present.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read or parsed.
    pub fn load() -> anyhow::Result<Self> {
        let global_path = Self::config_path()?;
        let project_path = Self::project_config_path().ok();
        Self::load_from(&global_path, project_path.as_deref())
    }

    /// Load configuration from explicit paths. Missing files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read or parsed.
    pub fn load_from(global: &Path, project: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = if global.exists() {
            let contents = std::fs::read_to_string(global)?;
            toml::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Some(project) = project.filter(|p| p.exists()) {
            let contents = std::fs::read_to_string(project)?;
            let project_config: Self = toml::from_str(&contents)?;
            config.merge(project_config);
        }

        Ok(config)
    }

    /// Get the project-local configuration file path.
    ///
    /// Looks for `.blogtrace/config.toml` in the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn project_config_path() -> anyhow::Result<PathBuf> {
        let cwd = std::env::current_dir()?;
        Ok(cwd.join(".blogtrace").join("config.toml"))
    }

    /// Merge another config into this one (project overrides global).
    fn merge(&mut self, other: Self) {
        let server = ServerConfig::default();
        if other.server.host != server.host {
            self.server.host = other.server.host;
        }
        if other.server.port != server.port {
            self.server.port = other.server.port;
        }

        let agent = AgentConfig::default();
        if other.agent.provider != agent.provider {
            self.agent.provider = other.agent.provider;
        }
        if other.agent.model != agent.model {
            self.agent.model = other.agent.model;
        }
        if other.agent.max_tokens != agent.max_tokens {
            self.agent.max_tokens = other.agent.max_tokens;
        }
        if other.agent.max_steps != agent.max_steps {
            self.agent.max_steps = other.agent.max_steps;
        }
        if other.agent.thinking_budget.is_some() {
            self.agent.thinking_budget = other.agent.thinking_budget;
        }
        for (name, provider) in other.agent.providers {
            self.agent.providers.insert(name, provider);
        }

        let search = SearchConfig::default();
        if other.search.api_key_env != search.api_key_env {
            self.search.api_key_env = other.search.api_key_env;
        }
        if other.search.count != search.count {
            self.search.count = other.search.count;
        }
        if other.search.country.is_some() {
            self.search.country = other.search.country;
        }
        if other.search.search_lang.is_some() {
            self.search.search_lang = other.search.search_lang;
        }

        if other.client.server_url.is_some() {
            self.client.server_url = other.client.server_url;
        }
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the config directory path (`~/.config/blogtrace/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config_home).join("blogtrace"));
        }

        let base = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

        Ok(base.config_dir().join("blogtrace"))
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7890,
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Active provider name (key in providers table).
    pub provider: String,

    /// Model to use.
    pub model: String,

    /// Maximum tokens in each completion.
    pub max_tokens: u32,

    /// Maximum completions per run.
    pub max_steps: usize,

    /// Extended thinking budget, when the provider supports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,

    /// Provider definitions.
    #[serde(default = "AgentConfig::default_providers")]
    pub providers: HashMap<String, ProviderConfig>,
}

impl AgentConfig {
    /// Get the default provider configurations.
    fn default_providers() -> HashMap<String, ProviderConfig> {
        let mut providers = HashMap::new();

        providers.insert(
            "anthropic".to_string(),
            ProviderConfig {
                api_type: ProviderApiType::Anthropic,
                base_url: None,
                api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
            },
        );

        providers.insert(
            "openai".to_string(),
            ProviderConfig {
                api_type: ProviderApiType::OpenAi,
                base_url: None,
                api_key_env: Some("OPENAI_API_KEY".to_string()),
            },
        );

        providers.insert(
            "ollama".to_string(),
            ProviderConfig {
                api_type: ProviderApiType::OpenAi,
                base_url: Some("http://localhost:11434/v1".to_string()),
                api_key_env: None,
            },
        );

        providers.insert(
            "groq".to_string(),
            ProviderConfig {
                api_type: ProviderApiType::Groq,
                base_url: None,
                api_key_env: Some("GROQ_API_KEY".to_string()),
            },
        );

        providers.insert(
            "google".to_string(),
            ProviderConfig {
                api_type: ProviderApiType::Google,
                base_url: None,
                api_key_env: Some("GOOGLE_API_KEY".to_string()),
            },
        );

        providers.insert(
            "mistral".to_string(),
            ProviderConfig {
                api_type: ProviderApiType::Mistral,
                base_url: None,
                api_key_env: Some("MISTRAL_API_KEY".to_string()),
            },
        );

        providers
    }

    fn resolve_api_key(config: &ProviderConfig) -> Option<String> {
        let env_name = config.api_key_env.as_ref()?;
        std::env::var(env_name).ok().filter(|key| !key.is_empty())
    }

    /// Create the configured LLM provider.
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unknown or required API key is missing.
    pub fn create_provider(&self) -> anyhow::Result<Arc<dyn LlmProvider>> {
        let config = self.providers.get(&self.provider).ok_or_else(|| {
            anyhow::anyhow!(
                "unknown provider '{}', check [agent.providers] config",
                self.provider
            )
        })?;

        let provider_name = &self.provider;
        let missing_key_error = || {
            anyhow::anyhow!(
                "no API key configured for provider '{provider_name}', set {}",
                config.api_key_env.as_deref().unwrap_or("an api_key_env")
            )
        };

        match config.api_type {
            ProviderApiType::Anthropic => {
                let key = Self::resolve_api_key(config).ok_or_else(missing_key_error)?;
                let mut provider = AnthropicProvider::new(key)?;
                if let Some(url) = &config.base_url {
                    provider = provider.with_base_url(url);
                }
                Ok(Arc::new(provider))
            }
            ProviderApiType::OpenAi => Ok(Arc::new(UnifiedProvider::openai(
                Self::resolve_api_key(config),
                config.base_url.clone(),
            ))),
            ProviderApiType::Google => {
                let key = Self::resolve_api_key(config).ok_or_else(missing_key_error)?;
                Ok(Arc::new(UnifiedProvider::google(key)?))
            }
            ProviderApiType::Groq => {
                let key = Self::resolve_api_key(config).ok_or_else(missing_key_error)?;
                Ok(Arc::new(UnifiedProvider::groq(key)?))
            }
            ProviderApiType::Mistral => {
                let key = Self::resolve_api_key(config).ok_or_else(missing_key_error)?;
                Ok(Arc::new(UnifiedProvider::mistral(key)?))
            }
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            max_steps: 5,
            thinking_budget: None,
            providers: Self::default_providers(),
        }
    }
}

/// Web search configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Environment variable holding the Brave subscription token.
    pub api_key_env: String,

    /// Default country code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Default search language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_lang: Option<String>,

    /// Default number of results.
    pub count: u32,
}

impl SearchConfig {
    /// Build a search client, if the token is set.
    #[must_use]
    pub fn client(&self) -> Option<BraveSearch> {
        let key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())?;

        Some(BraveSearch::new(
            key,
            SearchDefaults {
                country: self.country.clone(),
                search_lang: self.search_lang.clone(),
                count: Some(self.count),
            },
        ))
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: "BRAVE_API_KEY".to_string(),
            country: None,
            search_lang: None,
            count: 5,
        }
    }
}

/// CLI client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server to stream from when `--server` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 7890);
        assert_eq!(config.agent.provider, "anthropic");
        assert_eq!(config.agent.model, "claude-sonnet-4-20250514");
        assert_eq!(config.agent.max_tokens, 4096);
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.search.api_key_env, "BRAVE_API_KEY");
        assert_eq!(config.search.count, 5);
        assert!(config.client.server_url.is_none());
    }

    #[test]
    fn default_providers_exist() {
        let config = AgentConfig::default();
        assert!(config.providers.contains_key("anthropic"));
        assert!(config.providers.contains_key("openai"));
        assert_eq!(
            config.providers["ollama"].base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
    }

    #[test]
    fn unknown_provider_returns_error() {
        let config = AgentConfig {
            provider: "nope".to_string(),
            ..AgentConfig::default()
        };
        let err = config.create_provider().err().unwrap();
        assert!(err.to_string().contains("unknown provider 'nope'"));
    }

    #[test]
    fn missing_key_returns_error() {
        let mut config = AgentConfig::default();
        config.providers.insert(
            "anthropic".to_string(),
            ProviderConfig {
                api_type: ProviderApiType::Anthropic,
                base_url: None,
                api_key_env: Some("BLOGTRACE_TEST_UNSET_KEY".to_string()),
            },
        );
        assert!(config.create_provider().is_err());
    }

    #[test]
    fn keyless_openai_compatible_provider_builds() {
        let config = AgentConfig {
            provider: "ollama".to_string(),
            ..AgentConfig::default()
        };
        assert!(config.create_provider().is_ok());
    }

    #[test]
    fn missing_files_load_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(
            &dir.path().join("config.toml"),
            Some(&dir.path().join("project.toml")),
        )
        .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn project_config_overrides_global() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("project.toml");

        std::fs::write(
            &global,
            r#"
[server]
port = 9000

[agent]
model = "global-model"

[search]
country = "JP"
"#,
        )
        .unwrap();
        std::fs::write(
            &project,
            r#"
[agent]
model = "project-model"
max_steps = 3

[agent.providers.local]
type = "openai"
base_url = "http://localhost:8080/v1"

[client]
server_url = "http://localhost:9000"
"#,
        )
        .unwrap();

        let config = Config::load_from(&global, Some(&project)).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.agent.model, "project-model");
        assert_eq!(config.agent.max_steps, 3);
        assert_eq!(config.search.country.as_deref(), Some("JP"));
        assert!(config.agent.providers.contains_key("local"));
        assert!(config.agent.providers.contains_key("anthropic"));
        assert_eq!(
            config.client.server_url.as_deref(),
            Some("http://localhost:9000")
        );
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("config.toml");
        std::fs::write(&global, "[server\nport = ").unwrap();

        assert!(Config::load_from(&global, None).is_err());
    }

    #[test]
    fn rendered_toml_parses_back() {
        let rendered = Config::default().to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn search_client_requires_token() {
        let config = SearchConfig {
            api_key_env: "BLOGTRACE_TEST_UNSET_BRAVE".to_string(),
            ..SearchConfig::default()
        };
        assert!(config.client().is_none());
    }
}
