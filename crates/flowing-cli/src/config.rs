//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for flowing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Active provider (tongyi, claude, custom)
    pub provider: Option<String>,
    /// Root of the flowing library checkout; the sandbox runs with this
    /// as its working directory so generated imports resolve
    pub flowing_root: Option<String>,
    /// Directory where generated diagrams are written
    pub output_dir: Option<String>,
    /// Runtime used to execute generated code (default: npx tsx)
    pub runtime: Option<String>,
    #[serde(default)]
    pub runtime_args: Option<Vec<String>>,
    /// Per-attempt execution timeout in seconds
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub tongyi: ProviderConfig,
    #[serde(default)]
    pub claude: ProviderConfig,
    #[serde(default)]
    pub custom: ProviderConfig,
}

/// Settings for one model provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

pub const DEFAULT_PROVIDER: &str = "tongyi";
pub const TONGYI_ENDPOINT: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const TONGYI_MODEL: &str = "qwen-plus";
pub const CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flowing")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for FLOWING_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("FLOWING_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        let dir = path.parent().unwrap();
        fs::create_dir_all(dir)?;

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            provider: Some(DEFAULT_PROVIDER.to_string()),
            tongyi: ProviderConfig {
                api_key: None,
                model: Some(TONGYI_MODEL.to_string()),
                endpoint: Some(TONGYI_ENDPOINT.to_string()),
            },
            claude: ProviderConfig {
                api_key: None,
                model: Some(CLAUDE_MODEL.to_string()),
                endpoint: None,
            },
            ..Default::default()
        };

        default_config.save()?;
        Ok(path)
    }

    /// Settings block for a provider id
    pub fn provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        match provider {
            "tongyi" => Some(&self.tongyi),
            "claude" => Some(&self.claude),
            "custom" => Some(&self.custom),
            _ => None,
        }
    }

    /// Model id for a provider, falling back to the provider default
    pub fn model_for(&self, provider: &str) -> Option<String> {
        let configured = self
            .provider_config(provider)
            .and_then(|p| p.model.clone());
        configured.or_else(|| match provider {
            "tongyi" => Some(TONGYI_MODEL.to_string()),
            "claude" => Some(CLAUDE_MODEL.to_string()),
            _ => None,
        })
    }

    /// Endpoint for a provider, falling back to the provider default
    pub fn endpoint_for(&self, provider: &str) -> Option<String> {
        let configured = self
            .provider_config(provider)
            .and_then(|p| p.endpoint.clone());
        configured.or_else(|| match provider {
            "tongyi" => Some(TONGYI_ENDPOINT.to_string()),
            _ => None,
        })
    }

    /// Get API key for a provider, checking config then env (sync version)
    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        let from_config = self
            .provider_config(provider)
            .and_then(|p| p.api_key.clone())
            .filter(|k| !k.is_empty());
        if from_config.is_some() {
            return from_config;
        }

        let env_var = match provider {
            "tongyi" => "DASHSCOPE_API_KEY",
            "claude" => "ANTHROPIC_API_KEY",
            "custom" => "FLOWING_API_KEY",
            _ => return None,
        };
        std::env::var(env_var).ok().filter(|k| !k.is_empty())
    }

    /// Get API key for a provider, checking OAuth first, then config, then env
    pub async fn get_api_key_with_oauth(&self, provider: &str) -> Option<String> {
        // For claude, an OAuth login takes precedence over stored keys
        if provider == "claude" {
            if let Some(token) = crate::oauth::get_oauth_token().await {
                return Some(token);
            }
            if let Ok(token) = std::env::var("ANTHROPIC_OAUTH_TOKEN") {
                if !token.is_empty() {
                    return Some(token);
                }
            }
        }

        self.get_api_key(provider)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# flowing configuration file
# Place at ~/.config/flowing/config.toml (Linux/Mac) or %APPDATA%\flowing\config.toml (Windows)

# Active provider (tongyi, claude, custom)
provider = "tongyi"

# Root of the flowing library checkout (generated code runs from here)
# flowing_root = "/path/to/flowing"

# Where generated diagrams are written (defaults to the current directory)
# output_dir = "/path/to/diagrams"

# Runtime for generated TypeScript (defaults to npx tsx)
# runtime = "npx"
# runtime_args = ["tsx"]

# Per-attempt execution timeout in seconds
# timeout_secs = 30

[tongyi]
# api_key = "sk-..."          # or set DASHSCOPE_API_KEY
model = "qwen-plus"
endpoint = "https://dashscope.aliyuncs.com/compatible-mode/v1"

[claude]
# api_key = "sk-ant-..."      # or set ANTHROPIC_API_KEY, or `flowing --login`
model = "claude-sonnet-4-20250514"

[custom]
# Any OpenAI-compatible endpoint
# api_key = "..."             # or set FLOWING_API_KEY
# model = "gpt-4o"
# endpoint = "https://api.openai.com/v1"
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.provider.as_deref(), Some("tongyi"));
        assert_eq!(config.tongyi.model.as_deref(), Some(TONGYI_MODEL));
        assert_eq!(config.claude.model.as_deref(), Some(CLAUDE_MODEL));
        assert!(config.custom.api_key.is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let config: Config = toml::from_str("provider = \"claude\"").unwrap();
        assert_eq!(config.provider.as_deref(), Some("claude"));
        assert!(config.claude.api_key.is_none());
        assert!(config.timeout_secs.is_none());
    }

    #[test]
    fn test_model_and_endpoint_fallbacks() {
        let config = Config::default();
        assert_eq!(config.model_for("tongyi").as_deref(), Some(TONGYI_MODEL));
        assert_eq!(config.model_for("claude").as_deref(), Some(CLAUDE_MODEL));
        assert!(config.model_for("custom").is_none());
        assert_eq!(
            config.endpoint_for("tongyi").as_deref(),
            Some(TONGYI_ENDPOINT)
        );
        assert!(config.endpoint_for("custom").is_none());
    }

    #[test]
    fn test_configured_values_win_over_defaults() {
        let config: Config = toml::from_str(
            r#"
            [tongyi]
            model = "qwen-max"
            endpoint = "https://example.com/v1"
            "#,
        )
        .unwrap();
        assert_eq!(config.model_for("tongyi").as_deref(), Some("qwen-max"));
        assert_eq!(
            config.endpoint_for("tongyi").as_deref(),
            Some("https://example.com/v1")
        );
    }

    #[test]
    fn test_empty_api_key_is_ignored() {
        let config: Config = toml::from_str(
            r#"
            [custom]
            api_key = ""
            "#,
        )
        .unwrap();
        // Empty string in the file must not satisfy the auth check
        assert_ne!(config.get_api_key("custom").as_deref(), Some(""));
    }
}
