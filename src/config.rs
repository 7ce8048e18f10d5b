use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::prompts::PromptTemplate;
use crate::settings::Settings;

/// Environment variable holding the Hugging Face Hub token.
pub const TOKEN_ENV: &str = "HUGGINGFACEHUB_API_TOKEN";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hub token; the environment variable wins when both are set
    pub api_token: Option<String>,

    /// Inference API root
    pub base_url: String,

    /// Model repository on the Hub
    pub repo_id: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Optional file holding a custom prompt template
    pub template_path: Option<PathBuf>,

    /// Initial sampling settings
    pub settings: Settings,

    /// Where stored sessions and the log file live
    #[serde(skip)]
    pub data_dir: PathBuf,

    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Config {
            api_token: None,
            base_url: "https://api-inference.huggingface.co".to_string(),
            repo_id: "tiiuae/falcon-7b-instruct".to_string(),
            timeout_secs: 120,
            template_path: None,
            settings: Settings::default(),
            config_path: data_dir.join("config.toml"),
            data_dir,
        }
    }
}

fn default_data_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".falcon-chat")
}

impl Config {
    /// Load configuration from `path`, or `~/.falcon-chat/config.toml`.
    ///
    /// A missing file yields the defaults. The data directory is the
    /// directory holding the config file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => default_data_dir().join("config.toml"),
        };
        let data_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(default_data_dir);

        fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
            Self::parse(&content)?
        } else {
            Config::default()
        };

        config.config_path = config_path;
        config.data_dir = data_dir;
        config.settings.validate().map_err(ConfigError::from)?;

        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to its file
    pub fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Token from the environment, falling back to the config file.
    pub fn api_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.api_token.clone())
    }

    pub fn require_api_token(&self) -> Result<String, ConfigError> {
        self.api_token()
            .ok_or_else(|| ConfigError::MissingToken(self.config_path.display().to_string()))
    }

    /// The configured template, or the built-in one.
    pub fn prompt_template(&self) -> Result<PromptTemplate> {
        match &self.template_path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read template {}", path.display()))?;
                Ok(PromptTemplate::new(text).map_err(ConfigError::from)?)
            }
            None => Ok(PromptTemplate::default()),
        }
    }

    pub fn stored_sessions_path(&self) -> PathBuf {
        self.data_dir.join("stored_sessions.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("falcon-chat.log")
    }

    /// Masked token for display
    pub fn token_hint(&self) -> String {
        match self.api_token() {
            Some(token) if token.chars().count() > 6 => {
                format!("{}…", token.chars().take(6).collect::<String>())
            }
            Some(_) => "set".to_string(),
            None => "not set".to_string(),
        }
    }
}
