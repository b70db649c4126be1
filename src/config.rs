use serde::{Deserialize, Serialize};

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "CYBERSENTINEL_API_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_user_agent() -> String {
    format!("CyberSentinel-Client/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig::default(),
            logging: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the file if present, fall back to defaults otherwise, then apply
    /// environment overrides. Called once at startup.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            log::warn!("Configuration file '{path}' not found, using default configuration");
            Self::default()
        };

        config.apply_overrides(std::env::var(API_URL_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, api_url: Option<String>) {
        if let Some(url) = api_url.map(|u| u.trim().to_string()) {
            if !url.is_empty() {
                log::info!("Using API base URL from {API_URL_ENV}: {url}");
                self.api.base_url = url;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let base = url::Url::parse(&self.api.base_url).map_err(|e| {
            anyhow::anyhow!("Invalid api.base_url '{}': {e}", self.api.base_url)
        })?;
        if base.cannot_be_a_base() {
            anyhow::bail!("api.base_url '{}' cannot be used as a base", self.api.base_url);
        }
        if self.api.timeout_seconds == 0 {
            anyhow::bail!("api.timeout_seconds must be greater than zero");
        }
        if self.api.timeout_seconds > DEFAULT_TIMEOUT_SECONDS {
            anyhow::bail!(
                "api.timeout_seconds must not exceed {DEFAULT_TIMEOUT_SECONDS}, got {}",
                self.api.timeout_seconds
            );
        }
        Ok(())
    }

    pub fn log_level(&self) -> Option<log::LevelFilter> {
        self.logging
            .as_ref()
            .and_then(|logging| logging.level.parse().ok())
    }
}
