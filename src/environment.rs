// src/environment.rs
use crate::core::database::CreditConfig;
use crate::core::llm_client::LlmConfig;
use crate::scraping::ScrapeConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub database_path: PathBuf,
    /// JSON log output, truncated at startup.
    pub log_file: Option<PathBuf>,
    pub scrape: ScrapeConfig,
    pub llm: LlmConfig,
    pub credits: CreditConfig,
    pub admin_token: Option<String>,
    /// Key credits on the proxy's `X-Real-IP` header instead of the socket peer.
    /// Only safe behind a reverse proxy that overwrites the header.
    pub trust_proxy_header: bool,
    /// Idle sessions older than this are dropped.
    pub session_ttl_secs: u64,
    /// Set when the values came from a file rather than built-in defaults.
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("joblens.db"),
            log_file: None,
            scrape: ScrapeConfig::default(),
            llm: LlmConfig::default(),
            credits: CreditConfig::default(),
            admin_token: None,
            trust_proxy_header: false,
            session_ttl_secs: 2 * 60 * 60,
            loaded_from: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    local: EnvironmentConfig,
    production: EnvironmentConfig,
}

impl EnvironmentConfig {
    /// Load configuration based on environment. Missing file means built-in defaults.
    pub fn load() -> Result<Self> {
        let environment = Self::get_environment();

        let config_path = PathBuf::from(CONFIG_FILE);
        let config = if config_path.exists() {
            Self {
                loaded_from: Some(config_path.clone()),
                ..Self::load_from_file(&config_path, &environment)?
            }
        } else {
            Self::default()
        };

        config.resolved()
    }

    pub fn get_environment() -> String {
        std::env::var("JOBLENS_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "local".to_string())
    }

    fn load_from_file(config_path: &Path, environment: &str) -> Result<Self> {
        let config_content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        Self::from_yaml(&config_content, environment)
    }

    pub fn from_yaml(content: &str, environment: &str) -> Result<Self> {
        let config_file: ConfigFile =
            serde_yaml::from_str(content).context("Failed to parse config.yaml")?;

        Ok(match environment {
            "production" => config_file.production,
            _ => config_file.local,
        })
    }

    /// Make paths absolute
    fn resolved(self) -> Result<Self> {
        Ok(Self {
            database_path: Self::resolve_path(&self.database_path)?,
            log_file: self
                .log_file
                .as_deref()
                .map(Self::resolve_path)
                .transpose()?,
            ..self
        })
    }

    fn resolve_path(path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            let current_dir = std::env::current_dir().context("Failed to get current directory")?;
            Ok(current_dir.join(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
local:
  database_path: data/local.db
  scrape:
    detail_concurrency: 4
  llm:
    model: llama-3.3-70b-versatile
production:
  database_path: /var/lib/joblens/joblens.db
  log_file: /var/log/joblens.json
  credits:
    default_limit: 20
  admin_token: secret
"#;

    #[test]
    fn test_sections_are_selected_by_environment() {
        let local = EnvironmentConfig::from_yaml(SAMPLE, "local").unwrap();
        assert_eq!(local.database_path, PathBuf::from("data/local.db"));
        assert_eq!(local.scrape.detail_concurrency, 4);
        assert_eq!(local.scrape.detail_timeout_secs, 15);
        assert_eq!(local.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(local.llm.timeout_secs, 90);
        assert_eq!(local.credits.default_limit, 50);

        let production = EnvironmentConfig::from_yaml(SAMPLE, "production").unwrap();
        assert_eq!(production.credits.default_limit, 20);
        assert_eq!(production.credits.max_batch, 3);
        assert_eq!(production.admin_token.as_deref(), Some("secret"));
        assert_eq!(production.scrape.detail_concurrency, 8);
        assert!(!production.trust_proxy_header);
        assert_eq!(production.session_ttl_secs, 7200);
    }

    #[test]
    fn test_unknown_environment_falls_back_to_local() {
        let config = EnvironmentConfig::from_yaml(SAMPLE, "staging").unwrap();
        assert_eq!(config.database_path, PathBuf::from("data/local.db"));
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let config = EnvironmentConfig::from_yaml("local: {}\n", "production").unwrap();
        assert_eq!(config.database_path, PathBuf::from("joblens.db"));
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_relative_paths_are_resolved() {
        let config = EnvironmentConfig::from_yaml(SAMPLE, "local")
            .unwrap()
            .resolved()
            .unwrap();
        assert!(config.database_path.is_absolute());
        assert!(config.database_path.ends_with("data/local.db"));
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(EnvironmentConfig::from_yaml("local: [", "local").is_err());
    }
}
