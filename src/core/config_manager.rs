// src/core/config_manager.rs
//! Runtime configuration: the YAML environment section plus secrets from the process environment

use crate::environment::EnvironmentConfig;
use anyhow::Result;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: EnvironmentConfig,
    pub secrets: SecretsConfig,
}

/// Never read from config.yaml, except the admin token which the environment may override.
#[derive(Clone, Default)]
pub struct SecretsConfig {
    pub llm_api_key: Option<String>,
    pub admin_token: Option<String>,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "<set>"))
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl ConfigManager {
    /// Runs before tracing is initialised, so it logs nothing; see [`ConfigManager::log_summary`].
    pub fn load() -> Result<Self> {
        let environment = EnvironmentConfig::load()?;
        let secrets = Self::load_secrets(&environment);

        Ok(Self {
            environment,
            secrets,
        })
    }

    pub fn log_summary(&self) {
        info!(
            "Loading configuration for environment: {}",
            EnvironmentConfig::get_environment()
        );
        match &self.environment.loaded_from {
            Some(path) => info!("Configuration file: {}", path.display()),
            None => warn!("config.yaml not found in current directory, using built-in defaults"),
        }
        if self.secrets.llm_api_key.is_none() {
            warn!("GROQ_API_KEY is not set, analysis requests will fail");
        }
        info!(
            database = %self.environment.database_path.display(),
            model = %self.environment.llm.model,
            "Configuration loaded"
        );
    }

    fn load_secrets(environment: &EnvironmentConfig) -> SecretsConfig {
        SecretsConfig {
            llm_api_key: non_empty_env("GROQ_API_KEY"),
            admin_token: non_empty_env("JOBLENS_ADMIN_TOKEN")
                .or_else(|| environment.admin_token.clone()),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secrets() {
        let secrets = SecretsConfig {
            llm_api_key: Some("gsk_live".to_string()),
            admin_token: None,
        };
        let rendered = format!("{:?}", secrets);
        assert!(!rendered.contains("gsk_live"));
        assert!(rendered.contains("<set>"));
    }
}
