use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::conflict::OverlapPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub language_model: LanguageModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScheduleConfig {
    pub default_duration_minutes: Option<i64>,
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    Gemini,
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LanguageModelConfig {
    /// `None` disables the AI call entirely; requests go straight to the
    /// rule-based extractor.
    pub provider: Option<LLMProvider>,
    pub model: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    pub port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig {
                default_duration_minutes: Some(60),
                overlap_policy: OverlapPolicy::Evict,
            },
            language_model: LanguageModelConfig {
                provider: Some(LLMProvider::Gemini),
                model: None,
                request_timeout_secs: Some(15),
            },
            server: ServerConfig { port: Some(8000) },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;

        // If config doesn't exist, create default
        if !config_path.exists() {
            let default_config = Config::default();
            default_config.save()?;
            return Ok(default_config);
        }

        // Read and parse config file
        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Serialize and save config
        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn default_duration_minutes(&self) -> i64 {
        self.schedule.default_duration_minutes.unwrap_or(60)
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.language_model.request_timeout_secs.unwrap_or(15)
    }

    /// Bind port for the API server. `PLANCHAT_PORT` wins over `PORT`, which
    /// wins over the config file.
    pub fn server_port(&self) -> u16 {
        env::var("PLANCHAT_PORT")
            .or_else(|_| env::var("PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .or(self.server.port)
            .unwrap_or(8000)
    }
}

fn get_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "planchat", "planchat")
        .context("Failed to determine config directory")?;

    Ok(proj_dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.schedule.default_duration_minutes, Some(60));
        assert_eq!(config.schedule.overlap_policy, OverlapPolicy::Evict);
        assert!(matches!(config.language_model.provider, Some(LLMProvider::Gemini)));
        assert_eq!(config.server.port, Some(8000));
    }

    #[test]
    fn test_config_parses_policy_names() {
        let config: Config = toml::from_str(
            r#"
            [schedule]
            overlap_policy = "reject"

            [language_model]
            provider = "openai"
            "#,
        )
        .unwrap();
        assert_eq!(config.schedule.overlap_policy, OverlapPolicy::Reject);
        assert!(matches!(config.language_model.provider, Some(LLMProvider::OpenAI)));
    }

    #[test]
    fn test_config_save_load() -> Result<()> {
        // Set up temporary config directory
        let temp_dir = tempdir()?;
        env::set_var("XDG_CONFIG_HOME", temp_dir.path());

        // Create and save config
        let config = Config::default();
        config.save()?;

        // Load config
        let loaded = Config::load()?;

        // Verify loaded config matches saved config
        assert_eq!(
            loaded.schedule.default_duration_minutes,
            config.schedule.default_duration_minutes
        );

        Ok(())
    }
}
