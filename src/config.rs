//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults
//! - Validation and type safety

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Ranking defaults and per-dashboard rollup shape
    pub ranking: RankingConfig,

    /// Rollup memoization
    pub cache: CacheConfig,

    /// Output configuration
    pub output: OutputConfig,

    /// Paths configuration
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    pub default_limit: usize,
    pub entity_dimension: String,
    pub secondary_dimensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub json_pretty: bool,
    pub percent_precision: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub log_directory: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "ERROR".to_string(),
                format: "pretty".to_string(),
                output: "console".to_string(),
            },
            ranking: RankingConfig {
                default_limit: 10,
                entity_dimension: "commodity".to_string(),
                secondary_dimensions: vec!["retailer".to_string(), "city".to_string()],
            },
            cache: CacheConfig {
                enabled: false,
                max_entries: 64,
            },
            output: OutputConfig {
                json_pretty: true,
                percent_precision: 1,
            },
            paths: PathsConfig {
                log_directory: PathBuf::from("logs"),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("campaign-rollup.toml"),
            PathBuf::from(".campaign-rollup.toml"),
            dirs::config_dir()
                .map(|d| d.join("campaign-rollup").join("config.toml"))
                .unwrap_or_default(),
        ];

        let discovered = config_paths
            .iter()
            .find(|path| !path.as_os_str().is_empty() && path.exists());

        Self::load_from(discovered.map(PathBuf::as_path))
    }

    /// Load from an explicit file (or defaults when `None`), then apply env overrides
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!(config_file = %path.display(), "Loading configuration from file");
                Self::load_from_file(path)?
            }
            None => Config::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        // Ranking overrides
        if let Ok(val) = env::var("CAMPAIGN_ROLLUP_DEFAULT_LIMIT") {
            self.ranking.default_limit = val
                .parse()
                .context("Invalid CAMPAIGN_ROLLUP_DEFAULT_LIMIT")?;
        }
        if let Ok(val) = env::var("CAMPAIGN_ROLLUP_ENTITY_DIMENSION") {
            self.ranking.entity_dimension = val;
        }
        if let Ok(val) = env::var("CAMPAIGN_ROLLUP_SECONDARY_DIMENSIONS") {
            self.ranking.secondary_dimensions = split_list(&val);
        }

        // Cache overrides
        if let Ok(val) = env::var("CAMPAIGN_ROLLUP_CACHE_ENABLED") {
            self.cache.enabled = val
                .parse()
                .context("Invalid CAMPAIGN_ROLLUP_CACHE_ENABLED")?;
        }
        if let Ok(val) = env::var("CAMPAIGN_ROLLUP_CACHE_MAX_ENTRIES") {
            self.cache.max_entries = val
                .parse()
                .context("Invalid CAMPAIGN_ROLLUP_CACHE_MAX_ENTRIES")?;
        }

        // Path overrides
        if let Ok(val) = env::var("CAMPAIGN_ROLLUP_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(anyhow::anyhow!(
                "Log format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            ));
        }

        if !matches!(self.logging.output.as_str(), "console" | "file" | "both") {
            return Err(anyhow::anyhow!(
                "Log output must be 'console', 'file' or 'both', got '{}'",
                self.logging.output
            ));
        }

        if self.ranking.default_limit == 0 {
            return Err(anyhow::anyhow!("Default limit must be greater than 0"));
        }

        if self.ranking.entity_dimension.trim().is_empty() {
            return Err(anyhow::anyhow!("Entity dimension cannot be empty"));
        }

        if self
            .ranking
            .secondary_dimensions
            .iter()
            .any(|d| d.trim().is_empty())
        {
            return Err(anyhow::anyhow!("Secondary dimensions cannot contain blank names"));
        }

        if self.ranking.default_limit > 1000 {
            warn!(
                default_limit = self.ranking.default_limit,
                "Default limit is very high, leaderboards will be long"
            );
        }

        if self.cache.max_entries == 0 {
            return Err(anyhow::anyhow!("Cache max entries must be greater than 0"));
        }

        if self.output.percent_precision > 6 {
            return Err(anyhow::anyhow!(
                "Percent precision must be between 0 and 6, got {}",
                self.output.percent_precision
            ));
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Install an explicitly loaded configuration as the global instance.
/// Fails if the global was already initialized.
pub fn set_config(config: Config) -> Result<()> {
    CONFIG
        .set(config)
        .map_err(|_| anyhow::anyhow!("Configuration already initialized"))
}

/// Get the global configuration instance
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load configuration, using defaults");
            Config::default()
        })
    })
}
