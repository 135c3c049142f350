//! Unified Application Configuration
//!
//! Centralized configuration for the orchestration core, loadable from a
//! YAML file, inline YAML, or environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("invalid value for {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Unified application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Orchestrator configuration
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Cache store configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment and file
    pub fn load() -> Result<Self> {
        let config: Self = match (
            std::env::var("IBAI_CONFIG_PATH").ok(),
            std::env::var("IBAI_CONFIG_YAML").ok(),
        ) {
            (Some(path), None) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path));
                }
                let content = std::fs::read_to_string(&path)?;
                serde_yaml::from_str(&content)?
            }
            (None, Some(yaml)) => serde_yaml::from_str(&yaml)?,
            _ => Self::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            orchestrator: OrchestratorConfig::from_env()?,
            cache: CacheConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.orchestrator.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// Maximum number of jobs executing concurrently per run
    pub max_concurrent_jobs: usize,

    /// Wall-clock budget applied to jobs without their own timeout
    pub default_job_timeout_ms: u64,
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self> {
        let max_concurrent_jobs = std::env::var("IBAI_MAX_CONCURRENT_JOBS")
            .unwrap_or_else(|_| "8".to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("IBAI_MAX_CONCURRENT_JOBS".to_string()))?;

        let default_job_timeout_ms = std::env::var("IBAI_JOB_TIMEOUT_MS")
            .unwrap_or_else(|_| "3600000".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("IBAI_JOB_TIMEOUT_MS".to_string()))?;

        Ok(Self {
            max_concurrent_jobs,
            default_job_timeout_ms,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidValue(
                "orchestrator.max_concurrent_jobs".to_string(),
            ));
        }
        if self.default_job_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "orchestrator.default_job_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 8,
            default_job_timeout_ms: 3_600_000,
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Byte budget beyond which least-recently-used entries are evicted
    pub size_budget_bytes: u64,
}

impl CacheConfig {
    pub fn from_env() -> Result<Self> {
        let size_budget_bytes = std::env::var("IBAI_CACHE_SIZE_BUDGET_BYTES")
            .unwrap_or_else(|_| "1073741824".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("IBAI_CACHE_SIZE_BUDGET_BYTES".to_string()))?;

        Ok(Self { size_budget_bytes })
    }

    pub fn validate(&self) -> Result<()> {
        if self.size_budget_bytes == 0 {
            return Err(ConfigError::InvalidValue("cache.size_budget_bytes".to_string()));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_budget_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. "info" or "ibai=debug"
    pub level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            level: std::env::var("IBAI_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Initialize the global tracing subscriber from the logging config.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.orchestrator.max_concurrent_jobs, 8);
    }

    #[test]
    fn test_yaml_round_trip() {
        let yaml = r#"
orchestrator:
  max_concurrent_jobs: 4
  default_job_timeout_ms: 60000
cache:
  size_budget_bytes: 1048576
logging:
  level: debug
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.orchestrator.max_concurrent_jobs, 4);
        assert_eq!(config.cache.size_budget_bytes, 1_048_576);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let config = AppConfig {
            orchestrator: OrchestratorConfig {
                max_concurrent_jobs: 0,
                default_job_timeout_ms: 1000,
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
