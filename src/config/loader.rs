//! Configuration Loader
//!
//! Environment-aware loading of [`QueueConfig`] from TOML files and environment
//! variables, merged with the `config` crate.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use config::{Config, Environment, File, FileFormat};
use serde_json::Value;
use tracing::{debug, info};

use super::{ConfigResult, QueueConfig};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "TASKER_QUEUE";

const SENSITIVE_PATTERNS: [&str; 7] = [
    "password",
    "secret",
    "key",
    "token",
    "credential",
    "auth",
    "url",
];

#[derive(Debug)]
pub struct ConfigManager {
    config: QueueConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a directory with an explicit environment
    ///
    /// Useful in tests, which should not depend on process environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::build(&config_directory, environment)?;
        config.validate()?;

        let manager = ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        };

        debug!(config = %manager.debug_config(), "Configuration loaded");
        info!(
            environment = %manager.environment,
            state_store = %manager.config.state_store.backend,
            heartbeat_interval_ms = manager.config.heartbeat.interval_ms,
            miss_threshold = manager.config.heartbeat.miss_threshold,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(manager))
    }

    fn build(config_directory: &Path, environment: &str) -> ConfigResult<QueueConfig> {
        let base = config_directory.join("default.toml");
        let overlay = config_directory.join(format!("{environment}.toml"));

        let merged = Config::builder()
            .add_source(Config::try_from(&QueueConfig::default())?)
            .add_source(File::from(base).format(FileFormat::Toml).required(false))
            .add_source(File::from(overlay).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(merged.try_deserialize()?)
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with sensitive fields masked
    pub fn debug_config(&self) -> Value {
        sanitize_config_for_logging(&self.config)
    }

    /// `TASKER_ENV`, defaulting to `development`
    pub fn detect_environment() -> String {
        env::var("TASKER_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        env::var("TASKER_QUEUE_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}

static GLOBAL_CONFIG: OnceLock<Arc<ConfigManager>> = OnceLock::new();

impl ConfigManager {
    /// Process-wide configuration, loaded on first use
    ///
    /// Falls back to built-in defaults when loading fails.
    pub fn global() -> Arc<ConfigManager> {
        GLOBAL_CONFIG
            .get_or_init(|| {
                Self::load().unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Falling back to default configuration");
                    Arc::new(ConfigManager {
                        config: QueueConfig::default(),
                        environment: Self::detect_environment(),
                        config_directory: Self::default_config_directory(),
                    })
                })
            })
            .clone()
    }
}

fn sanitize_config_for_logging(config: &QueueConfig) -> Value {
    let mut json = serde_json::to_value(config).unwrap_or(Value::Null);
    sanitize_json_recursive(&mut json);
    json
}

fn sanitize_json_recursive(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                let sensitive = SENSITIVE_PATTERNS
                    .iter()
                    .any(|pattern| key_lower.contains(pattern));

                if sensitive {
                    *val = mask(val);
                } else {
                    sanitize_json_recursive(val);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sanitize_json_recursive),
        _ => {}
    }
}

fn mask(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) if s.is_empty() => Value::String("[EMPTY]".to_string()),
        Value::String(s) if s.chars().count() > 4 => {
            let chars: Vec<char> = s.chars().collect();
            let head: String = chars[..2].iter().collect();
            let tail: String = chars[chars.len() - 2..].iter().collect();
            Value::String(format!("[MASKED: {head}***{tail}]"))
        }
        _ => Value::String("[MASKED]".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StateStoreBackend;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_missing_directory_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().join("absent")), "test")
                .unwrap();
        assert_eq!(manager.config(), &QueueConfig::default());
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_environment_overlay_wins() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "default.toml",
            "[heartbeat]\ninterval_ms = 2000\nmiss_threshold = 3\n",
        );
        write(dir.path(), "production.toml", "[heartbeat]\ninterval_ms = 30000\n");

        let manager = ConfigManager::load_from_directory_with_env(
            Some(dir.path().to_path_buf()),
            "production",
        )
        .unwrap();

        assert_eq!(manager.config().heartbeat.interval_ms, 30_000);
        assert_eq!(manager.config().heartbeat.miss_threshold, 3);
        assert_eq!(manager.config().dispatch.max_attempts, 5);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "default.toml",
            "[state_store]\nbackend = \"postgres\"\n",
        );

        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_config_masks_database_url() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "default.toml",
            "[state_store]\nbackend = \"postgres\"\ndatabase_url = \"postgresql://tasker:hunter2@db/q\"\n",
        );

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        assert_eq!(
            manager.config().state_store.backend,
            StateStoreBackend::Postgres
        );

        let rendered = manager.debug_config().to_string();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[MASKED: po***/q]"));
    }
}
