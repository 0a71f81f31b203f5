//! Configuration Loader
//!
//! Layers the TOML file and `PERSONA__*` environment overrides on top of the built-in
//! defaults, resolves persona API keys from the environment, and validates the result.

use super::error::{ConfigResult, ConfigurationError};
use super::DaemonConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default location of the daemon configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/persona-daemon.toml";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: DaemonConfig,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_PATH`] when it exists.
    ///
    /// An explicitly requested file must exist; the default file is optional.
    pub fn load(path: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let (file_path, required) = match path {
            Some(p) => (p, true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        if required && !file_path.exists() {
            return Err(ConfigurationError::ConfigFileNotFound { path: file_path });
        }

        debug!(
            config_path = %file_path.display(),
            required = required,
            "Loading daemon configuration"
        );

        let mut config: DaemonConfig = Config::builder()
            .add_source(
                File::from(file_path.as_path())
                    .format(FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                Environment::with_prefix("PERSONA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Self::resolve_env_api_keys(&mut config, |name| env::var(name).ok());

        let source_path = file_path.exists().then_some(file_path);
        Self::finish(config, source_path)
    }

    /// Wrap an already-built configuration (tests, embedding hosts)
    pub fn from_config(config: DaemonConfig) -> ConfigResult<Arc<ConfigManager>> {
        Self::finish(config, None)
    }

    fn finish(config: DaemonConfig, source_path: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;

        let manager = ConfigManager {
            config,
            source_path,
        };

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&manager.debug_config())
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        let source = manager
            .source_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults+env".to_string());
        info!(
            personas = manager.config.personas.len(),
            llm_backends = manager.config.llm.backends.len(),
            platform = %manager.config.platform.base_url,
            source = %source,
            "⚙️ CONFIG: Daemon configuration ready"
        );

        Ok(Arc::new(manager))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Name of the environment variable consulted for a persona's API key
    pub fn api_key_env_var(persona_id: &str) -> String {
        let normalized: String = persona_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("PERSONA_API_KEY_{normalized}")
    }

    /// Fill missing persona keys from `PERSONA_API_KEY_<ID>`
    fn resolve_env_api_keys(config: &mut DaemonConfig, lookup: impl Fn(&str) -> Option<String>) {
        for persona in config.personas.iter_mut() {
            if persona.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
                continue;
            }
            if let Some(key) = lookup(&Self::api_key_env_var(&persona.id)).filter(|k| !k.is_empty()) {
                debug!(persona = %persona.id, "Resolved API key from environment");
                persona.api_key = Some(key);
            }
        }
    }

    /// Configuration as JSON with every secret-looking field masked
    pub fn debug_config(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null);
        Self::sanitize_json_recursive(&mut value, &["key", "secret", "token", "password"]);
        value
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns.iter().any(|p| key_lower.contains(p));
                    if is_sensitive && !val.is_null() {
                        *val = serde_json::Value::String("[MASKED]".to_string());
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}
