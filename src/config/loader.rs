//! # Configuration Loading
//!
//! [`ConfigManager`] owns the layered load: compiled defaults, then an
//! optional file, then `CITELINE__`-prefixed environment variables. The
//! result is validated before callers see it.
//!
//! Environment detection mirrors the deployment convention: `CITELINE_ENV`,
//! then `APP_ENV`, then `development`.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::error::ConfigResult;
use crate::config::CoreConfig;

const ENV_PREFIX: &str = "CITELINE";
const CONFIG_PATH_VAR: &str = "CITELINE_CONFIG_PATH";
const FILE_CANDIDATES: &[&str] = &["config/citeline.yaml", "config/citeline.toml"];

/// Loaded, validated configuration plus where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: CoreConfig,
    environment: String,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load with auto-detected environment and file discovery
    pub fn load() -> ConfigResult<Self> {
        let environment = detect_environment();
        Self::load_with_env(&environment)
    }

    /// Load for an explicit environment, discovering the config file
    pub fn load_with_env(environment: &str) -> ConfigResult<Self> {
        Self::load_from(discover_config_file(), environment)
    }

    /// Load from an explicit file path (or none), for the given environment
    pub fn load_from(path: Option<PathBuf>, environment: &str) -> ConfigResult<Self> {
        Self::build(path, environment, ENV_PREFIX)
    }

    fn build(path: Option<PathBuf>, environment: &str, env_prefix: &str) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(ref file) = path {
            builder = builder.add_source(config::File::from(file.clone()).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: CoreConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            environment,
            source = %path.as_deref().map_or_else(|| "defaults".to_string(), |p| p.display().to_string()),
            effective = %serde_json::to_value(&config)
                .map_or_else(|_| "<unserializable>".to_string(), |v| v.to_string()),
            "Configuration loaded"
        );

        Ok(Self {
            config,
            environment: environment.to_string(),
            source_path: path,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The file the configuration was loaded from, when one was found
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}

fn detect_environment() -> String {
    env::var("CITELINE_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}

fn discover_config_file() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_VAR) {
        return Some(PathBuf::from(path));
    }
    FILE_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.is_file())
}
