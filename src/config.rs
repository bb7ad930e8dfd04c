use crate::error::{VellumError, VellumResult};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
}

/// Knobs of the versioning engine itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Record field used as the stable identity key of an item.
    pub identity_field: String,
    /// Default number of entries returned by history queries.
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            identity_field: "id".to_string(),
            history_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Directory for JSON snapshots. In-memory snapshots when unset.
    pub snapshot_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> VellumResult<AppConfig> {
    let mut builder = Config::builder()
        .add_source(File::with_name("vellum").required(false))
        .add_source(Environment::with_prefix("VELLUM").separator("__"));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    let config = builder
        .build()
        .map_err(|err| VellumError::Config(err.to_string()))?;

    let parsed: AppConfig = config
        .try_deserialize()
        .map_err(|err| VellumError::Config(err.to_string()))?;

    if parsed.engine.identity_field.trim().is_empty() {
        return Err(VellumError::Config(
            "engine.identity_field must not be empty".to_string(),
        ));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::default();
        assert_eq!(config.engine.identity_field, "id");
        assert_eq!(config.engine.history_limit, 50);
        assert!(config.persistence.snapshot_dir.is_none());
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[engine]\nidentity_field = \"key\"\nhistory_limit = 5\n\n[logging]\njson = true"
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.engine.identity_field, "key");
        assert_eq!(config.engine.history_limit, 5);
        assert!(config.logging.json);
    }

    #[test]
    fn test_rejects_empty_identity_field() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[engine]\nidentity_field = \"\"").unwrap();
        assert!(matches!(
            load_config(Some(file.path())),
            Err(VellumError::Config(_))
        ));
    }
}
