//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod engine;
pub mod logging;

use serde::{Deserialize, Serialize};

use self::engine::EngineConfig;
use self::logging::LoggingConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hook engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files in `dir`.
    ///
    /// Merges `{dir}/default` with an environment-specific overlay
    /// `{dir}/{env}` and environment variables prefixed with `STRATA_`.
    /// Every file is optional; missing sections fall back to defaults.
    pub fn load(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("STRATA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;

        tracing::debug!(
            dir,
            env,
            hook_timeout_ms = ?config.engine.hook_timeout_ms,
            derive_validate_on_save = config.engine.derive_validate_on_save,
            "Configuration resolved"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let config = AppConfig::load("does/not/exist", "test").expect("load");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.engine.hook_timeout_ms, None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[engine]\nhook_timeout_ms = 250\n",
                config::FileFormat::Toml,
            ))
            .build()
            .and_then(|c| c.try_deserialize())
            .expect("deserialize");

        assert_eq!(config.engine.hook_timeout_ms, Some(250));
        assert!(config.engine.derive_validate_on_save);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let dir = std::env::temp_dir().join(format!("strata-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("default.toml"), "[engine\nhook_timeout_ms = ").unwrap();

        let err = AppConfig::load(dir.to_str().unwrap(), "test").unwrap_err();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
        assert!(std::error::Error::source(&err).is_some());
    }
}
