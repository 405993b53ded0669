use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::gateway::GatewayConfig;

/// Default prefix for environment overrides, e.g. `RUSTCARE_GATEWAY_RETRY__BASE_DELAY_MS`
pub const DEFAULT_ENV_PREFIX: &str = "RUSTCARE_GATEWAY";

/// Layered configuration loader
///
/// Sources, lowest precedence first: built-in defaults, an optional file
/// (format picked from its extension), then environment variables.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: Some(DEFAULT_ENV_PREFIX.to_string()),
        }
    }

    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Ignore the process environment (used by tests and dry runs)
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Build and validate the effective configuration
    pub fn load(&self) -> Result<GatewayConfig> {
        let mut builder = Config::builder();

        if let Some(ref path) = self.file {
            debug!(path = %path.display(), "Loading gateway configuration file");
            builder = builder.add_source(File::from(path.as_path()).required(false));
        }

        if let Some(ref prefix) = self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: GatewayConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::FailurePolicy;
    use std::io::Write;

    #[test]
    fn test_load_defaults_without_sources() {
        let config = ConfigLoader::new().without_env().load().unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
api_base_url = "https://auth.clinic.example/api"
failure_policy = "fail_open"
development_mode = true

[retry]
base_delay_ms = 250

[health]
interval_secs = 60
"#
        )
        .unwrap();

        let config = ConfigLoader::new().without_env().with_file(file.path()).load().unwrap();

        assert_eq!(config.api_base_url, "https://auth.clinic.example/api");
        assert_eq!(config.failure_policy, FailurePolicy::FailOpen);
        assert!(config.development_mode);
        assert_eq!(config.retry.base_delay_ms, 250);
        // Untouched fields keep their defaults
        assert_eq!(config.retry.max_unauthorized_retries, 2);
        assert_eq!(config.health.interval_secs, 60);
        assert_eq!(config.health.probe_timeout_secs, 5);
    }

    #[test]
    fn test_missing_file_is_optional() {
        let config = ConfigLoader::new()
            .without_env()
            .with_file("/nonexistent/rustcare-gateway.toml")
            .load()
            .unwrap();
        assert_eq!(config.routes.login_path, "/login");
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "request_timeout_secs = 0").unwrap();

        let result = ConfigLoader::new().without_env().with_file(file.path()).load();
        assert!(result.is_err());
    }
}
