//! Layered loading of [`OperatorConfig`].
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. A TOML file, either the given path or the optional defaults `conductor-operator` in the
//!    working directory and `/etc/conductor/operator`
//! 2. Environment variables prefixed `CONDUCTOR__OPERATOR__`, with `__` separating nested keys
//!    (e.g. `CONDUCTOR__OPERATOR__NAMESPACE_DELETION__PAGE_SIZE=500`)
//!
//! The merged result is validated before it is returned.

// Snafu generates struct fields for context selectors that don't need documentation
#![allow(missing_docs)]

use conductor_types::config::{ConfigError, OperatorConfig};
use snafu::{ResultExt, Snafu};

/// Prefix of the environment variables that override file settings.
pub const ENV_PREFIX: &str = "CONDUCTOR__OPERATOR";

/// Failure to produce a valid configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoadError {
    /// A source could not be read.
    #[snafu(display("failed to load config: {source}"))]
    Load { source: config::ConfigError },

    /// The merged sources do not describe an operator configuration.
    #[snafu(display("failed to parse config: {source}"))]
    Parse { source: config::ConfigError },

    /// A value is out of range.
    #[snafu(display("{source}"))]
    Invalid { source: ConfigError },
}

/// Loading of [`OperatorConfig`] from files and the environment.
pub trait LoadOperatorConfig: Sized {
    /// Loads from `path`, or from the default locations when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if a source cannot be read or parsed, or if the
    /// result fails validation.
    fn load(path: Option<&str>) -> Result<Self, LoadError>;
}

impl LoadOperatorConfig for OperatorConfig {
    fn load(path: Option<&str>) -> Result<Self, LoadError> {
        load_with_env(path, environment())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true)
}

fn load_with_env(
    path: Option<&str>,
    env: config::Environment,
) -> Result<OperatorConfig, LoadError> {
    let builder = config::Config::builder();
    let builder = match path {
        Some(path) => builder.add_source(config::File::with_name(path)),
        None => builder
            .add_source(config::File::with_name("conductor-operator").required(false))
            .add_source(config::File::with_name("/etc/conductor/operator").required(false)),
    };

    let merged = builder.add_source(env).build().context(LoadSnafu)?;
    let config: OperatorConfig = merged.try_deserialize().context(ParseSnafu)?;
    config.validate().context(InvalidSnafu)?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use conductor_test_utils::TestDir;
    use conductor_types::BackendKind;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        environment().source(Some(vars))
    }

    fn write(dir: &TestDir, body: &str) -> String {
        let path = dir.join("operator.toml");
        std::fs::write(&path, body).expect("write config file");
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_file_values_with_defaults() {
        let dir = TestDir::new();
        let path = write(
            &dir,
            r#"
history_shard_count = 16
backend = "dynamic_mapping"
operation_timeout = "45s"
"#,
        );

        let config = load_with_env(Some(path.as_str()), env(&[])).unwrap();
        assert_eq!(config.history_shard_count, 16);
        assert_eq!(config.backend, BackendKind::DynamicMapping);
        assert_eq!(config.operation_timeout, Duration::from_secs(45));
        assert_eq!(config.list_clusters_page_size, 100);
        assert_eq!(config.task_queue, "default-worker-tq");
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TestDir::new();
        let path = write(&dir, "history_shard_count = 16\n");

        let config = load_with_env(
            Some(path.as_str()),
            env(&[
                ("CONDUCTOR__OPERATOR__HISTORY_SHARD_COUNT", "32"),
                ("CONDUCTOR__OPERATOR__NAMESPACE_DELETION__PAGE_SIZE", "500"),
            ]),
        )
        .unwrap();
        assert_eq!(config.history_shard_count, 32);
        assert_eq!(config.namespace_deletion.page_size, 500);
    }

    #[test]
    fn test_out_of_range_value_is_invalid() {
        let dir = TestDir::new();
        let path = write(&dir, "history_shard_count = 0\n");

        let err = load_with_env(Some(path.as_str()), env(&[])).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { .. }));
        assert!(err.to_string().contains("history_shard_count"));
    }

    #[test]
    fn test_missing_explicit_file_fails_to_load() {
        let dir = TestDir::new();
        let missing = dir.join("absent.toml").to_string_lossy().into_owned();
        let err = load_with_env(Some(missing.as_str()), env(&[])).unwrap_err();
        assert!(matches!(err, LoadError::Load { .. }));
    }

    #[test]
    fn test_malformed_value_fails_to_parse() {
        let dir = TestDir::new();
        let path = write(&dir, "backend = \"elastic\"\n");
        let err = load_with_env(Some(path.as_str()), env(&[])).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }
}
