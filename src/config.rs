//! Configuration loading and persistence
//!
//! Config is TOML, loaded from an explicit `--config` path, then the user
//! config directory, then built-in defaults. Unknown keys are collected as
//! non-fatal warnings rather than rejected, and `DSFLEET_*` environment
//! variables override file values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};

/// Non-fatal configuration warning surfaced to CLI users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub fleet: FleetConfig,
    pub tags: TagsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the database-security service endpoint
    pub endpoint: Option<String>,
    /// Environment variable holding the bearer token
    pub token_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token_env: "DSFLEET_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FleetConfig {
    /// Default root compartment scope when none is given on the command line
    pub root_compartment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagsConfig {
    /// Freeform tag key written by the retag operation
    pub environment_key: String,
    /// Ordered display-name rules; the first match wins
    pub rules: Vec<TagRule>,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            environment_key: "environment".to_string(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub pattern: String,
    pub value: String,
}

impl Config {
    /// Load configuration from an explicit path.
    pub fn load(path: &Path) -> FleetResult<Config> {
        Ok(Self::load_with_warnings(path)?.0)
    }

    /// Load configuration and collect non-fatal warnings (unknown keys).
    pub fn load_with_warnings(path: &Path) -> FleetResult<(Config, Vec<ConfigWarning>)> {
        let content = fs::read_to_string(path)?;

        let mut unknown_paths: Vec<String> = Vec::new();
        let deserializer = toml::de::Deserializer::new(&content);

        let config: Config = serde_ignored::deserialize(deserializer, |p| {
            unknown_paths.push(p.to_string());
        })
        .map_err(|e| FleetError::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let warnings = unknown_paths
            .into_iter()
            .map(|path_str| {
                let key = path_str
                    .split('.')
                    .next_back()
                    .unwrap_or(path_str.as_str())
                    .to_string();
                ConfigWarning {
                    key,
                    file: path.to_path_buf(),
                }
            })
            .collect();

        Ok((config, warnings))
    }

    /// Load from an explicit path, the user config dir, or defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> FleetResult<(Config, Vec<ConfigWarning>)> {
        if let Some(path) = explicit {
            let (config, warnings) = Self::load_with_warnings(path)?;
            return Ok((with_env_overrides(config), warnings));
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("dsfleet/config.toml");
            if user_config.exists() {
                let (config, warnings) = Self::load_with_warnings(&user_config)?;
                return Ok((with_env_overrides(config), warnings));
            }
        }

        Ok((with_env_overrides(Config::default()), Vec::new()))
    }

    /// Bearer token from the configured environment variable, if set.
    pub fn auth_token(&self) -> Option<String> {
        std::env::var(&self.api.token_env).ok()
    }
}

/// Apply environment variable overrides (DSFLEET_* prefix)
pub fn with_env_overrides(mut config: Config) -> Config {
    if let Ok(endpoint) = std::env::var("DSFLEET_ENDPOINT") {
        if !endpoint.is_empty() {
            config.api.endpoint = Some(endpoint);
        }
    }

    if let Ok(root) = std::env::var("DSFLEET_ROOT_COMPARTMENT") {
        if !root.is_empty() {
            config.fleet.root_compartment = Some(root);
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.api.token_env, "DSFLEET_TOKEN");
        assert_eq!(config.tags.environment_key, "environment");
        assert!(config.fleet.root_compartment.is_none());
    }

    #[test]
    fn loads_full_config() {
        let file = write_config(
            r#"
[api]
endpoint = "https://datasecurity.example.com/v1"

[fleet]
root_compartment = "ocid1.compartment.oc1..root"

[tags]
environment_key = "env"

[[tags.rules]]
pattern = "(?i)prod"
value = "production"
"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(
            config.api.endpoint.as_deref(),
            Some("https://datasecurity.example.com/v1")
        );
        assert_eq!(config.tags.environment_key, "env");
        assert_eq!(config.tags.rules.len(), 1);
    }

    #[test]
    fn unknown_keys_become_warnings() {
        let file = write_config(
            r#"
[api]
endpoint = "https://example.com"
endpiont_typo = "oops"
"#,
        );
        let (_, warnings) = Config::load_with_warnings(file.path()).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].key, "endpiont_typo");
    }

    #[test]
    fn malformed_toml_is_an_invalid_config_error() {
        let file = write_config("not [valid toml");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, FleetError::InvalidConfig { .. }));
    }
}
