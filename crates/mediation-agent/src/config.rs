//! Agent configuration
//!
//! Loaded from a TOML file and then overridden by `MEDIATION_*` environment
//! variables. Keys use the flat names accepted by
//! [`AgentConfig::set_from_string`].

use mediation_core::{ConfigError, MediationConfig, MediationId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "MEDIATION_";

/// Keys accepted by [`AgentConfig::set_from_string`]
pub const CONFIG_KEYS: [&str; 7] = [
    "log_level",
    "default_endpoint",
    "open_mediation",
    "auto_respond_mediation_grant",
    "set_to_default_on_granted",
    "default_mediator_id",
    "clear_default_mediator",
];

/// Runtime configuration for a mediation agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Tracing filter directive, e.g. `info` or `mediation_protocol=debug`
    pub log_level: String,

    /// Mediation record to make the default mediator at startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_mediator_id: Option<MediationId>,

    /// Clear the default mediator at startup
    pub clear_default_mediator: bool,

    /// Coordinator and handler behaviour
    pub mediation: MediationConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            default_mediator_id: None,
            clear_default_mediator: false,
            mediation: MediationConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `MEDIATION_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `MEDIATION_*` overrides from `vars`.
    ///
    /// Variables without the prefix, or naming no known key, are ignored.
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in vars {
            let Some(key) = name.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let key = key.to_ascii_lowercase();
            if !CONFIG_KEYS.contains(&key.as_str()) {
                debug!(variable = %name.as_ref(), "Ignoring unknown configuration variable");
                continue;
            }
            self.set_from_string(&key, value.as_ref())?;
        }
        Ok(())
    }

    /// Set a single key from its string form
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "log_level" => self.log_level = value.to_string(),
            "default_endpoint" => self.mediation.default_endpoint = value.to_string(),
            "open_mediation" => self.mediation.open_mediation = parse_bool(key, value)?,
            "auto_respond_mediation_grant" => {
                self.mediation.auto_respond_mediation_grant = parse_bool(key, value)?;
            }
            "set_to_default_on_granted" => {
                self.mediation.set_to_default_on_granted = parse_bool(key, value)?;
            }
            "default_mediator_id" => {
                let value = value.trim();
                self.default_mediator_id =
                    (!value.is_empty()).then(|| MediationId::new(value));
            }
            "clear_default_mediator" => self.clear_default_mediator = parse_bool(key, value)?,
            _ => return Err(ConfigError::invalid(key, "unknown configuration key")),
        }
        Ok(())
    }

    /// Check that the configuration can be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mediation.validate()?;
        EnvFilter::try_new(&self.log_level)
            .map_err(|e| ConfigError::invalid("log_level", e.to_string()))?;
        if self.clear_default_mediator && self.default_mediator_id.is_some() {
            return Err(ConfigError::invalid(
                "default_mediator_id",
                "cannot be set together with clear_default_mediator",
            ));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("'{other}' is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn loads_partial_file_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"
default_mediator_id = "m-1"

[mediation]
default_endpoint = "https://mediator.example"
open_mediation = false
"#
        )
        .unwrap();

        let config = AgentConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.default_mediator_id, Some(MediationId::new("m-1")));
        assert_eq!(config.mediation.default_endpoint, "https://mediator.example");
        assert!(!config.mediation.open_mediation);
        assert!(!config.mediation.auto_respond_mediation_grant);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_output_loads_back() {
        let config = AgentConfig {
            default_mediator_id: Some(MediationId::new("m-7")),
            ..AgentConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(AgentConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = AgentConfig::load_from_file(dir.path().join("absent.toml"));
        assert_matches!(result, Err(ConfigError::Read(_)));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let result = AgentConfig::from_toml_str("log_level = [");
        assert_matches!(result, Err(ConfigError::Parse(_)));
    }

    #[test]
    fn prefixed_variables_override_fields() {
        let mut config = AgentConfig::default();
        config
            .merge_with_vars([
                ("MEDIATION_OPEN_MEDIATION", "false"),
                ("MEDIATION_AUTO_RESPOND_MEDIATION_GRANT", "yes"),
                ("MEDIATION_DEFAULT_ENDPOINT", "wss://relay.example"),
                ("MEDIATION_UNRELATED", "whatever"),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();

        assert!(!config.mediation.open_mediation);
        assert!(config.mediation.auto_respond_mediation_grant);
        assert_eq!(config.mediation.default_endpoint, "wss://relay.example");
    }

    #[test]
    fn bad_boolean_override_is_rejected() {
        let mut config = AgentConfig::default();
        let result = config.merge_with_vars([("MEDIATION_OPEN_MEDIATION", "maybe")]);
        assert_matches!(
            result,
            Err(ConfigError::Invalid { field, .. }) if field == "open_mediation"
        );
    }

    #[test]
    fn blank_default_mediator_id_unsets_it() {
        let mut config = AgentConfig {
            default_mediator_id: Some(MediationId::new("m-1")),
            ..AgentConfig::default()
        };
        config.set_from_string("default_mediator_id", "  ").unwrap();
        assert_eq!(config.default_mediator_id, None);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut config = AgentConfig::default();
        assert_matches!(
            config.set_from_string("colour", "blue"),
            Err(ConfigError::Invalid { field, .. }) if field == "colour"
        );
    }

    #[test]
    fn conflicting_default_mediator_settings_are_rejected() {
        let config = AgentConfig {
            default_mediator_id: Some(MediationId::new("m-1")),
            clear_default_mediator: true,
            ..AgentConfig::default()
        };
        assert_matches!(
            config.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "default_mediator_id"
        );
    }

    #[test]
    fn invalid_endpoint_fails_validation() {
        let mut config = AgentConfig::default();
        config.set_from_string("default_endpoint", "").unwrap();
        assert!(config.validate().is_err());
    }
}
