//! Mediation behaviour configuration

use serde::{Deserialize, Serialize};

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A field holds an unusable value
    #[error("Invalid configuration: {field} - {reason}")]
    Invalid {
        /// Offending field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Configuration source could not be read
    #[error("Failed to read configuration: {0}")]
    Read(String),

    /// Configuration source could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    /// Create an invalid field error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Settings that steer the mediation coordinator and protocol handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediationConfig {
    /// Endpoint advertised in mediation grants
    pub default_endpoint: String,

    /// Grant inbound mediation requests automatically. When disabled,
    /// requests are recorded and left for an operator decision.
    pub open_mediation: bool,

    /// On grant receipt, issue a fresh local key and register it with the
    /// mediator straight away
    pub auto_respond_mediation_grant: bool,

    /// On grant receipt, make the granted mediation the default mediator
    pub set_to_default_on_granted: bool,
}

impl Default for MediationConfig {
    fn default() -> Self {
        Self {
            default_endpoint: "http://localhost:8020".to_string(),
            open_mediation: true,
            auto_respond_mediation_grant: false,
            set_to_default_on_granted: false,
        }
    }
}

impl MediationConfig {
    /// Check that the configuration can be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.default_endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::invalid("default_endpoint", "must not be empty"));
        }
        if !endpoint.contains("://") {
            return Err(ConfigError::invalid(
                "default_endpoint",
                format!("'{endpoint}' is not an absolute URI"),
            ));
        }
        Ok(())
    }
}
