//! Campaign configuration: seed, sizes, failure policy and time budget.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// What the driver does after the first failed sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the campaign at the first failed sequence.
    #[default]
    FailFast,
    /// Run every sequence and report all failures.
    Aggregate,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for a campaign run. Missing JSON fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    /// Seed for the campaign's random stream.
    pub seed: u64,
    pub sequences_count: u32,
    /// Flows per sequence.
    pub flows_count: u64,
    pub failure_policy: FailurePolicy,
    /// Wall-clock budget, checked between flows. `None` = unlimited.
    pub time_limit_secs: Option<u64>,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            sequences_count: 1,
            flows_count: 30,
            failure_policy: FailurePolicy::FailFast,
            time_limit_secs: None,
        }
    }
}

impl CampaignConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sequences_count == 0 {
            return Err(ConfigError::Invalid(
                "sequences_count must be at least 1".into(),
            ));
        }
        if self.time_limit_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "time_limit_secs must be positive when set".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CampaignConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.sequences_count, 1);
        assert_eq!(config.flows_count, 30);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            CampaignConfig::from_json_str(r#"{"seed": 44, "failure_policy": "aggregate"}"#)
                .unwrap();
        assert_eq!(config.seed, 44);
        assert_eq!(config.failure_policy, FailurePolicy::Aggregate);
        assert_eq!(config.flows_count, 30);
    }

    #[test]
    fn test_zero_sequences_rejected() {
        let err = CampaignConfig::from_json_str(r#"{"sequences_count": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = CampaignConfig::from_json_str("{seed: 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = CampaignConfig::from_json_file("/nonexistent/flowfuzz.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
