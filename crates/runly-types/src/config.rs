//! Runtime configuration types for Runly.
//!
//! `RuntimeConfig` is the `config.toml` that tunes the execution engine and
//! build output. It is loaded once per invocation and passed explicitly to
//! the components that need it.

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration. All fields have defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Maximum node visits per run before the engine gives up.
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Timeout applied to skill calls whose resource declares `timeout: 0`.
    #[serde(default = "default_skill_timeout_ms")]
    pub default_skill_timeout_ms: u64,

    /// File the sealed asset is written to by `runly build`.
    #[serde(default = "default_output_file")]
    pub output_file: String,
}

fn default_max_steps() -> u64 {
    10_000
}

fn default_skill_timeout_ms() -> u64 {
    30_000
}

fn default_output_file() -> String {
    "dist.runly".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            default_skill_timeout_ms: default_skill_timeout_ms(),
            output_file: default_output_file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_config_default_values() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_steps, 10_000);
        assert_eq!(config.default_skill_timeout_ms, 30_000);
        assert_eq!(config.output_file, "dist.runly");
    }

    #[test]
    fn test_runtime_config_deserialize_with_defaults() {
        let config: RuntimeConfig = toml::from_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_runtime_config_deserialize_with_values() {
        let toml_str = r#"
max_steps = 50
output_file = "sealed.runly"
"#;
        let config: RuntimeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.default_skill_timeout_ms, 30_000);
        assert_eq!(config.output_file, "sealed.runly");
    }
}
