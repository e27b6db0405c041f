//! Runtime configuration loader for Runly.
//!
//! Reads `config.toml` from the data directory (`~/.runly/` in production)
//! and deserializes it into [`RuntimeConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::Path;

use runly_types::config::RuntimeConfig;

/// Load runtime configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`RuntimeConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config; absent keys take their defaults.
pub async fn load_runtime_config(data_dir: &Path) -> RuntimeConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return RuntimeConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return RuntimeConfig::default();
        }
    };

    match toml::from_str::<RuntimeConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            RuntimeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_runtime_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_runtime_config(tmp.path()).await;
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.max_steps, 10_000);
    }

    #[tokio::test]
    async fn load_runtime_config_partial_toml_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
max_steps = 250
output_file = "sealed.runly"
"#,
        )
        .await
        .unwrap();

        let config = load_runtime_config(tmp.path()).await;
        assert_eq!(config.max_steps, 250);
        assert_eq!(config.output_file, "sealed.runly");
        assert_eq!(config.default_skill_timeout_ms, 30_000);
    }

    #[tokio::test]
    async fn load_runtime_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_runtime_config(tmp.path()).await;
        assert_eq!(config, RuntimeConfig::default());
    }
}
