//! Engine configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.flowline/` in
//! production) and deserializes it into [`EngineConfig`]. Falls back to
//! defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use flowline_types::config::EngineConfig;

/// Resolve the data directory: `FLOWLINE_DATA_DIR` when set, otherwise
/// `~/.flowline`.
pub fn data_dir() -> PathBuf {
    match std::env::var("FLOWLINE_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".flowline"),
    }
}

/// Load engine configuration from `{data_dir}/config.toml`.
///
/// - Missing file: returns [`EngineConfig::default()`].
/// - Unreadable or unparseable file: logs a warning and returns the default.
pub async fn load_engine_config(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "no config.toml at {}, using defaults",
                config_path.display()
            );
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config, EngineConfig::default());
    }

    #[tokio::test]
    async fn valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
chat_poll_interval_secs = 3
dedup_ttl_hours = 24
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.chat_poll_interval_secs, 3);
        assert_eq!(config.dedup_ttl_hours, 24);
        // Unspecified fields keep their defaults.
        assert_eq!(config.email_poll_interval_secs, 60);
    }

    #[tokio::test]
    async fn malformed_toml_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "not { valid toml !!!")
            .await
            .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config, EngineConfig::default());
    }
}
