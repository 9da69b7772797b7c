//! Configuration and data directory resolution.
//!
//! Reads `config.toml` from the data directory (`~/.edubudget/` in production)
//! and deserializes it into [`BudgetConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use edubudget_types::config::BudgetConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "EDUBUDGET_DATA_DIR";

/// Load budget configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`BudgetConfig::default()`].
/// - Unreadable or malformed file: logs a warning, returns the default.
/// - A parsed admin limit of zero is replaced by the default limit.
pub async fn load_config(data_dir: &Path) -> BudgetConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return BudgetConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return BudgetConfig::default();
        }
    };

    let mut config = match toml::from_str::<BudgetConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            return BudgetConfig::default();
        }
    };

    if config.default_admin_limit == 0 {
        tracing::warn!("default_admin_limit must be positive, using the built-in default");
        config.default_admin_limit = BudgetConfig::default().default_admin_limit;
    }

    config
}

/// Resolve the data directory.
///
/// Priority:
/// 1. `EDUBUDGET_DATA_DIR` environment variable
/// 2. `~/.edubudget`
/// 3. `.edubudget` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".edubudget");
    }

    PathBuf::from(".edubudget")
}

/// SQLite URL for the database file inside `data_dir`.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("edubudget.db").display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.default_admin_limit, 900_000);
        assert_eq!(config.estimated_analysis_tokens, 2_000);
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            "default_admin_limit = 250000\nestimated_analysis_tokens = 3500\n",
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.default_admin_limit, 250_000);
        assert_eq!(config.estimated_analysis_tokens, 3_500);
        assert_eq!(config.min_analysis_tokens, 2_000);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.default_admin_limit, 900_000);
    }

    #[tokio::test]
    async fn load_config_zero_limit_falls_back() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "default_admin_limit = 0\n")
            .await
            .unwrap();

        assert_eq!(load_config(tmp.path()).await.default_admin_limit, 900_000);
    }

    #[test]
    fn database_url_points_into_data_dir() {
        let url = database_url(Path::new("/var/lib/edubudget"));
        assert_eq!(url, "sqlite:///var/lib/edubudget/edubudget.db?mode=rwc");
    }
}
