//! Runtime configuration.
//!
//! Resolution order: built-in defaults, then `homeledger.json` inside the data
//! directory (when present), then environment variables:
//! - `HOMELEDGER_DATA_DIR`: data directory holding the database, preferences and logs
//! - `HOMELEDGER_LOG`: tracing filter directives or a bare level
//! - `HOMELEDGER_LOG_JSON`: emit JSON log lines on stderr (`1`, `true`, `yes`)
//! - `HOMELEDGER_COLUMN_WIDTH`: default grid column width in pixels

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const APP_IDENTIFIER: &str = "com.homeledger.app";
pub const CONFIG_FILE_NAME: &str = "homeledger.json";

pub const ENV_DATA_DIR: &str = "HOMELEDGER_DATA_DIR";
pub const ENV_LOG: &str = "HOMELEDGER_LOG";
pub const ENV_LOG_JSON: &str = "HOMELEDGER_LOG_JSON";
pub const ENV_COLUMN_WIDTH: &str = "HOMELEDGER_COLUMN_WIDTH";

pub const DEFAULT_COLUMN_WIDTH: u32 = 160;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub db_file: String,
    pub prefs_file: String,
    pub log_level: String,
    pub log_json: bool,
    pub default_column_width: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: "homeledger.sqlite3".into(),
            prefs_file: "view_prefs.json".into(),
            log_level: "homeledger=info,sqlx=warn".into(),
            log_json: false,
            default_column_width: DEFAULT_COLUMN_WIDTH,
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_IDENTIFIER)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `env` as the variable source.
    pub fn load_with<F>(env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = env(ENV_DATA_DIR)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let mut config = Self::read_file(&data_dir)?.unwrap_or_default();
        config.data_dir = data_dir;

        if let Some(level) = env(ENV_LOG).filter(|level| !level.trim().is_empty()) {
            config.log_level = level;
        }
        if let Some(raw) = env(ENV_LOG_JSON) {
            config.log_json = parse_flag(&raw)
                .with_context(|| format!("{ENV_LOG_JSON} must be a boolean, got {raw:?}"))?;
        }
        if let Some(raw) = env(ENV_COLUMN_WIDTH) {
            config.default_column_width = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_COLUMN_WIDTH} must be a positive integer"))?;
        }
        Ok(config)
    }

    fn read_file(data_dir: &Path) -> Result<Option<Self>> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(Some(config))
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    pub fn prefs_path(&self) -> PathBuf {
        self.data_dir.join(&self.prefs_file)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().to_string_lossy().to_string();
        let config = AppConfig::load_with(env_from(&[(ENV_DATA_DIR, &data_dir)])).unwrap();
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.default_column_width, DEFAULT_COLUMN_WIDTH);
        assert!(!config.log_json);
        assert_eq!(config.db_path(), dir.path().join("homeledger.sqlite3"));
    }

    #[test]
    fn file_values_are_overridden_by_env() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "db_file": "house.db", "log_json": true, "default_column_width": 200 }"#,
        )
        .unwrap();
        let data_dir = dir.path().to_string_lossy().to_string();
        let config = AppConfig::load_with(env_from(&[
            (ENV_DATA_DIR, &data_dir),
            (ENV_COLUMN_WIDTH, "240"),
        ]))
        .unwrap();
        assert_eq!(config.db_file, "house.db");
        assert!(config.log_json);
        assert_eq!(config.default_column_width, 240);
        assert_eq!(config.prefs_file, "view_prefs.json");
    }

    #[test]
    fn invalid_env_values_are_reported() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().to_string_lossy().to_string();
        let err = AppConfig::load_with(env_from(&[
            (ENV_DATA_DIR, &data_dir),
            (ENV_LOG_JSON, "sometimes"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(ENV_LOG_JSON));
    }
}
