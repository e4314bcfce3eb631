//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::clock::DEFAULT_REPORT_WINDOW_MS;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ONDECK_BACK_CONFIG_PATH";
/// Default location of the chat archive file.
const DEFAULT_CHAT_ARCHIVE_PATH: &str = "data/chat.json";
/// Default throttle window between chat archive writes, in milliseconds.
const DEFAULT_CHAT_SAVE_WINDOW_MS: u64 = 1_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Report window granted to competitors called to a pad, in ms.
    pub report_window_ms: i64,
    /// Path of the JSON file the chat channels are archived to.
    pub chat_archive_path: PathBuf,
    /// Coalescing window between chat archive writes, in ms.
    pub chat_save_window_ms: u64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// built-in defaults field by field.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        report_window_ms = app_config.report_window_ms,
                        archive = %app_config.chat_archive_path.display(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            report_window_ms: DEFAULT_REPORT_WINDOW_MS,
            chat_archive_path: PathBuf::from(DEFAULT_CHAT_ARCHIVE_PATH),
            chat_save_window_ms: DEFAULT_CHAT_SAVE_WINDOW_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    report_window_ms: Option<i64>,
    chat_archive_path: Option<PathBuf>,
    chat_save_window_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        // A non-positive report window would make every competitor late on
        // arrival; ignore such values.
        let report_window_ms = value
            .report_window_ms
            .filter(|window| *window > 0)
            .unwrap_or(defaults.report_window_ms);
        Self {
            report_window_ms,
            chat_archive_path: value
                .chat_archive_path
                .unwrap_or(defaults.chat_archive_path),
            chat_save_window_ms: value
                .chat_save_window_ms
                .unwrap_or(defaults.chat_save_window_ms),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_fills_missing_fields_with_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{"report_window_ms": 120000}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.report_window_ms, 120_000);
        assert_eq!(config.chat_save_window_ms, DEFAULT_CHAT_SAVE_WINDOW_MS);
        assert_eq!(
            config.chat_archive_path,
            PathBuf::from(DEFAULT_CHAT_ARCHIVE_PATH)
        );
    }

    #[test]
    fn non_positive_report_window_is_ignored() {
        let raw: RawConfig = serde_json::from_str(r#"{"report_window_ms": 0}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.report_window_ms, DEFAULT_REPORT_WINDOW_MS);
    }
}
