use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use snapsolve_contracts::DEFAULT_MAX_SCREENSHOTS;

use crate::retry::RetryPolicy;

const APP_DIR: &str = "snapsolve";
const APP_CONFIG_FILE: &str = "config.json";
const SCREENSHOT_SUBDIR: &str = "screenshots";

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_LANGUAGE: &str = "python";

/// Overlay window defaults used when no display information is available.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub screen_width: f64,
    pub screen_height: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            screen_width: 1920.0,
            screen_height: 1080.0,
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Settings from `config.json`, then environment, then CLI flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub language: String,
    pub request_timeout_secs: f64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_screenshots: usize,
    pub screenshot_dir: Option<PathBuf>,
    pub window: WindowConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            language: DEFAULT_LANGUAGE.to_string(),
            request_timeout_secs: 60.0,
            max_retries: 2,
            retry_backoff_ms: 1000,
            max_screenshots: DEFAULT_MAX_SCREENSHOTS,
            screenshot_dir: None,
            window: WindowConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads the config file (if any) and applies `SNAPSOLVE_*` overrides.
    pub fn load() -> Self {
        let mut config = load_config_file(
            env_path("XDG_CONFIG_HOME").as_deref(),
            env_path("HOME").as_deref(),
        );
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        if let Some(value) = get("SNAPSOLVE_API_BASE") {
            self.api_base = value;
        }
        if let Some(value) = get("SNAPSOLVE_API_KEY") {
            self.api_key = Some(value);
        }
        if let Some(value) = get("SNAPSOLVE_LANGUAGE") {
            self.language = value;
        }
        if let Some(value) = get("SNAPSOLVE_REQUEST_TIMEOUT").and_then(|raw| raw.parse().ok()) {
            self.request_timeout_secs = value;
        }
        if let Some(value) = get("SNAPSOLVE_MAX_RETRIES").and_then(|raw| raw.parse().ok()) {
            self.max_retries = value;
        }
        if let Some(value) = get("SNAPSOLVE_RETRY_BACKOFF_MS").and_then(|raw| raw.parse().ok()) {
            self.retry_backoff_ms = value;
        }
        if let Some(value) = get("SNAPSOLVE_MAX_SCREENSHOTS").and_then(|raw| raw.parse().ok()) {
            self.max_screenshots = value;
        }
        if let Some(value) = get("SNAPSOLVE_SCREENSHOT_DIR") {
            self.screenshot_dir = Some(PathBuf::from(value));
        }
    }

    pub fn api_base(&self) -> String {
        let trimmed = self.api_base.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            DEFAULT_API_BASE.to_string()
        } else {
            trimmed.to_string()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        let secs = if self.request_timeout_secs.is_finite() {
            self.request_timeout_secs.clamp(5.0, 300.0)
        } else {
            60.0
        };
        Duration::from_secs_f64(secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries.min(5),
            Duration::from_millis(self.retry_backoff_ms.clamp(10, 30_000)),
        )
    }

    pub fn max_screenshots(&self) -> usize {
        self.max_screenshots.max(1)
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.screenshot_dir.clone().unwrap_or_else(|| {
            default_screenshot_dir(
                env_path("XDG_DATA_HOME").as_deref(),
                env_path("HOME").as_deref(),
            )
        })
    }
}

fn load_config_file(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let Some(path) = config_path(xdg_config_home, home) else {
        return AppConfig::default();
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

pub fn config_path(xdg_config_home: Option<&Path>, home: Option<&Path>) -> Option<PathBuf> {
    let root = match xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        Some(xdg) => xdg.to_path_buf(),
        None => home?.join(".config"),
    };
    Some(root.join(APP_DIR).join(APP_CONFIG_FILE))
}

fn default_screenshot_dir(xdg_data_home: Option<&Path>, home: Option<&Path>) -> PathBuf {
    let root = match (
        xdg_data_home.filter(|path| !path.as_os_str().is_empty()),
        home,
    ) {
        (Some(xdg), _) => xdg.to_path_buf(),
        (None, Some(home)) => home.join(".local").join("share"),
        (None, None) => std::env::temp_dir(),
    };
    root.join(APP_DIR).join(SCREENSHOT_SUBDIR)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::*;

    #[test]
    fn config_path_prefers_xdg_over_home() {
        assert_eq!(
            config_path(Some(Path::new("/xdg")), Some(Path::new("/home/me"))),
            Some(PathBuf::from("/xdg/snapsolve/config.json"))
        );
        assert_eq!(
            config_path(Some(Path::new("")), Some(Path::new("/home/me"))),
            Some(PathBuf::from("/home/me/.config/snapsolve/config.json"))
        );
        assert_eq!(config_path(None, None), None);
    }

    #[test]
    fn config_file_fields_override_defaults() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path().join("snapsolve");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(
            dir.join("config.json"),
            r#"{"language": "rust", "max_retries": 4, "window": {"screen_width": 2560}}"#,
        )?;

        let config = load_config_file(Some(temp.path()), None);
        assert_eq!(config.language, "rust");
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.window.screen_width, 2560.0);
        assert_eq!(config.window.height, 600.0);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        Ok(())
    }

    #[test]
    fn broken_config_file_falls_back_to_defaults() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path().join("snapsolve");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("config.json"), "{not json")?;

        assert_eq!(load_config_file(Some(temp.path()), None), AppConfig::default());
        Ok(())
    }

    #[test]
    fn env_overrides_skip_blank_and_unparseable_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SNAPSOLVE_API_BASE", "https://solve.example.com/"),
            ("SNAPSOLVE_LANGUAGE", "   "),
            ("SNAPSOLVE_MAX_RETRIES", "three"),
            ("SNAPSOLVE_REQUEST_TIMEOUT", "90"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.api_base(), "https://solve.example.com");
        assert_eq!(config.language, DEFAULT_LANGUAGE);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.request_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn derived_values_are_clamped() {
        let config = AppConfig {
            request_timeout_secs: 1.0,
            max_retries: 50,
            retry_backoff_ms: 0,
            max_screenshots: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.retry_policy().max_retries, 5);
        assert_eq!(config.retry_policy().base_backoff, Duration::from_millis(10));
        assert_eq!(config.max_screenshots(), 1);
    }

    #[test]
    fn default_screenshot_dir_follows_xdg_data_home() {
        assert_eq!(
            default_screenshot_dir(Some(Path::new("/data")), Some(Path::new("/home/me"))),
            PathBuf::from("/data/snapsolve/screenshots")
        );
        assert_eq!(
            default_screenshot_dir(None, Some(Path::new("/home/me"))),
            PathBuf::from("/home/me/.local/share/snapsolve/screenshots")
        );
    }
}
