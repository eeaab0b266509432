use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_dirs::AppDirs;
use crate::positioning::WatchOptions;

pub const DEFAULT_COACH_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";
pub const COACH_API_KEY_ENV: &str = "STRINEX_COACH_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub initial_fix_timeout_ms: u64,
    pub watch_timeout_ms: u64,
    pub high_accuracy: bool,
    pub coach_api_key: Option<String>,
    pub coach_api_url: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_fix_timeout_ms: 10_000,
            watch_timeout_ms: 10_000,
            high_accuracy: true,
            coach_api_key: None,
            coach_api_url: DEFAULT_COACH_API_URL.to_string(),
            display_name: None,
            email: None,
        }
    }
}

impl Config {
    pub fn initial_fix_options(&self) -> WatchOptions {
        WatchOptions {
            high_accuracy: self.high_accuracy,
            timeout: Duration::from_millis(self.initial_fix_timeout_ms),
            maximum_age: Duration::ZERO,
        }
    }

    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            high_accuracy: self.high_accuracy,
            timeout: Duration::from_millis(self.watch_timeout_ms),
            maximum_age: Duration::ZERO,
        }
    }

    /// The environment wins over a stored API key
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(COACH_API_KEY_ENV) {
            let key = key.trim();
            if !key.is_empty() {
                self.coach_api_key = Some(key.to_string());
            }
        }
        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path =
            AppDirs::config_path().unwrap_or_else(|| PathBuf::from("strinex_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable config")
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "cannot read config"),
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
