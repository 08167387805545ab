use crate::models::Theme;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0} is not set; add it to {1} or export {2}")]
    Missing(&'static str, String, &'static str),
}

// On-disk shape of ~/.config/taskdeck/config.toml; everything optional so a
// partially filled file still loads and env vars can cover the rest
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileConfig {
    instance_url: Option<String>,
    anon_key: Option<String>,
    email: Option<String>,
    theme: Option<Theme>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub instance_url: String,
    pub anon_key: String,
    pub email: Option<String>,
    // the one client-local persisted preference, never synced to the store
    pub theme: Theme,
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskdeck")
        .join("config.toml")
}

impl Config {
    // File first, then environment overrides (TASKDECK_URL, TASKDECK_ANON_KEY,
    // TASKDECK_EMAIL), matching how the .env file is honoured at startup
    pub fn load() -> Result<Config, ConfigError> {
        let path = config_path();
        let file: FileConfig = if path.exists() {
            toml::from_str(&fs::read_to_string(&path)?)?
        } else {
            FileConfig::default()
        };

        let instance_url = env::var("TASKDECK_URL")
            .ok()
            .or(file.instance_url)
            .ok_or_else(|| {
                ConfigError::Missing("instance_url", path.display().to_string(), "TASKDECK_URL")
            })?;
        let anon_key = env::var("TASKDECK_ANON_KEY")
            .ok()
            .or(file.anon_key)
            .ok_or_else(|| {
                ConfigError::Missing("anon_key", path.display().to_string(), "TASKDECK_ANON_KEY")
            })?;
        let email = env::var("TASKDECK_EMAIL").ok().or(file.email);

        Ok(Config {
            instance_url,
            anon_key,
            email,
            theme: file.theme.unwrap_or_default(),
        })
    }

    // Persist the current theme back to the config file. Only the theme key
    // is touched: settings that came from the environment and never lived in
    // the file (credentials in particular) must not land on disk.
    pub fn save_theme(&self) -> std::io::Result<()> {
        self.save_theme_to(&config_path())
    }

    fn save_theme_to(&self, path: &Path) -> std::io::Result<()> {
        let mut file: FileConfig = if path.exists() {
            toml::from_str(&fs::read_to_string(path)?)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
        } else {
            FileConfig::default()
        };
        file.theme = Some(self.theme);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = toml::to_string_pretty(&file)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, data)
    }
}
