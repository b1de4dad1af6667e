use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub browser: BrowserConfig,
    pub speech: SpeechConfig,
    pub behavior: BehaviorConfig,
    pub keepalive: KeepaliveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8383 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run the browser without a visible window.
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self { headless: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Named pipe backing the virtual microphone device.
    pub pipe_path: PathBuf,
    /// espeak-ng speaking rate in words per minute.
    pub voice_speed: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            pipe_path: PathBuf::from("/tmp/virtmic"),
            voice_speed: 65,
        }
    }
}

/// How to treat flows whose success cannot be confirmed by any signal.
///
/// The target application's UI gives no reliable completion indicator for
/// login, join, and leave, so `Lenient` (the default) logs a warning and
/// reports success. `Strict` turns the same outcome into an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmPolicy {
    #[default]
    Lenient,
    Strict,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub strictness: ConfirmPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepaliveConfig {
    pub enabled: bool,
    /// Companion script started on session initialization.
    pub script: PathBuf,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            script: PathBuf::from("./keepalive.sh"),
        }
    }
}

/// Account credentials for the target application.
///
/// Loaded from the environment (optionally via a `.env` file), never from
/// the config file on disk.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        // Best-effort .env load; a missing file is fine.
        let _ = dotenvy::dotenv();

        let identifier =
            std::env::var("GOOGLE_EMAIL").context("GOOGLE_EMAIL not set in environment")?;
        let secret =
            std::env::var("GOOGLE_PASSWORD").context("GOOGLE_PASSWORD not set in environment")?;

        Ok(Self { identifier, secret })
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
