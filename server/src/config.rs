//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::Context;
use medley_directory_watcher::WatchMode;
use serde::{Deserialize, Serialize};

/// Port the server listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 1970;

/// Name of the root directory settings file inside the data directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Settings read from `medley.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,

    /// Where the server keeps its state.
    pub data_dir: PathBuf,

    /// What the `$home` root resolves to.
    pub home_dir: PathBuf,

    /// `EnvFilter` directive; takes precedence over `RUST_LOG`.
    pub log_filter: Option<String>,

    /// Watch mode for every root.
    pub watch_mode: WatchMode,

    /// Exclude patterns on top of the built-in ones.
    pub exclude_patterns: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("medley");

        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            data_dir,
            home_dir: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
            log_filter: None,
            watch_mode: WatchMode::Realtime,
            exclude_patterns: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load a TOML config file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parse TOML config text.
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Path of the root directory settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }
}
