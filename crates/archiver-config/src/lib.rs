use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use archiver_core::{AccessTier, TieringPolicy};

/// Environment variable that overrides `azure_storage` from the file.
pub const CONNECTION_STRING_ENV: &str = "ARCHIVER_AZURE_STORAGE";

const CONFIG_FILE: &str = "archiver.toml";

/// Configuration for archiver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storage account connection string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_storage: Option<String>,

    #[serde(default)]
    pub target_tier: AccessTier,

    #[serde(default)]
    pub continue_on_error: bool,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    /// File this config was read from or created at
    #[serde(skip)]
    source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Attempts in total, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_true")]
    pub tcp_nodelay: bool,

    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            azure_storage: None,
            target_tier: AccessTier::default(),
            continue_on_error: false,
            retry: RetryConfig::default(),
            transport: TransportConfig::default(),
            source: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            max_idle_per_host: default_max_idle_per_host(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_attempts() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_max_idle_per_host() -> usize {
    1000
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load config from the default location, creating it if not found,
    /// then apply the environment override.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path();
        let mut config = Self::load_or_create(&path)?;
        config.override_connection_string(std::env::var(CONNECTION_STRING_ENV).ok());
        Ok(config)
    }

    /// Load an explicitly named config file, which must exist, then apply
    /// the environment override.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::read(path)?;
        config.override_connection_string(std::env::var(CONNECTION_STRING_ENV).ok());
        Ok(config)
    }

    /// Read `path`, or write a default config there when it does not exist.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            return Self::read(path);
        }

        let config = Config {
            source: Some(path.to_path_buf()),
            ..Config::default()
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(&config)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(config)
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(Config {
            source: Some(path.to_path_buf()),
            ..config
        })
    }

    /// The file this config was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// A non-blank value replaces the configured connection string.
    pub fn override_connection_string(&mut self, value: Option<String>) {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.azure_storage = Some(value);
        }
    }

    /// The connection string, or a configuration error when none is set.
    pub fn connection_string(&self) -> archiver_core::Result<&str> {
        self.azure_storage
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                let path = self
                    .source
                    .clone()
                    .unwrap_or_else(Self::config_path);
                archiver_core::Error::Configuration(format!(
                    "no storage connection string; set `azure_storage` in {} or {CONNECTION_STRING_ENV}",
                    path.display()
                ))
            })
    }

    pub fn policy(&self) -> TieringPolicy {
        TieringPolicy {
            target: self.target_tier,
            continue_on_error: self.continue_on_error,
        }
    }

    /// Get config file path
    pub fn config_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("com", "archiver", "archiver") {
            dirs.config_dir().join(CONFIG_FILE)
        } else {
            PathBuf::from(CONFIG_FILE)
        }
    }
}
