use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

use serde::{Deserialize, Serialize};
use switchsync_api::{Device, DeviceType, Id};

use crate::errors::SettingsError;

/// Names a TOML file that replaces the embedded defaults.
pub const CONFIG_ENV: &str = "SWITCHSYNC_CONFIG";

const DEFAULT_CONFIG: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../",
    "configs/default.toml"
));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    pub accept_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduler {
    #[serde(default = "default_scan_period_ms")]
    pub scan_period_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub url: Option<String>,
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            url: None,
            poll_period_ms: default_poll_period_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: Id,
    #[serde(default)]
    pub aid: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: DeviceType,
}

impl From<&DeviceEntry> for Device {
    fn from(entry: &DeviceEntry) -> Self {
        Device::new(entry.id, entry.device_type, entry.name.clone()).with_aid(entry.aid.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub server: Server,
    pub scheduler: Scheduler,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

impl Settings {
    pub fn new() -> Result<Self, SettingsError> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path)),
            None => Self::from_toml(DEFAULT_CONFIG),
        }
    }

    pub fn from_file(path: PathBuf) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path,
            source,
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    pub fn server_addr(&self) -> Result<SocketAddr, SettingsError> {
        let ip_addr = self
            .server
            .host
            .parse::<IpAddr>()
            .map_err(|e| SettingsError::Address(format!("{}: {}", self.server.host, e)))?;

        Ok(SocketAddr::from((ip_addr, self.server.port)))
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.server.accept_timeout_ms)
    }

    pub fn scan_period(&self) -> Duration {
        Duration::from_millis(self.scheduler.scan_period_ms)
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.environment.poll_period_ms)
    }
}

fn default_scan_period_ms() -> u64 {
    5000
}

fn default_poll_period_ms() -> u64 {
    30000
}
